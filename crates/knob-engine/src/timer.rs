//! Single-shot revert timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::EngineResult;

enum TimerCommand {
    Arm { delay: Duration, generation: u64 },
    Cancel,
    Stop,
}

/// A re-armable single-shot timer running on its own thread.
///
/// At most one deadline is pending. Every [`arm`](Self::arm) or
/// [`cancel`](Self::cancel) bumps a generation counter; the callback receives
/// the generation it was armed with and should ignore the firing unless
/// [`is_current`](Self::is_current) still holds, so the newest arm always wins
/// over a firing already in flight.
pub struct RevertTimer {
    commands: Sender<TimerCommand>,
    generation: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl RevertTimer {
    /// Start the timer thread.
    pub fn spawn<F>(callback: F) -> EngineResult<Self>
    where
        F: Fn(u64) + Send + 'static,
    {
        let (commands, rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("knob-revert-timer".to_string())
            .spawn(move || timer_loop(rx, callback))
            .map_err(|source| EngineError::Thread {
                name: "revert timer",
                source,
            })?;

        Ok(Self {
            commands,
            generation: Arc::new(AtomicU64::new(0)),
            thread: Some(thread),
        })
    }

    /// Schedule the callback after `delay`, replacing any pending deadline.
    pub fn arm(&self, delay: Duration) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.commands.send(TimerCommand::Arm { delay, generation });
        generation
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.commands.send(TimerCommand::Cancel);
    }

    /// Returns true if `generation` is the most recent arm.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

impl Drop for RevertTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(TimerCommand::Stop);
        if let Some(thread) = self.thread.take() {
            // The last owner can be released from inside the callback.
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

fn timer_loop<F: Fn(u64)>(rx: Receiver<TimerCommand>, callback: F) {
    let mut pending: Option<(Instant, u64)> = None;

    loop {
        let command = match pending {
            Some((deadline, generation)) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        pending = None;
                        trace!(generation, "Revert timer fired");
                        callback(generation);
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            TimerCommand::Arm { delay, generation } => {
                pending = Some((Instant::now() + delay, generation));
            }
            TimerCommand::Cancel => pending = None,
            TimerCommand::Stop => break,
        }
    }

    debug!("Revert timer stopped");
}
