//! Per-thread COM apartment scope.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::AudioResult;

#[derive(Clone, Copy)]
struct ApartmentState {
    depth: usize,
    owned: bool,
}

thread_local! {
    static APARTMENT: Cell<ApartmentState> = const {
        Cell::new(ApartmentState { depth: 0, owned: false })
    };
}

/// Keeps the calling thread inside a multithreaded COM apartment.
///
/// Scopes nest: the outermost scope initializes COM and the last one to drop
/// uninitializes it. If the thread already belongs to another apartment the
/// scope uses it as is and never uninitializes. On platforms without COM this
/// only tracks depth.
pub struct ComScope {
    _not_send: PhantomData<*const ()>,
}

impl ComScope {
    /// Enter a scope on the current thread.
    pub fn enter() -> AudioResult<Self> {
        let mut state = APARTMENT.with(Cell::get);
        if state.depth == 0 {
            state.owned = initialize()?;
        }
        state.depth += 1;
        APARTMENT.with(|cell| cell.set(state));

        Ok(Self {
            _not_send: PhantomData,
        })
    }

    /// Number of live scopes on the current thread.
    pub fn depth() -> usize {
        APARTMENT.with(|cell| cell.get().depth)
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        let mut state = APARTMENT.with(Cell::get);
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 && state.owned {
            uninitialize();
            state.owned = false;
        }
        APARTMENT.with(|cell| cell.set(state));
    }
}

/// Returns true if this call initialized COM and must balance it.
#[cfg(windows)]
fn initialize() -> AudioResult<bool> {
    use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

    // S_FALSE means COM was already initialized on this thread; it still
    // needs a matching CoUninitialize.
    let result = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
    if result == RPC_E_CHANGED_MODE {
        tracing::debug!("Thread already in a single-threaded apartment");
        return Ok(false);
    }
    result.ok().map_err(|e| crate::AudioError::WindowsApi {
        message: "Failed to initialize COM".to_string(),
        source: Some(e),
    })?;
    Ok(true)
}

#[cfg(windows)]
fn uninitialize() {
    unsafe { windows::Win32::System::Com::CoUninitialize() };
}

#[cfg(not(windows))]
fn initialize() -> AudioResult<bool> {
    Ok(true)
}

#[cfg(not(windows))]
fn uninitialize() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_nest() {
        assert_eq!(ComScope::depth(), 0);
        let outer = ComScope::enter().unwrap();
        {
            let _inner = ComScope::enter().unwrap();
            assert_eq!(ComScope::depth(), 2);
        }
        assert_eq!(ComScope::depth(), 1);
        drop(outer);
        assert_eq!(ComScope::depth(), 0);
    }

    #[test]
    fn test_scope_is_per_thread() {
        let _scope = ComScope::enter().unwrap();
        let other = std::thread::spawn(ComScope::depth).join().unwrap();
        assert_eq!(other, 0);
        assert_eq!(ComScope::depth(), 1);
    }
}
