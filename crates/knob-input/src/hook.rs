//! Process-wide low-level keyboard hook.
//!
//! The hook callback runs on a dedicated thread with its own message loop.
//! Handlers must return quickly: Windows silently removes hooks that stall,
//! so they should only look up a binding and post a command.

use std::thread::JoinHandle;

use knob_ipc::{KeyDisposition, KeyEvent};

use crate::InputResult;

/// Removes the keyboard hook when dropped.
pub struct KeyboardHookGuard {
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl Drop for KeyboardHookGuard {
    fn drop(&mut self) {
        platform::stop(self.thread_id);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        tracing::debug!("Keyboard hook removed");
    }
}

/// Install the global keyboard hook.
///
/// Every key event is passed to `handler`; returning
/// [`KeyDisposition::Suppress`] swallows it. Only one hook may be installed
/// at a time.
pub fn install_keyboard_hook<F>(handler: F) -> InputResult<KeyboardHookGuard>
where
    F: Fn(&KeyEvent) -> KeyDisposition + Send + Sync + 'static,
{
    platform::install(Box::new(handler))
}

type Handler = Box<dyn Fn(&KeyEvent) -> KeyDisposition + Send + Sync>;

#[cfg(windows)]
mod platform {
    use std::sync::Arc;
    use std::thread;

    use knob_ipc::{KeyDisposition, KeyEvent, KeyEventKind};
    use parking_lot::Mutex;
    use tracing::{debug, info, warn};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
        TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, MSG,
        WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
    };

    use super::{Handler, KeyboardHookGuard};
    use crate::error::InputError;
    use crate::keys::{event_scan_code, key_name};
    use crate::InputResult;

    static HANDLER: Mutex<Option<Arc<Handler>>> = Mutex::new(None);

    pub(super) fn install(handler: Handler) -> InputResult<KeyboardHookGuard> {
        {
            let mut slot = HANDLER.lock();
            if slot.is_some() {
                return Err(InputError::AlreadyInstalled);
            }
            *slot = Some(Arc::new(handler));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<InputResult<u32>>(1);
        let spawned = thread::Builder::new()
            .name("knob-keyboard-hook".to_string())
            .spawn(move || hook_thread(ready_tx));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                HANDLER.lock().take();
                return Err(e.into());
            }
        };

        let thread_id = match ready_rx.recv() {
            Ok(Ok(thread_id)) => thread_id,
            Ok(Err(e)) => {
                let _ = thread.join();
                HANDLER.lock().take();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                HANDLER.lock().take();
                return Err(InputError::HookThreadExited);
            }
        };

        info!("Keyboard hook installed");
        Ok(KeyboardHookGuard {
            thread_id,
            thread: Some(thread),
        })
    }

    pub(super) fn stop(thread_id: u32) {
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(error = %e, "Failed to stop keyboard hook thread");
        }
        HANDLER.lock().take();
    }

    fn hook_thread(ready: crossbeam_channel::Sender<InputResult<u32>>) {
        let hook = match install_hook() {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));
        debug!("Keyboard hook message loop started");

        let mut msg = MSG::default();
        while unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) }.0 > 0 {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
            warn!(error = %e, "Failed to unhook keyboard");
        }
        debug!("Keyboard hook message loop stopped");
    }

    fn install_hook() -> InputResult<HHOOK> {
        let module = unsafe { GetModuleHandleW(PCWSTR::null())? };
        let hook = unsafe {
            SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_proc),
                HINSTANCE(module.0),
                0,
            )?
        };
        Ok(hook)
    }

    unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code == HC_ACTION as i32 {
            if let Some(event) = unsafe { decode(wparam, lparam) } {
                let handler = HANDLER.lock().clone();
                if let Some(handler) = handler {
                    if handler(&event) == KeyDisposition::Suppress {
                        return LRESULT(1);
                    }
                }
            }
        }
        unsafe { CallNextHookEx(HHOOK::default(), code, wparam, lparam) }
    }

    unsafe fn decode(wparam: WPARAM, lparam: LPARAM) -> Option<KeyEvent> {
        let kind = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => KeyEventKind::Down,
            WM_KEYUP | WM_SYSKEYUP => KeyEventKind::Up,
            _ => return None,
        };
        let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };

        Some(KeyEvent {
            kind,
            scan_code: event_scan_code(info.vkCode, info.scanCode),
            name: key_name(info.vkCode).map(str::to_string),
        })
    }
}

#[cfg(not(windows))]
mod platform {
    use super::{Handler, KeyboardHookGuard};
    use crate::error::InputError;
    use crate::InputResult;

    pub(super) fn install(_handler: Handler) -> InputResult<KeyboardHookGuard> {
        Err(InputError::Unsupported)
    }

    pub(super) fn stop(_thread_id: u32) {}
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_install_unsupported() {
        let result = install_keyboard_hook(|_| KeyDisposition::PassThrough);
        assert!(matches!(result, Err(crate::InputError::Unsupported)));
    }
}
