//! GDI popup window for the overlay.

use std::cell::RefCell;
use std::sync::Once;

use knob_ipc::DisplayLevel;
use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateSolidBrush, DeleteObject, DrawTextW, EndPaint, FillRect, GetStockObject,
    InvalidateRect, SelectObject, SetBkMode, SetTextColor, DEFAULT_GUI_FONT, DT_CENTER,
    DT_SINGLELINE, DT_VCENTER, HDC, PAINTSTRUCT, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetSystemMetrics, PeekMessageW, RegisterClassW, SetLayeredWindowAttributes, ShowWindow,
    TranslateMessage, LWA_ALPHA, MSG, PM_REMOVE, SM_CXSCREEN, SW_HIDE, SW_SHOWNOACTIVATE,
    WINDOW_STYLE, WM_ERASEBKGND, WM_PAINT, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP,
};

use super::{OverlayError, OverlaySurface};

const WIDTH: i32 = 300;
const HEIGHT: i32 = 80;
const TOP: i32 = 20;
const ALPHA: u8 = 230;

const BACKGROUND: COLORREF = rgb(0xF0, 0xF0, 0xF0);
const TROUGH: COLORREF = rgb(0xE0, 0xE0, 0xE0);
const BAR: COLORREF = rgb(0x44, 0x00, 0x53);
const TEXT: COLORREF = rgb(0x20, 0x20, 0x20);

const fn rgb(r: u8, g: u8, b: u8) -> COLORREF {
    COLORREF(r as u32 | (g as u32) << 8 | (b as u32) << 16)
}

#[derive(Default)]
struct PaintState {
    label: String,
    text: String,
    percent: u32,
}

thread_local! {
    static PAINT: RefCell<PaintState> = RefCell::new(PaintState::default());
}

fn widestring(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// A borderless top-most window centered at the top of the primary screen.
///
/// Must be created, drawn and closed on the same thread, which also has to
/// call [`OverlaySurface::pump`] regularly.
pub struct GdiSurface {
    hwnd: HWND,
}

impl GdiSurface {
    /// Create the (hidden) overlay window.
    pub fn new() -> Result<Self, OverlayError> {
        static REGISTER_CLASS: Once = Once::new();
        let class_name = widestring("KnobVolumeOverlay");
        let hinstance = unsafe { GetModuleHandleW(PCWSTR::null())? };

        REGISTER_CLASS.call_once(|| unsafe {
            let wc = WNDCLASSW {
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                lpfnWndProc: Some(overlay_wndproc),
                ..Default::default()
            };
            let _ = RegisterClassW(&wc);
        });

        let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let x = (screen_width - WIDTH).max(0) / 2;

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WINDOW_STYLE(WS_POPUP.0),
                x,
                TOP,
                WIDTH,
                HEIGHT,
                None,
                None,
                hinstance,
                None,
            )?
        };

        if let Err(e) = unsafe { SetLayeredWindowAttributes(hwnd, COLORREF(0), ALPHA, LWA_ALPHA) }
        {
            unsafe {
                let _ = DestroyWindow(hwnd);
            }
            return Err(e.into());
        }

        debug!(x, y = TOP, "Overlay window created");
        Ok(Self { hwnd })
    }

    fn window(&self) -> Result<HWND, OverlayError> {
        if self.hwnd.0.is_null() {
            Err(OverlayError::Closed)
        } else {
            Ok(self.hwnd)
        }
    }
}

impl OverlaySurface for GdiSurface {
    fn show(&mut self, label: &str, level: &DisplayLevel) -> Result<(), OverlayError> {
        let hwnd = self.window()?;
        PAINT.with(|paint| {
            let mut paint = paint.borrow_mut();
            paint.label = label.to_string();
            paint.text = level.text();
            paint.percent = level.percent();
        });
        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            let _ = InvalidateRect(hwnd, None, true);
        }
        Ok(())
    }

    fn hide(&mut self) -> Result<(), OverlayError> {
        let hwnd = self.window()?;
        unsafe {
            let _ = ShowWindow(hwnd, SW_HIDE);
        }
        Ok(())
    }

    fn pump(&mut self) {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }
        }
    }

    fn close(&mut self) -> Result<(), OverlayError> {
        let hwnd = self.window()?;
        self.hwnd = HWND::default();
        unsafe { DestroyWindow(hwnd)? };
        debug!("Overlay window destroyed");
        Ok(())
    }
}

impl Drop for GdiSurface {
    fn drop(&mut self) {
        if !self.hwnd.0.is_null() {
            unsafe {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

fn fill(hdc: HDC, rect: &RECT, color: COLORREF) {
    unsafe {
        let brush = CreateSolidBrush(color);
        let _ = FillRect(hdc, rect, brush);
        let _ = DeleteObject(brush);
    }
}

fn draw_text(hdc: HDC, text: &str, mut rect: RECT) {
    let mut wide: Vec<u16> = text.encode_utf16().collect();
    unsafe {
        let _ = DrawTextW(hdc, &mut wide, &mut rect, DT_CENTER | DT_VCENTER | DT_SINGLELINE);
    }
}

fn paint(hdc: HDC, client: RECT) {
    let margin = 20;
    let label_rect = RECT {
        left: client.left,
        top: client.top + 6,
        right: client.right,
        bottom: client.top + 28,
    };
    let trough = RECT {
        left: client.left + margin,
        top: client.top + 32,
        right: client.right - margin,
        bottom: client.top + 48,
    };
    let text_rect = RECT {
        left: client.left,
        top: client.top + 52,
        right: client.right,
        bottom: client.bottom - 4,
    };

    fill(hdc, &client, BACKGROUND);
    fill(hdc, &trough, TROUGH);

    PAINT.with(|state| {
        let state = state.borrow();
        let filled = (trough.right - trough.left) * state.percent.min(100) as i32 / 100;
        if filled > 0 {
            let bar = RECT {
                right: trough.left + filled,
                ..trough
            };
            fill(hdc, &bar, BAR);
        }

        unsafe {
            let _ = SelectObject(hdc, GetStockObject(DEFAULT_GUI_FONT));
            let _ = SetBkMode(hdc, TRANSPARENT);
            let _ = SetTextColor(hdc, TEXT);
        }
        draw_text(hdc, &state.label, label_rect);
        draw_text(hdc, &state.text, text_rect);
    });
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_ERASEBKGND => LRESULT(1),
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = unsafe { BeginPaint(hwnd, &mut ps) };
            if !hdc.0.is_null() {
                let mut client = RECT::default();
                if unsafe { GetClientRect(hwnd, &mut client) }.is_ok() {
                    paint(hdc, client);
                }
            }
            unsafe {
                let _ = EndPaint(hwnd, &ps);
            }
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}
