//! Prints key names and scan codes, for filling in hotkey bindings.
//!
//! Exits when esc is pressed.

use knob_engine::KeyBinding;
use knob_input::install_keyboard_hook;
use knob_ipc::{KeyDisposition, KeyEvent};

fn main() -> anyhow::Result<()> {
    knob_app::logging::init_logging(false, None)?;

    let (tx, rx) = crossbeam_channel::unbounded::<KeyEvent>();
    let _hook = install_keyboard_hook(move |event: &KeyEvent| {
        let _ = tx.send(event.clone());
        KeyDisposition::PassThrough
    })?;

    println!("Press any key to see its name and scan code. Press esc to exit.");
    println!("Use the name, or scan:<code> for keys without one, in config.toml.");

    for event in rx.iter() {
        let name = event.name.as_deref().unwrap_or("unknown");
        let kind = if event.is_down() { "down" } else { "up" };
        println!(
            "Key: {name}, Scan: {}, Event type: {kind} ({})",
            event.scan_code,
            KeyBinding::ScanCode(event.scan_code)
        );
        if event.is_down() && name == "esc" {
            break;
        }
    }
    Ok(())
}
