//! Virtual-key naming and scan code normalization.

use std::ops::RangeInclusive;

/// Browser, volume, media and launch keys. These report no stable scan code,
/// so their events carry the negated virtual-key code instead.
pub const MEDIA_VK_RANGE: RangeInclusive<u32> = 0xA6..=0xB7;

/// Scan code reported for a key event.
///
/// Media keys and keys without a hardware scan code map to `-(vk)`, so
/// volume up (VK 0xAF) becomes -175.
pub fn event_scan_code(vk: u32, scan_code: u32) -> i32 {
    if MEDIA_VK_RANGE.contains(&vk) || scan_code == 0 {
        -(vk as i32)
    } else {
        scan_code as i32
    }
}

/// Lowercase name of a virtual key, if it has one.
pub fn key_name(vk: u32) -> Option<&'static str> {
    const LETTERS: [&str; 26] = [
        "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
        "s", "t", "u", "v", "w", "x", "y", "z",
    ];
    const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
    const FUNCTION: [&str; 24] = [
        "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13", "f14",
        "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24",
    ];
    const NUMPAD: [&str; 10] = [
        "num 0", "num 1", "num 2", "num 3", "num 4", "num 5", "num 6", "num 7", "num 8", "num 9",
    ];

    let name = match vk {
        0x41..=0x5A => LETTERS[(vk - 0x41) as usize],
        0x30..=0x39 => DIGITS[(vk - 0x30) as usize],
        0x70..=0x87 => FUNCTION[(vk - 0x70) as usize],
        0x60..=0x69 => NUMPAD[(vk - 0x60) as usize],
        0x08 => "backspace",
        0x09 => "tab",
        0x0D => "enter",
        0x10 | 0xA0 => "shift",
        0xA1 => "right shift",
        0x11 | 0xA2 => "ctrl",
        0xA3 => "right ctrl",
        0x12 | 0xA4 => "alt",
        0xA5 => "right alt",
        0x13 => "pause",
        0x14 => "caps lock",
        0x1B => "esc",
        0x20 => "space",
        0x21 => "page up",
        0x22 => "page down",
        0x23 => "end",
        0x24 => "home",
        0x25 => "left",
        0x26 => "up",
        0x27 => "right",
        0x28 => "down",
        0x2C => "print screen",
        0x2D => "insert",
        0x2E => "delete",
        0x5B => "left windows",
        0x5C => "right windows",
        0x5D => "menu",
        0x6A => "num *",
        0x6B => "num +",
        0x6D => "num -",
        0x6E => "num .",
        0x6F => "num /",
        0x90 => "num lock",
        0x91 => "scroll lock",
        0xAD => "volume mute",
        0xAE => "volume down",
        0xAF => "volume up",
        0xB0 => "next track",
        0xB1 => "previous track",
        0xB2 => "stop media",
        0xB3 => "play/pause media",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_keys_use_negative_vk() {
        assert_eq!(event_scan_code(0xAF, 0), -175);
        assert_eq!(event_scan_code(0xAE, 0x2E), -174);
        assert_eq!(event_scan_code(0xB3, 0x22), -179);
    }

    #[test]
    fn test_regular_keys_keep_scan_code() {
        assert_eq!(event_scan_code(0x7C, 0x64), 0x64);
        assert_eq!(event_scan_code(0x41, 0x1E), 0x1E);
        assert_eq!(event_scan_code(0xFF, 0), -255);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(0x41), Some("a"));
        assert_eq!(key_name(0x7C), Some("f13"));
        assert_eq!(key_name(0x87), Some("f24"));
        assert_eq!(key_name(0x1B), Some("esc"));
        assert_eq!(key_name(0xAF), Some("volume up"));
        assert_eq!(key_name(0xFF), None);
    }
}
