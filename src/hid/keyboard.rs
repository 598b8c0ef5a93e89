//! Canonical keyboard report (boot protocol layout).
//!
//! Layout (8 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//!         Bit 0 = Left Ctrl,  Bit 1 = Left Shift,
//!         Bit 2 = Left Alt,   Bit 3 = Left GUI,
//!         Bit 4 = Right Ctrl, Bit 5 = Right Shift,
//!         Bit 6 = Right Alt,  Bit 7 = Right GUI
//! Byte 1: Reserved
//! Byte 2-7: Up to 6 simultaneous key codes (USB HID usage codes)
//! ```
//!
//! Vendor decoders build the same structure; [`ReportSource`] records
//! which path produced it.

use bitflags::bitflags;

/// Keyboard report size in bytes.
pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Number of key slots in a report.
pub const MAX_KEYS: usize = 6;

/// Keyboard/Keypad page usages referred to by name.
pub mod usage {
    pub const NONE: u8 = 0x00;
    pub const ERROR_ROLL_OVER: u8 = 0x01;
    pub const A: u8 = 0x04;
    pub const KEY_1: u8 = 0x1E;
    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2A;
    pub const TAB: u8 = 0x2B;
    pub const SPACE: u8 = 0x2C;
    pub const NUM_LOCK: u8 = 0x53;
    pub const LEFT_CTRL: u8 = 0xE0;
    pub const RIGHT_ALT: u8 = 0xE6;
    pub const RIGHT_GUI: u8 = 0xE7;
}

bitflags! {
    /// Modifier byte of a keyboard report.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const LEFT_CTRL   = 0x01;
        const LEFT_SHIFT  = 0x02;
        const LEFT_ALT    = 0x04;
        const LEFT_GUI    = 0x08;
        const RIGHT_CTRL  = 0x10;
        const RIGHT_SHIFT = 0x20;
        const RIGHT_ALT   = 0x40;
        const RIGHT_GUI   = 0x80;
    }
}

impl Modifiers {
    /// Either shift key.
    pub fn shift(self) -> bool {
        self.intersects(Modifiers::LEFT_SHIFT | Modifiers::RIGHT_SHIFT)
    }

    /// Usage code (0xE0..=0xE7) of each set modifier bit.
    pub fn usages(self) -> impl Iterator<Item = u8> {
        (0..8u8)
            .filter(move |bit| self.bits() & (1 << bit) != 0)
            .map(|bit| usage::LEFT_CTRL + bit)
    }
}

/// Which decode path produced a [`KeyboardReport`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportSource {
    /// Standard HID boot-protocol layout.
    #[default]
    BootProtocol,
    /// Vendor payload scanned byte-by-byte for key usages.
    VendorByteScan,
    /// Vendor payload decoded through a key-matrix bit map.
    VendorMatrix,
}

/// Canonical keyboard report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Reserved byte as received (boot protocol) or 0.
    pub reserved: u8,
    /// Up to 6 simultaneously pressed key codes, 0 = empty slot.
    pub keycodes: [u8; MAX_KEYS],
    pub source: ReportSource,
}

impl KeyboardReport {
    /// An all-keys-released report.
    pub const fn empty(source: ReportSource) -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; MAX_KEYS],
            source,
        }
    }

    /// Parse a boot-protocol keyboard report.
    ///
    /// Returns `None` when fewer than 8 bytes are available. A Num Lock
    /// usage in the first key slot is dropped from the key set.
    pub fn from_boot_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < KEYBOARD_REPORT_SIZE {
            return None;
        }
        let mut keycodes = [0u8; MAX_KEYS];
        keycodes.copy_from_slice(&data[2..KEYBOARD_REPORT_SIZE]);
        if keycodes[0] == usage::NUM_LOCK {
            keycodes[0] = usage::NONE;
        }
        Some(Self {
            modifier: data[0],
            reserved: data[1],
            keycodes,
            source: ReportSource::BootProtocol,
        })
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers::from_bits_retain(self.modifier)
    }

    /// `true` when every key slot reports ErrorRollOver (phantom state).
    pub fn is_rollover(&self) -> bool {
        self.keycodes.iter().all(|&k| k == usage::ERROR_ROLL_OVER)
    }

    /// Returns `true` if no keys and no modifiers are pressed.
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }

    pub fn contains(&self, code: u8) -> bool {
        code != usage::NONE && self.keycodes.contains(&code)
    }

    /// Put `code` in the first free slot.
    ///
    /// Returns `false` if the usage is 0, already present, or all six slots
    /// are taken.
    pub fn insert_key(&mut self, code: u8) -> bool {
        if code == usage::NONE || self.contains(code) {
            return false;
        }
        match self.keycodes.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = code;
                true
            }
            None => false,
        }
    }

    /// Clear the slot holding `code`, if any.
    pub fn remove_key(&mut self, code: u8) -> bool {
        match self.keycodes.iter_mut().find(|slot| **slot == code) {
            Some(slot) if code != usage::NONE => {
                *slot = 0;
                true
            }
            _ => false,
        }
    }

    /// Distinct non-zero key usages, in slot order.
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.keycodes
            .iter()
            .enumerate()
            .filter(|&(i, &k)| k != 0 && !self.keycodes[..i].contains(&k))
            .map(|(_, &k)| k)
    }

    /// Keys in `self` that are not in `previous` (newly pressed).
    pub fn pressed_since<'a>(&'a self, previous: &'a KeyboardReport) -> impl Iterator<Item = u8> + 'a {
        self.keys().filter(move |&k| !previous.contains(k))
    }

    /// Keys in `previous` that are not in `self` (released).
    pub fn released_since<'a>(&'a self, previous: &'a KeyboardReport) -> impl Iterator<Item = u8> + 'a {
        previous.keys().filter(move |&k| !self.contains(k))
    }

    /// Same pressed state as `other`, ignoring slot order and source.
    pub fn same_state(&self, other: &KeyboardReport) -> bool {
        self.modifier == other.modifier
            && self.keys().all(|k| other.contains(k))
            && other.keys().all(|k| self.contains(k))
    }
}
