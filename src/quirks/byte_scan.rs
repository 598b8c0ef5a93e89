//! Byte-scan decoding.
//!
//! Treats one byte as a raw modifier and every later byte in the
//! keyboard usage range as a pressed key:
//! ```text
//! [modifier_index]   modifier (ghost value → 0)
//! [key_start..]      any byte in 0x04..=0x65 that is not noise → key slot
//! ```

use crate::error::Error;
use crate::hid::keyboard::{KeyboardReport, ReportSource};

/// Lowest usage accepted as a key.
pub const KEY_MIN: u8 = 0x04;
/// Highest usage accepted as a key (Keyboard Application).
pub const KEY_MAX: u8 = 0x65;
/// Values the keyboard emits in key positions that are not key presses.
pub const NOISE: [u8; 2] = [0x40, 0x80];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ByteScanLayout {
    pub modifier_index: usize,
    pub key_start: usize,
    /// Modifier value the keyboard sends at rest, read as "no modifiers".
    pub idle_modifier: Option<u8>,
}

impl ByteScanLayout {
    /// Modifier in byte 0, keys from byte 1. Byte 0 carries a constant
    /// 0x01 while idle.
    pub const KB16_MODIFIER_FIRST: Self = Self {
        modifier_index: 0,
        key_start: 1,
        idle_modifier: Some(0x01),
    };

    /// Modifier in byte 1, keys from byte 2.
    pub const KB16_MODIFIER_SECOND: Self = Self {
        modifier_index: 1,
        key_start: 2,
        idle_modifier: None,
    };

    /// Shortest payload this layout can decode: the modifier plus at least
    /// one key byte. Anything shorter says nothing about the keys.
    pub fn min_len(&self) -> usize {
        self.modifier_index.max(self.key_start) + 1
    }

    pub fn decode(&self, payload: &[u8]) -> Result<KeyboardReport, Error> {
        if payload.len() < self.min_len() {
            return Err(Error::ReportTooShort {
                needed: self.min_len(),
                actual: payload.len(),
            });
        }

        let mut report = KeyboardReport::empty(ReportSource::VendorByteScan);
        let modifier = payload[self.modifier_index];
        report.modifier = if Some(modifier) == self.idle_modifier {
            0
        } else {
            modifier
        };

        let keys = payload.get(self.key_start..).unwrap_or(&[]);
        for &b in keys {
            if !(KEY_MIN..=KEY_MAX).contains(&b) || NOISE.contains(&b) {
                continue;
            }
            if report.contains(b) {
                continue;
            }
            if !report.insert_key(b) {
                debug!("byte-scan: more than 6 keys, dropping {:#x}", b);
                break;
            }
        }
        Ok(report)
    }
}
