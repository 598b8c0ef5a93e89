//! Key-matrix decoding for keyboards that report switch state as a bit
//! field instead of usages.
//!
//! Each [`KeyMapEntry`] names one bit of the raw payload and the physical
//! (row, col) it belongs to. Decoding compares every bit against the
//! stored [`KeyState`] and returns only the switches that changed.
//!
//! DOIO KB16 layout (row, col → usage):
//! ```text
//!        col0   col1   col2   col3
//! row0   1      2      3      4
//! row1   5      6      7      8
//! row2   9      0      Enter  Esc
//! row3   Bksp   Tab    Space  RAlt
//! ```

use heapless::Vec;

use crate::error::Error;
use crate::hid::keyboard::{usage, KeyboardReport, ReportSource};

pub const MATRIX_ROWS: usize = 4;
pub const MATRIX_COLS: usize = 4;
pub const MATRIX_KEYS: usize = MATRIX_ROWS * MATRIX_COLS;

/// One switch: `pressed = payload[byte_index] & bit_mask != 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyMapEntry {
    pub byte_index: u8,
    pub bit_mask: u8,
    pub row: u8,
    pub col: u8,
}

const fn entry(byte_index: u8, bit_mask: u8, row: u8, col: u8) -> KeyMapEntry {
    KeyMapEntry {
        byte_index,
        bit_mask,
        row,
        col,
    }
}

/// KB16 switch bits, captured from the device.
#[rustfmt::skip]
pub const KB16_KEY_MAP: [KeyMapEntry; MATRIX_KEYS] = [
    entry(5, 0x20, 0, 0), entry(1, 0x01, 0, 1), entry(1, 0x02, 0, 2), entry(5, 0x01, 0, 3),
    entry(4, 0x01, 1, 0), entry(5, 0x02, 1, 1), entry(4, 0x08, 1, 2), entry(4, 0x80, 1, 3),
    entry(4, 0x02, 2, 0), entry(4, 0x20, 2, 1), entry(5, 0x08, 2, 2), entry(4, 0x40, 2, 3),
    entry(4, 0x10, 3, 0), entry(5, 0x10, 3, 1), entry(4, 0x04, 3, 2), entry(5, 0x04, 3, 3),
];

/// KB16 (row, col) → usage.
pub const KB16_USAGES: [[u8; MATRIX_COLS]; MATRIX_ROWS] = [
    [usage::KEY_1, 0x1F, 0x20, 0x21],
    [0x22, 0x23, 0x24, 0x25],
    [0x26, 0x27, usage::ENTER, usage::ESCAPE],
    [usage::BACKSPACE, usage::TAB, usage::SPACE, usage::RIGHT_ALT],
];

/// Pressed/released state of every switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    pressed: [[bool; MATRIX_COLS]; MATRIX_ROWS],
}

impl KeyState {
    /// `false` for out-of-range coordinates.
    pub fn is_pressed(&self, row: usize, col: usize) -> bool {
        self.pressed
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    fn set(&mut self, row: usize, col: usize, pressed: bool) {
        if let Some(cell) = self.pressed.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = pressed;
        }
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed.iter().flatten().filter(|&&p| p).count()
    }
}

/// A switch that changed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatrixTransition {
    pub row: u8,
    pub col: u8,
    pub pressed: bool,
    pub usage: u8,
}

/// A bit map plus the usage each switch produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatrixLayout {
    pub entries: &'static [KeyMapEntry],
    pub usages: &'static [[u8; MATRIX_COLS]; MATRIX_ROWS],
}

impl MatrixLayout {
    pub const KB16: Self = Self {
        entries: &KB16_KEY_MAP,
        usages: &KB16_USAGES,
    };

    /// Shortest payload covering every mapped byte.
    pub fn min_len(&self) -> usize {
        self.entries
            .iter()
            .map(|e| usize::from(e.byte_index) + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn usage_at(&self, row: u8, col: u8) -> u8 {
        self.usages
            .get(usize::from(row))
            .and_then(|r| r.get(usize::from(col)))
            .copied()
            .unwrap_or(usage::NONE)
    }

    /// Evaluate every entry against `payload`, update `state` and return
    /// the switches that changed.
    pub fn decode(
        &self,
        payload: &[u8],
        state: &mut KeyState,
    ) -> Result<Vec<MatrixTransition, MATRIX_KEYS>, Error> {
        if payload.len() < self.min_len() {
            return Err(Error::ReportTooShort {
                needed: self.min_len(),
                actual: payload.len(),
            });
        }

        let mut changes = Vec::new();
        for e in self.entries {
            let (row, col) = (usize::from(e.row), usize::from(e.col));
            let pressed = payload[usize::from(e.byte_index)] & e.bit_mask != 0;
            if pressed == state.is_pressed(row, col) {
                continue;
            }
            state.set(row, col, pressed);
            let change = MatrixTransition {
                row: e.row,
                col: e.col,
                pressed,
                usage: self.usage_at(e.row, e.col),
            };
            if changes.push(change).is_err() {
                break;
            }
        }
        Ok(changes)
    }

    /// Build a keyboard report from the pressed switches. Modifier usages
    /// (0xE0..=0xE7) set modifier bits; other keys fill slots in matrix
    /// order, at most six.
    pub fn report(&self, state: &KeyState) -> KeyboardReport {
        let mut report = KeyboardReport::empty(ReportSource::VendorMatrix);
        for (row, cols) in self.usages.iter().enumerate() {
            for (col, &code) in cols.iter().enumerate() {
                if !state.is_pressed(row, col) {
                    continue;
                }
                if (usage::LEFT_CTRL..=usage::RIGHT_GUI).contains(&code) {
                    report.modifier |= 1 << (code - usage::LEFT_CTRL);
                } else if !report.insert_key(code) {
                    debug!("matrix: more than 6 keys held, ({}, {}) not reported", row, col);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(bits: &[(usize, u8)]) -> [u8; 8] {
        let mut p = [0u8; 8];
        for &(byte, mask) in bits {
            p[byte] |= mask;
        }
        p
    }

    #[test]
    fn map_covers_every_cell_once() {
        let mut seen = [[false; MATRIX_COLS]; MATRIX_ROWS];
        for e in KB16_KEY_MAP.iter() {
            assert!(usize::from(e.row) < MATRIX_ROWS && usize::from(e.col) < MATRIX_COLS);
            assert!(!seen[usize::from(e.row)][usize::from(e.col)]);
            seen[usize::from(e.row)][usize::from(e.col)] = true;
        }
    }

    #[test]
    fn byte5_bit5_is_row0_col0() {
        let layout = MatrixLayout::KB16;
        let mut state = KeyState::default();
        let changes = layout.decode(&payload_with(&[(5, 0x20)]), &mut state).unwrap();
        assert_eq!(
            changes.as_slice(),
            &[MatrixTransition { row: 0, col: 0, pressed: true, usage: 0x1E }]
        );
        assert!(state.is_pressed(0, 0));
    }

    #[test]
    fn steady_state_produces_no_transitions() {
        let layout = MatrixLayout::KB16;
        let mut state = KeyState::default();
        let p = payload_with(&[(4, 0x01), (1, 0x02)]);
        assert_eq!(layout.decode(&p, &mut state).unwrap().len(), 2);
        assert!(layout.decode(&p, &mut state).unwrap().is_empty());
        let released = layout.decode(&[0u8; 8], &mut state).unwrap();
        assert_eq!(released.len(), 2);
        assert!(released.iter().all(|t| !t.pressed));
    }

    #[test]
    fn short_payload_leaves_state_untouched() {
        let layout = MatrixLayout::KB16;
        let mut state = KeyState::default();
        assert_eq!(
            layout.decode(&[0xFF; 5], &mut state),
            Err(Error::ReportTooShort { needed: 6, actual: 5 })
        );
        assert_eq!(state.pressed_count(), 0);
    }

    #[test]
    fn report_maps_right_alt_to_modifier_bit() {
        let layout = MatrixLayout::KB16;
        let mut state = KeyState::default();
        // (3,3) RAlt and (2,2) Enter
        layout
            .decode(&payload_with(&[(5, 0x04), (5, 0x08)]), &mut state)
            .unwrap();
        let report = layout.report(&state);
        assert_eq!(report.modifier, 0x40);
        assert_eq!(report.keycodes, [usage::ENTER, 0, 0, 0, 0, 0]);
        assert_eq!(report.source, ReportSource::VendorMatrix);
    }

    #[test]
    fn out_of_range_coordinates_read_released() {
        let state = KeyState::default();
        assert!(!state.is_pressed(4, 0));
        assert!(!state.is_pressed(0, 9));
    }
}
