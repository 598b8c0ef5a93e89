//! Canonical mouse report.
//!
//! Boot-protocol layout (3 or 4 bytes):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left, Bit 1 = Right, Bit 2 = Middle,
//!         Bit 3 = Back, Bit 4 = Forward
//! Byte 1: X displacement (signed, -127..127)
//! Byte 2: Y displacement (signed, -127..127)
//! Byte 3: Scroll wheel  (signed, optional)
//! ```
//!
//! Some mice prefix a report ID and use 16-bit axes; [`MouseLayout::ReportId`]
//! reads the low byte of each field from that layout.

use bitflags::bitflags;

bitflags! {
    /// Mouse buttons carried in a report.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MouseButtons: u8 {
        const LEFT    = 0x01;
        const RIGHT   = 0x02;
        const MIDDLE  = 0x04;
        const BACK    = 0x08;
        const FORWARD = 0x10;
    }
}

/// Where each field sits in the raw payload.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MouseLayout {
    /// buttons, x, y, wheel at offsets 0..=3 (wheel optional).
    #[default]
    Boot,
    /// report ID at 0, buttons at 1, x at 2, y at 4, wheel at 6
    /// (wheel optional).
    ReportId,
}

impl MouseLayout {
    const fn offsets(self) -> (usize, usize, usize, usize) {
        match self {
            MouseLayout::Boot => (0, 1, 2, 3),
            MouseLayout::ReportId => (1, 2, 4, 6),
        }
    }

    /// Bytes needed before the wheel field.
    pub const fn min_len(self) -> usize {
        self.offsets().2 + 1
    }
}

/// Mouse report: buttons and signed deltas.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield, see [`MouseButtons`].
    pub buttons: u8,
    /// Relative X movement (signed).
    pub x: i8,
    /// Relative Y movement (signed).
    pub y: i8,
    /// Scroll wheel delta (signed).
    pub wheel: i8,
}

impl MouseReport {
    /// Parse `data` according to `layout`.
    ///
    /// Returns `None` when the payload ends before the Y field; a missing
    /// wheel byte reads as 0.
    pub fn from_bytes(data: &[u8], layout: MouseLayout) -> Option<Self> {
        if data.len() < layout.min_len() {
            return None;
        }
        let (buttons, x, y, wheel) = layout.offsets();
        Some(Self {
            buttons: data[buttons],
            x: data[x] as i8,
            y: data[y] as i8,
            wheel: data.get(wheel).map_or(0, |&w| w as i8),
        })
    }

    pub fn buttons(&self) -> MouseButtons {
        MouseButtons::from_bits_truncate(self.buttons)
    }

    /// Any non-zero x/y/wheel delta.
    pub fn has_motion(&self) -> bool {
        self.x != 0 || self.y != 0 || self.wheel != 0
    }

    /// Returns `true` when no buttons are pressed and there is no movement.
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && !self.has_motion()
    }
}
