//! Per-device profiles for keyboards that do not send boot-protocol
//! reports.
//!
//! A profile is matched once, by VID/PID, when a device finishes
//! configuration; the decode strategy it names is then used for every HID
//! endpoint of that device until it detaches.

pub mod byte_scan;
pub mod matrix;

use crate::config::{DOIO_KB16_PID, DOIO_VID};
use crate::hid::keymap::Locale;
use crate::hid::mouse::MouseLayout;

pub use byte_scan::ByteScanLayout;
pub use matrix::{KeyMapEntry, KeyState, MatrixLayout};

/// How a vendor payload becomes a keyboard report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeStrategy {
    /// Scan payload bytes for key usages.
    ByteScan(ByteScanLayout),
    /// Evaluate a fixed bit map into a key matrix.
    Matrix(MatrixLayout),
}

impl DecodeStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DecodeStrategy::ByteScan(_) => "byte-scan",
            DecodeStrategy::Matrix(_) => "matrix-bit",
        }
    }
}

/// A device known to need special handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceProfile {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Decoder for HID endpoints. `None` keeps the boot-protocol path.
    pub strategy: Option<DecodeStrategy>,
    /// Fixed translation locale, overriding configuration and country code.
    pub locale: Option<Locale>,
    pub mouse_layout: MouseLayout,
}

impl DeviceProfile {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// DOIO KB16 decoded through its key-matrix bit map.
pub const KB16_MATRIX: DeviceProfile = DeviceProfile {
    name: "DOIO KB16",
    vendor_id: DOIO_VID,
    product_id: DOIO_KB16_PID,
    strategy: Some(DecodeStrategy::Matrix(MatrixLayout::KB16)),
    locale: None,
    mouse_layout: MouseLayout::Boot,
};

/// DOIO KB16 firmware revision sending modifier + usages from byte 0.
pub const KB16_BYTE_SCAN: DeviceProfile = DeviceProfile {
    name: "DOIO KB16 (byte-scan)",
    strategy: Some(DecodeStrategy::ByteScan(ByteScanLayout::KB16_MODIFIER_FIRST)),
    ..KB16_MATRIX
};

/// DOIO KB16 firmware revision sending a 16-byte report with the modifier
/// at byte 1.
pub const KB16_BYTE_SCAN_OFFSET: DeviceProfile = DeviceProfile {
    name: "DOIO KB16 (byte-scan, offset)",
    strategy: Some(DecodeStrategy::ByteScan(ByteScanLayout::KB16_MODIFIER_SECOND)),
    ..KB16_MATRIX
};

/// Profiles consulted by default.
pub static BUILTIN_PROFILES: &[DeviceProfile] = &[KB16_MATRIX];

/// First profile in `profiles` matching VID/PID.
pub fn find_profile(
    profiles: &'static [DeviceProfile],
    vendor_id: u16,
    product_id: u16,
) -> Option<&'static DeviceProfile> {
    profiles.iter().find(|p| p.matches(vendor_id, product_id))
}
