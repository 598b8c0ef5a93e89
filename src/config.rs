//! Crate-wide constants and runtime configuration.
//!
//! Buffer capacities, timing parameters and known device IDs live here
//! so they can be tuned in one place.

use crate::hid::keymap::Locale;
use crate::quirks::{DeviceProfile, BUILTIN_PROFILES};

// Enumeration

/// Largest configuration descriptor we accept (bytes).
pub const CONFIG_BUFFER_LEN: usize = 512;

/// Maximum number of claimed interfaces tracked per device.
pub const MAX_INTERFACES: usize = 8;

/// Maximum number of live interrupt-IN endpoints tracked per device.
pub const MAX_ENDPOINTS: usize = 8;

/// Longest decoded string descriptor kept, in UTF-8 bytes.
pub const STRING_DESC_LEN: usize = 32;

/// USB language ID used for string descriptor requests (English, US).
pub const LANGID_EN_US: u16 = 0x0409;

// Transfers

/// Largest interrupt payload copied into a completion event (bytes).
pub const MAX_PACKET_LEN: usize = 64;

/// Largest control-transfer response we keep (report descriptors).
pub const MAX_CONTROL_LEN: usize = 256;

/// Capacity of the controller event queue drained by each tick.
pub const EVENT_QUEUE_LEN: usize = 16;

/// Bounded wait for host-library / client events per tick (ms).
pub const EVENT_WAIT_MS: u32 = 1;

/// Polling interval used when an endpoint reports `bInterval == 0` (ms).
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1;

// Known devices

/// DOIO vendor ID.
pub const DOIO_VID: u16 = 0xD010;

/// DOIO KB16 16-key macro pad.
pub const DOIO_KB16_PID: u16 = 0x1601;

/// HID country code for Japan (Katakana).
pub const COUNTRY_CODE_JAPAN: u8 = 15;

/// Runtime configuration, set once when the host driver is constructed.
#[derive(Clone, Copy, Debug)]
pub struct HostConfig {
    /// Keycode translation locale.
    pub locale: Locale,
    /// Switch to the Japanese table when a HID descriptor reports
    /// `bCountryCode == 15` and no profile pins the locale.
    pub follow_country_code: bool,
    /// Bounded wait passed to the controller each tick (ms).
    pub event_wait_ms: u32,
    /// Request each HID interface's report descriptor for the diagnostic
    /// dump.
    pub fetch_report_descriptor: bool,
    /// Vendor profiles matched by VID/PID at enumeration time.
    pub profiles: &'static [DeviceProfile],
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            locale: Locale::Us,
            follow_country_code: true,
            event_wait_ms: EVENT_WAIT_MS,
            fetch_report_descriptor: true,
            profiles: BUILTIN_PROFILES,
        }
    }
}

impl HostConfig {
    /// Default configuration with a fixed locale.
    pub fn with_locale(locale: Locale) -> Self {
        Self {
            locale,
            follow_country_code: false,
            ..Self::default()
        }
    }
}
