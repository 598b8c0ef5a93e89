//! USB host side: descriptor walking, the controller seam, the
//! interface/endpoint registry and the enumeration/polling driver.

pub mod descriptor;
pub mod driver;
pub mod host;
pub mod registry;

use heapless::String;

use crate::config::{DEFAULT_POLL_INTERVAL_MS, STRING_DESC_LEN};

/// Interface class code for HID.
pub const CLASS_HID: u8 = 0x03;
/// HID interface subclass: boot interface.
pub const SUBCLASS_BOOT: u8 = 0x01;
/// HID boot interface protocol: keyboard.
pub const PROTOCOL_KEYBOARD: u8 = 0x01;
/// HID boot interface protocol: mouse.
pub const PROTOCOL_MOUSE: u8 = 0x02;

/// Decoder family implied by an interface's class triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterfaceKind {
    BootKeyboard,
    BootMouse,
    /// HID without a boot protocol (report protocol only).
    OtherHid,
    NonHid,
}

impl InterfaceKind {
    pub fn classify(class: u8, subclass: u8, protocol: u8) -> Self {
        match (class, subclass, protocol) {
            (CLASS_HID, SUBCLASS_BOOT, PROTOCOL_KEYBOARD) => InterfaceKind::BootKeyboard,
            (CLASS_HID, SUBCLASS_BOOT, PROTOCOL_MOUSE) => InterfaceKind::BootMouse,
            (CLASS_HID, _, _) => InterfaceKind::OtherHid,
            _ => InterfaceKind::NonHid,
        }
    }

    pub fn is_hid(self) -> bool {
        self != InterfaceKind::NonHid
    }
}

/// Bus speed of the attached device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    Low,
    #[default]
    Full,
    High,
}

/// Transfer type from the low two bits of `bmAttributes`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl TransferType {
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & 0x03 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host to device.
    Out,
    /// Device to host.
    In,
}

/// `bEndpointAddress`: endpoint number in bits 0..3, direction in bit 7.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointAddress(pub u8);

impl EndpointAddress {
    pub fn number(self) -> u8 {
        self.0 & 0x0F
    }

    pub fn direction(self) -> Direction {
        if self.0 & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn is_in(self) -> bool {
        self.direction() == Direction::In
    }
}

/// Convert an interrupt endpoint's `bInterval` to a polling period in
/// milliseconds.
///
/// Low/full speed express the interval directly in frames (1 ms). High
/// speed uses `2^(bInterval-1)` micro-frames of 125 µs. The result is
/// never below `DEFAULT_POLL_INTERVAL_MS`.
pub fn interval_ms(speed: Speed, b_interval: u8) -> u32 {
    match speed {
        Speed::Low | Speed::Full => u32::from(b_interval).max(DEFAULT_POLL_INTERVAL_MS),
        Speed::High => {
            let exponent = u32::from(b_interval.clamp(1, 16)) - 1;
            ((1u32 << exponent) / 8).max(DEFAULT_POLL_INTERVAL_MS)
        }
    }
}

/// Identity of the attached device, captured once at attach time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    /// Bus address assigned by the controller.
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub speed: Speed,
    /// `bMaxPacketSize0` of the default control pipe.
    pub max_packet_size0: u8,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_index: u8,
    /// The device descriptor exactly as read from the device.
    pub raw_descriptor: [u8; descriptor::DEVICE_DESCRIPTOR_LEN],
}

/// Decoded manufacturer / product / serial strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceStrings {
    pub manufacturer: String<STRING_DESC_LEN>,
    pub product: String<STRING_DESC_LEN>,
    pub serial: String<STRING_DESC_LEN>,
}
