//! Standard and HID class descriptor parsing.
//!
//! A configuration descriptor is a concatenation of variable-length
//! descriptors, each starting with the same two-byte header:
//! ```text
//! Byte 0: bLength          (length of this descriptor, header included)
//! Byte 1: bDescriptorType
//! Byte 2..bLength: descriptor body
//! ```
//! [`DescriptorWalker`] steps through such a buffer without ever reading
//! past `min(wTotalLength, buffer length)`. A zero/one `bLength`, or one
//! that runs past the limit, yields a single error and ends the walk.
//! The walker borrows the buffer immutably, so walking it again yields the
//! same sequence.

use heapless::String;

use crate::config::STRING_DESC_LEN;
use crate::error::DescriptorError;
use crate::usb::{EndpointAddress, TransferType};

/// Standard descriptor type codes (USB 2.0 table 9-5, HID 1.11 §7.1).
pub mod descriptor_type {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const INTERFACE_ASSOCIATION: u8 = 0x0B;
    pub const HID: u8 = 0x21;
    pub const REPORT: u8 = 0x22;
}

pub const DEVICE_DESCRIPTOR_LEN: usize = 18;
pub const CONFIGURATION_DESCRIPTOR_LEN: usize = 9;
pub const INTERFACE_DESCRIPTOR_LEN: usize = 9;
pub const ENDPOINT_DESCRIPTOR_LEN: usize = 7;
pub const HID_DESCRIPTOR_LEN: usize = 9;
pub const INTERFACE_ASSOCIATION_DESCRIPTOR_LEN: usize = 8;

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

// Walker

/// One descriptor as found in the buffer: its type and its full bytes
/// (header included).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    pub descriptor_type: u8,
    pub bytes: &'a [u8],
}

impl<'a> RawDescriptor<'a> {
    /// Decode into a typed view. Unknown types, and known types too short
    /// for their fixed layout, come back as [`Descriptor::Unknown`].
    pub fn parse(&self) -> Descriptor<'a> {
        let b = self.bytes;
        let typed = match self.descriptor_type {
            descriptor_type::DEVICE => DeviceDescriptor::from_bytes(b).map(Descriptor::Device),
            descriptor_type::CONFIGURATION => {
                ConfigurationDescriptor::from_bytes(b).map(Descriptor::Configuration)
            }
            descriptor_type::INTERFACE => {
                InterfaceDescriptor::from_bytes(b).map(Descriptor::Interface)
            }
            descriptor_type::ENDPOINT => EndpointDescriptor::from_bytes(b).map(Descriptor::Endpoint),
            descriptor_type::HID => HidDescriptor::from_bytes(b).map(Descriptor::Hid),
            descriptor_type::INTERFACE_ASSOCIATION => {
                InterfaceAssociationDescriptor::from_bytes(b).map(Descriptor::InterfaceAssociation)
            }
            descriptor_type::STRING => b.get(2..).map(Descriptor::String),
            _ => None,
        };
        typed.unwrap_or(Descriptor::Unknown {
            descriptor_type: self.descriptor_type,
            bytes: b,
        })
    }
}

/// Lazy iterator over the descriptors packed in a buffer.
#[derive(Clone, Debug)]
pub struct DescriptorWalker<'a> {
    buf: &'a [u8],
    offset: usize,
    limit: usize,
    done: bool,
}

impl<'a> DescriptorWalker<'a> {
    /// Walk `buf` up to `total_length` bytes, clamped to the buffer.
    pub fn new(buf: &'a [u8], total_length: usize) -> Self {
        Self {
            buf,
            offset: 0,
            limit: total_length.min(buf.len()),
            done: false,
        }
    }

    /// Walk a configuration descriptor, taking the limit from its own
    /// `wTotalLength` field.
    pub fn configuration(buf: &'a [u8]) -> Self {
        let total = if buf.len() >= 4 {
            usize::from(le16(buf, 2))
        } else {
            buf.len()
        };
        Self::new(buf, total)
    }

    /// Offset of the next descriptor.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn fail(&mut self, e: DescriptorError) -> Option<Result<RawDescriptor<'a>, DescriptorError>> {
        self.done = true;
        Some(Err(e))
    }
}

impl<'a> Iterator for DescriptorWalker<'a> {
    type Item = Result<RawDescriptor<'a>, DescriptorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.limit {
            return None;
        }

        let offset = self.offset;
        if self.limit - offset < 2 {
            return self.fail(DescriptorError::Truncated { offset });
        }

        let length = self.buf[offset];
        if length < 2 {
            return self.fail(DescriptorError::InvalidLength { offset, length });
        }

        let end = offset + usize::from(length);
        if end > self.limit {
            return self.fail(DescriptorError::Overflow {
                offset,
                length,
                limit: self.limit,
            });
        }

        self.offset = end;
        Some(Ok(RawDescriptor {
            descriptor_type: self.buf[offset + 1],
            bytes: &self.buf[offset..end],
        }))
    }
}

impl core::iter::FusedIterator for DescriptorWalker<'_> {}

// Typed views

/// A decoded descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Descriptor<'a> {
    Device(DeviceDescriptor),
    Configuration(ConfigurationDescriptor),
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
    Hid(HidDescriptor),
    InterfaceAssociation(InterfaceAssociationDescriptor),
    /// UTF-16LE string body (header stripped).
    String(&'a [u8]),
    Unknown { descriptor_type: u8, bytes: &'a [u8] },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    pub usb_version: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < DEVICE_DESCRIPTOR_LEN {
            return None;
        }
        Some(Self {
            usb_version: le16(b, 2),
            class: b[4],
            subclass: b[5],
            protocol: b[6],
            max_packet_size0: b[7],
            vendor_id: le16(b, 8),
            product_id: le16(b, 10),
            device_version: le16(b, 12),
            manufacturer_index: b[14],
            product_index: b[15],
            serial_index: b[16],
            num_configurations: b[17],
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationDescriptor {
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub configuration_index: u8,
    pub attributes: u8,
    /// In 2 mA units.
    pub max_power: u8,
}

impl ConfigurationDescriptor {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < CONFIGURATION_DESCRIPTOR_LEN {
            return None;
        }
        Some(Self {
            total_length: le16(b, 2),
            num_interfaces: b[4],
            configuration_value: b[5],
            configuration_index: b[6],
            attributes: b[7],
            max_power: b[8],
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < INTERFACE_DESCRIPTOR_LEN {
            return None;
        }
        Some(Self {
            number: b[2],
            alternate_setting: b[3],
            num_endpoints: b[4],
            class: b[5],
            subclass: b[6],
            protocol: b[7],
            interface_index: b[8],
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointDescriptor {
    pub address: EndpointAddress,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < ENDPOINT_DESCRIPTOR_LEN {
            return None;
        }
        Some(Self {
            address: EndpointAddress(b[2]),
            attributes: b[3],
            max_packet_size: le16(b, 4),
            interval: b[6],
        })
    }

    pub fn transfer_type(&self) -> TransferType {
        TransferType::from_attributes(self.attributes)
    }

    /// `wMaxPacketSize` without the high-bandwidth multiplier bits.
    pub fn packet_size(&self) -> u16 {
        self.max_packet_size & 0x07FF
    }

    pub fn is_interrupt_in(&self) -> bool {
        self.transfer_type() == TransferType::Interrupt && self.address.is_in()
    }
}

/// HID class descriptor (HID 1.11 §6.2.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidDescriptor {
    pub hid_version: u16,
    pub country_code: u8,
    pub num_descriptors: u8,
    /// `wDescriptorLength` of the first report descriptor listed, or 0.
    pub report_descriptor_length: u16,
}

impl HidDescriptor {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < 6 {
            return None;
        }
        let num_descriptors = b[5];
        // Class descriptor list: (bDescriptorType, wDescriptorLength) triplets.
        let report_descriptor_length = b[6..]
            .chunks_exact(3)
            .take(usize::from(num_descriptors))
            .find(|entry| entry[0] == descriptor_type::REPORT)
            .map(|entry| u16::from_le_bytes([entry[1], entry[2]]))
            .unwrap_or(0);
        Some(Self {
            hid_version: le16(b, 2),
            country_code: b[4],
            num_descriptors,
            report_descriptor_length,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceAssociationDescriptor {
    pub first_interface: u8,
    pub interface_count: u8,
    pub function_class: u8,
    pub function_subclass: u8,
    pub function_protocol: u8,
}

impl InterfaceAssociationDescriptor {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < INTERFACE_ASSOCIATION_DESCRIPTOR_LEN {
            return None;
        }
        Some(Self {
            first_interface: b[2],
            interface_count: b[3],
            function_class: b[4],
            function_subclass: b[5],
            function_protocol: b[6],
        })
    }
}

/// Decode a string descriptor (header included) from UTF-16LE.
///
/// Only code units that fit in Latin-1 are kept; anything above 0xFF is
/// skipped. Output stops when the next character no longer fits in
/// `STRING_DESC_LEN` UTF-8 bytes (code units 0x80..=0xFF take two) or the
/// descriptor's own `bLength` is reached.
pub fn decode_string(bytes: &[u8]) -> String<STRING_DESC_LEN> {
    let mut out = String::new();
    if bytes.len() < 2 {
        return out;
    }
    let end = usize::from(bytes[0]).clamp(2, bytes.len());
    for unit in bytes[2..end].chunks_exact(2) {
        let code = u16::from_le_bytes([unit[0], unit[1]]);
        let Ok(latin1) = u8::try_from(code) else {
            continue;
        };
        if out.push(char::from(latin1)).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Boot keyboard: config + interface + HID + endpoint 0x81.
    const BOOT_KEYBOARD_CONFIG: [u8; 34] = [
        0x09, 0x02, 0x22, 0x00, 0x01, 0x01, 0x00, 0xA0, 0x32, // configuration
        0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00, // interface 0, HID boot kbd
        0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3F, 0x00, // HID, report desc 63 bytes
        0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0A, // endpoint 0x81, interrupt, 8 bytes, 10 ms
    ];

    fn types(buf: &[u8]) -> heapless::Vec<u8, 16> {
        DescriptorWalker::configuration(buf)
            .filter_map(Result::ok)
            .map(|d| d.descriptor_type)
            .collect()
    }

    #[test]
    fn walks_boot_keyboard_configuration() {
        assert_eq!(
            types(&BOOT_KEYBOARD_CONFIG).as_slice(),
            &[0x02, 0x04, 0x21, 0x05]
        );
    }

    #[test]
    fn typed_views_decode_fields() {
        let parsed: heapless::Vec<Descriptor, 8> = DescriptorWalker::configuration(&BOOT_KEYBOARD_CONFIG)
            .filter_map(Result::ok)
            .map(|d| d.parse())
            .collect();

        match parsed[0] {
            Descriptor::Configuration(c) => {
                assert_eq!(c.total_length, 34);
                assert_eq!(c.num_interfaces, 1);
            }
            other => panic!("expected configuration, got {:?}", other),
        }
        match parsed[1] {
            Descriptor::Interface(i) => {
                assert_eq!((i.class, i.subclass, i.protocol), (0x03, 0x01, 0x01));
            }
            other => panic!("expected interface, got {:?}", other),
        }
        match parsed[2] {
            Descriptor::Hid(h) => {
                assert_eq!(h.country_code, 0);
                assert_eq!(h.report_descriptor_length, 63);
            }
            other => panic!("expected HID, got {:?}", other),
        }
        match parsed[3] {
            Descriptor::Endpoint(e) => {
                assert!(e.is_interrupt_in());
                assert_eq!(e.address.number(), 1);
                assert_eq!(e.packet_size(), 8);
                assert_eq!(e.interval, 10);
            }
            other => panic!("expected endpoint, got {:?}", other),
        }
    }

    #[test]
    fn zero_length_stops_the_walk_with_an_error() {
        let buf = [0x09, 0x02, 0x0C, 0x00, 0x01, 0x01, 0x00, 0xA0, 0x32, 0x00, 0x04, 0x00];
        let mut walker = DescriptorWalker::configuration(&buf);
        assert!(matches!(walker.next(), Some(Ok(_))));
        assert_eq!(
            walker.next(),
            Some(Err(DescriptorError::InvalidLength { offset: 9, length: 0 }))
        );
        assert_eq!(walker.next(), None);
    }

    #[test]
    fn overflowing_length_is_rejected() {
        let buf = [0x09, 0x02, 0x10, 0x00, 0x01, 0x01, 0x00, 0xA0, 0x32, 0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01];
        let results: heapless::Vec<_, 4> = DescriptorWalker::configuration(&buf).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1],
            Err(DescriptorError::Overflow { offset: 9, length: 9, limit: 16 })
        );
    }

    #[test]
    fn declared_total_longer_than_buffer_stops_at_buffer_end() {
        // wTotalLength says 0x22 but only the configuration + interface arrived.
        let buf = &BOOT_KEYBOARD_CONFIG[..18];
        let results: heapless::Vec<_, 4> = DescriptorWalker::configuration(buf).collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn declared_total_shorter_than_buffer_is_honoured() {
        let mut buf = BOOT_KEYBOARD_CONFIG;
        buf[2] = 18;
        assert_eq!(types(&buf).as_slice(), &[0x02, 0x04]);
    }

    #[test]
    fn single_trailing_byte_is_truncated() {
        let buf = [0x04, 0x24, 0x00, 0x00, 0x05];
        let results: heapless::Vec<_, 4> = DescriptorWalker::new(&buf, buf.len()).collect();
        assert_eq!(results[1], Err(DescriptorError::Truncated { offset: 4 }));
    }

    #[test]
    fn unknown_and_short_descriptors_surface_as_unknown() {
        let cs_interface = RawDescriptor { descriptor_type: 0x24, bytes: &[0x04, 0x24, 0x01, 0x02] };
        assert!(matches!(
            cs_interface.parse(),
            Descriptor::Unknown { descriptor_type: 0x24, .. }
        ));

        let short_endpoint = RawDescriptor { descriptor_type: 0x05, bytes: &[0x04, 0x05, 0x81, 0x03] };
        assert!(matches!(
            short_endpoint.parse(),
            Descriptor::Unknown { descriptor_type: 0x05, .. }
        ));
    }

    #[test]
    fn string_descriptor_skips_non_latin1_units() {
        // "Aあb" in UTF-16LE
        let bytes = [0x08, 0x03, 0x41, 0x00, 0x42, 0x30, 0x62, 0x00];
        assert_eq!(decode_string(&bytes).as_str(), "Ab");
    }

    #[test]
    fn string_descriptor_capacity_counts_utf8_bytes() {
        // 20 × 'é' (U+00E9) is 40 UTF-8 bytes; only 16 fit.
        let mut bytes = [0u8; 2 + 2 * 20];
        bytes[0] = bytes.len() as u8;
        bytes[1] = 0x03;
        for unit in bytes[2..].chunks_exact_mut(2) {
            unit[0] = 0xE9;
        }
        let s = decode_string(&bytes);
        assert_eq!(s.len(), STRING_DESC_LEN);
        assert_eq!(s.chars().count(), 16);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn string_descriptor_respects_blength() {
        let bytes = [0x04, 0x03, 0x44, 0x00, 0x45, 0x00];
        assert_eq!(decode_string(&bytes).as_str(), "D");
    }
}
