//! HID report descriptor items and summary.
//!
//! A report descriptor is a sequence of short items, each a one-byte prefix
//! followed by 0, 1, 2 or 4 little-endian data bytes:
//! ```text
//! bits 7..4  bTag
//! bits 3..2  bType (0 = Main, 1 = Global, 2 = Local)
//! bits 1..0  bSize (0, 1, 2, 4 bytes)
//! ```
//! The host fetches the descriptor of every HID interface after claiming it
//! and only dumps it: decoding still goes through the boot layouts or a
//! vendor profile.
//!
//! ## Limitations
//!
//! - Long items (prefix 0xFE) end the walk
//! - Nested collections are tracked by depth only
//! - Push/Pop state is not supported

/// Item type from bits 3..2 of the prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ItemType {
    Main,
    Global,
    Local,
    Reserved,
}

/// One short item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Item {
    pub item_type: ItemType,
    pub tag: u8,
    /// Number of data bytes (0, 1, 2 or 4).
    pub size: u8,
    pub value: u32,
}

/// Iterator over the short items of a report descriptor. Stops at the end
/// of the buffer, at a long item, or at an item whose data is cut off.
#[derive(Clone, Debug)]
pub struct Items<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Items<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

const LONG_ITEM_PREFIX: u8 = 0xFE;

impl Iterator for Items<'_> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        let prefix = *self.data.get(self.pos)?;
        if prefix == LONG_ITEM_PREFIX {
            return None;
        }
        let size = match prefix & 0x03 {
            3 => 4,
            n => usize::from(n),
        };
        let body = self.data.get(self.pos + 1..self.pos + 1 + size)?;
        let value = body
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        self.pos += 1 + size;

        let item_type = match (prefix >> 2) & 0x03 {
            0 => ItemType::Main,
            1 => ItemType::Global,
            2 => ItemType::Local,
            _ => ItemType::Reserved,
        };
        Some(Item {
            item_type,
            tag: prefix >> 4,
            size: size as u8,
            value,
        })
    }
}

/// Usage page codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsagePage {
    /// Generic Desktop (mouse, keyboard, joystick).
    GenericDesktop,
    /// Keyboard/Keypad.
    Keyboard,
    /// LEDs.
    Led,
    /// Button.
    Button,
    /// Consumer Control.
    Consumer,
    /// Vendor-defined (0xFF00..=0xFFFF).
    Vendor(u16),
    Unknown(u16),
}

impl From<u16> for UsagePage {
    fn from(code: u16) -> Self {
        match code {
            0x01 => UsagePage::GenericDesktop,
            0x07 => UsagePage::Keyboard,
            0x08 => UsagePage::Led,
            0x09 => UsagePage::Button,
            0x0C => UsagePage::Consumer,
            0xFF00..=0xFFFF => UsagePage::Vendor(code),
            other => UsagePage::Unknown(other),
        }
    }
}

/// Generic Desktop usage codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DesktopUsage {
    Pointer,
    Mouse,
    Keyboard,
    Keypad,
    X,
    Y,
    Wheel,
    Unknown(u16),
}

impl From<u16> for DesktopUsage {
    fn from(code: u16) -> Self {
        match code {
            0x01 => DesktopUsage::Pointer,
            0x02 => DesktopUsage::Mouse,
            0x06 => DesktopUsage::Keyboard,
            0x07 => DesktopUsage::Keypad,
            0x30 => DesktopUsage::X,
            0x31 => DesktopUsage::Y,
            0x38 => DesktopUsage::Wheel,
            other => DesktopUsage::Unknown(other),
        }
    }
}

// Main item tags
const TAG_INPUT: u8 = 0x08;
const TAG_COLLECTION: u8 = 0x0A;
const TAG_END_COLLECTION: u8 = 0x0C;
// Global item tags
const TAG_USAGE_PAGE: u8 = 0x00;
const TAG_REPORT_SIZE: u8 = 0x07;
const TAG_REPORT_ID: u8 = 0x08;
const TAG_REPORT_COUNT: u8 = 0x09;
// Local item tags
const TAG_USAGE: u8 = 0x00;

/// What a report descriptor declares, for the diagnostic log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportDescriptorSummary {
    pub has_keyboard: bool,
    pub has_mouse: bool,
    pub has_consumer: bool,
    pub has_vendor: bool,
    /// Report ID of the first keyboard input, when report IDs are used.
    pub keyboard_report_id: Option<u8>,
    /// Report ID of the first mouse input, when report IDs are used.
    pub mouse_report_id: Option<u8>,
    /// Report ID of the first consumer input, when report IDs are used.
    pub consumer_report_id: Option<u8>,
    /// Sum of `Report Size * Report Count` over all Input items.
    pub input_bits: u32,
    /// Deepest collection nesting seen.
    pub max_depth: u8,
    pub item_count: u16,
}

impl ReportDescriptorSummary {
    pub fn has_report_ids(&self) -> bool {
        self.keyboard_report_id.is_some()
            || self.mouse_report_id.is_some()
            || self.consumer_report_id.is_some()
    }

    /// Summarise a report descriptor.
    pub fn parse(data: &[u8]) -> Self {
        let mut desc = Self::default();

        // Parser state.
        let mut usage_page = UsagePage::Unknown(0);
        // First usage of the current application collection.
        let mut usage: u16 = 0;
        let mut report_id: u8 = 0;
        let mut report_size: u32 = 0;
        let mut report_count: u32 = 0;
        let mut depth: u8 = 0;

        for item in Items::new(data) {
            desc.item_count = desc.item_count.saturating_add(1);
            match (item.item_type, item.tag) {
                (ItemType::Main, TAG_INPUT) => {
                    desc.input_bits = desc
                        .input_bits
                        .saturating_add(report_size.saturating_mul(report_count));
                    let id = (report_id != 0).then_some(report_id);
                    match usage_page {
                        UsagePage::Keyboard => {
                            desc.has_keyboard = true;
                            desc.keyboard_report_id = desc.keyboard_report_id.or(id);
                        }
                        UsagePage::GenericDesktop | UsagePage::Button
                            if matches!(
                                DesktopUsage::from(usage),
                                DesktopUsage::Mouse | DesktopUsage::Pointer
                            ) =>
                        {
                            desc.has_mouse = true;
                            desc.mouse_report_id = desc.mouse_report_id.or(id);
                        }
                        UsagePage::Consumer => {
                            desc.has_consumer = true;
                            desc.consumer_report_id = desc.consumer_report_id.or(id);
                        }
                        UsagePage::Vendor(_) => desc.has_vendor = true,
                        _ => {}
                    }
                }
                (ItemType::Main, TAG_COLLECTION) => {
                    depth = depth.saturating_add(1);
                    desc.max_depth = desc.max_depth.max(depth);
                }
                (ItemType::Main, TAG_END_COLLECTION) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        usage = 0;
                    }
                }
                (ItemType::Global, TAG_USAGE_PAGE) => usage_page = UsagePage::from(item.value as u16),
                (ItemType::Global, TAG_REPORT_ID) => report_id = item.value as u8,
                (ItemType::Global, TAG_REPORT_SIZE) => report_size = item.value,
                (ItemType::Global, TAG_REPORT_COUNT) => report_count = item.value,
                (ItemType::Local, TAG_USAGE) if depth == 0 || usage == 0 => {
                    usage = item.value as u16;
                }
                _ => {}
            }
        }

        desc
    }
}

/// Log every item of a report descriptor at trace level, then its summary
/// at info level.
pub fn dump(interface: u8, data: &[u8]) -> ReportDescriptorSummary {
    for item in Items::new(data) {
        trace!(
            "if{} report item {:?} tag={:#x} size={} value={:#x}",
            interface,
            item.item_type,
            item.tag,
            item.size,
            item.value
        );
    }
    let summary = ReportDescriptorSummary::parse(data);
    info!(
        "if{} report descriptor: {} bytes, kbd={} mouse={} consumer={} vendor={} input_bits={}",
        interface,
        data.len(),
        summary.has_keyboard,
        summary.has_mouse,
        summary.has_consumer,
        summary.has_vendor,
        summary.input_bits
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Boot keyboard report descriptor (HID 1.11 appendix B.1).
    const BOOT_KEYBOARD: &[u8] = &[
        0x05, 0x01, 0x09, 0x06, 0xA1, 0x01, 0x05, 0x07, 0x19, 0xE0, 0x29, 0xE7, 0x15, 0x00,
        0x25, 0x01, 0x75, 0x01, 0x95, 0x08, 0x81, 0x02, 0x95, 0x01, 0x75, 0x08, 0x81, 0x01,
        0x95, 0x05, 0x75, 0x01, 0x05, 0x08, 0x19, 0x01, 0x29, 0x05, 0x91, 0x02, 0x95, 0x01,
        0x75, 0x03, 0x91, 0x01, 0x95, 0x06, 0x75, 0x08, 0x15, 0x00, 0x25, 0x65, 0x05, 0x07,
        0x19, 0x00, 0x29, 0x65, 0x81, 0x00, 0xC0,
    ];

    #[test]
    fn boot_keyboard_summary() {
        let summary = ReportDescriptorSummary::parse(BOOT_KEYBOARD);
        assert!(summary.has_keyboard);
        assert!(!summary.has_mouse);
        assert!(!summary.has_report_ids());
        // 8 modifier bits + 8 reserved + 48 key bits
        assert_eq!(summary.input_bits, 64);
        assert_eq!(summary.max_depth, 1);
    }

    #[test]
    fn mouse_with_report_id() {
        let data = [
            0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x85, 0x02, 0x09, 0x01, 0xA1, 0x00, 0x05, 0x09,
            0x19, 0x01, 0x29, 0x03, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02, 0xC0, 0xC0,
        ];
        let summary = ReportDescriptorSummary::parse(&data);
        assert!(summary.has_mouse);
        assert_eq!(summary.mouse_report_id, Some(2));
        assert_eq!(summary.max_depth, 2);
    }

    #[test]
    fn vendor_page_is_flagged() {
        let data = [0x06, 0x00, 0xFF, 0x09, 0x01, 0xA1, 0x01, 0x75, 0x08, 0x95, 0x20, 0x81, 0x02, 0xC0];
        let summary = ReportDescriptorSummary::parse(&data);
        assert!(summary.has_vendor);
        assert_eq!(summary.input_bits, 256);
    }

    #[test]
    fn items_decode_little_endian_values() {
        let items: heapless::Vec<Item, 4> = Items::new(&[0x26, 0xFF, 0x00, 0x05, 0x0C]).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_type, ItemType::Global);
        assert_eq!(items[0].tag, 0x02);
        assert_eq!(items[0].value, 0x00FF);
        assert_eq!(items[1].value, 0x0C);
    }

    #[test]
    fn truncated_item_ends_walk() {
        assert_eq!(Items::new(&[0x05, 0x01, 0x26, 0xFF]).count(), 1);
        assert_eq!(Items::new(&[0xFE, 0x02, 0x00, 0x00]).count(), 0);
    }
}
