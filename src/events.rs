//! Outbound events.
//!
//! The application implements [`EventSink`] once (display, BLE forwarder,
//! test recorder...) and hands it to the host driver. Every method has an
//! empty default so a sink only overrides what it consumes.
//!
//! [`QueueSink`] turns the callbacks into owned [`HostEvent`] values pushed
//! through a single-producer/single-consumer queue, for applications that
//! consume events from another context than the one running the driver.

use heapless::spsc::Producer;
use heapless::Vec;

use crate::config::MAX_PACKET_LEN;
use crate::hid::keyboard::KeyboardReport;
use crate::hid::mouse::{MouseButtons, MouseReport};
use crate::usb::{DeviceStrings, EndpointAddress, UsbDeviceInfo};

/// A key went down or up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub usage: u8,
    /// ASCII for the active locale, or `keymap::NO_CHAR`.
    pub ascii: u8,
    /// Modifier byte of the report that produced the event.
    pub modifier: u8,
    pub pressed: bool,
}

/// Consumer of normalized device events.
#[allow(unused_variables)]
pub trait EventSink {
    fn on_device_connected(&mut self, info: &UsbDeviceInfo, strings: &DeviceStrings) {}

    fn on_device_gone(&mut self) {}

    /// A keyboard report differing from the previous one.
    fn on_keyboard_report(&mut self, current: &KeyboardReport, previous: &KeyboardReport) {}

    fn on_key_event(&mut self, event: KeyEvent) {}

    /// Every decoded mouse report.
    fn on_mouse_report(&mut self, current: &MouseReport, previous_buttons: MouseButtons) {}

    /// One button changed state.
    fn on_mouse_buttons_changed(&mut self, button: MouseButtons, pressed: bool) {}

    /// The report carried a non-zero x/y/wheel delta.
    fn on_mouse_moved(&mut self, report: &MouseReport) {}

    /// Payload from an endpoint with no decoder.
    fn on_unrecognized_data(&mut self, endpoint: EndpointAddress, data: &[u8]) {}

    /// A vendor key-matrix switch changed state.
    fn on_matrix_key_changed(&mut self, row: u8, col: u8, pressed: bool) {}
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn on_device_connected(&mut self, info: &UsbDeviceInfo, strings: &DeviceStrings) {
        (**self).on_device_connected(info, strings)
    }
    fn on_device_gone(&mut self) {
        (**self).on_device_gone()
    }
    fn on_keyboard_report(&mut self, current: &KeyboardReport, previous: &KeyboardReport) {
        (**self).on_keyboard_report(current, previous)
    }
    fn on_key_event(&mut self, event: KeyEvent) {
        (**self).on_key_event(event)
    }
    fn on_mouse_report(&mut self, current: &MouseReport, previous_buttons: MouseButtons) {
        (**self).on_mouse_report(current, previous_buttons)
    }
    fn on_mouse_buttons_changed(&mut self, button: MouseButtons, pressed: bool) {
        (**self).on_mouse_buttons_changed(button, pressed)
    }
    fn on_mouse_moved(&mut self, report: &MouseReport) {
        (**self).on_mouse_moved(report)
    }
    fn on_unrecognized_data(&mut self, endpoint: EndpointAddress, data: &[u8]) {
        (**self).on_unrecognized_data(endpoint, data)
    }
    fn on_matrix_key_changed(&mut self, row: u8, col: u8, pressed: bool) {
        (**self).on_matrix_key_changed(row, col, pressed)
    }
}

/// Owned form of every [`EventSink`] callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    DeviceConnected {
        vendor_id: u16,
        product_id: u16,
        strings: DeviceStrings,
    },
    DeviceGone,
    KeyboardReport {
        current: KeyboardReport,
        previous: KeyboardReport,
    },
    Key(KeyEvent),
    MouseReport {
        current: MouseReport,
        previous_buttons: MouseButtons,
    },
    MouseButton {
        button: MouseButtons,
        pressed: bool,
    },
    MouseMoved(MouseReport),
    /// Payload truncated to `MAX_PACKET_LEN`.
    Unrecognized {
        endpoint: EndpointAddress,
        data: Vec<u8, MAX_PACKET_LEN>,
    },
    MatrixKey {
        row: u8,
        col: u8,
        pressed: bool,
    },
}

/// [`EventSink`] that enqueues [`HostEvent`]s.
///
/// When the consumer falls behind, new events are dropped and counted.
pub struct QueueSink<'q, const N: usize> {
    producer: Producer<'q, HostEvent, N>,
    dropped: u32,
}

impl<'q, const N: usize> QueueSink<'q, N> {
    pub fn new(producer: Producer<'q, HostEvent, N>) -> Self {
        Self {
            producer,
            dropped: 0,
        }
    }

    /// Events lost to a full queue so far.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    fn push(&mut self, event: HostEvent) {
        if self.producer.enqueue(event).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("event queue full - dropping event ({} dropped)", self.dropped);
        }
    }
}

impl<const N: usize> EventSink for QueueSink<'_, N> {
    fn on_device_connected(&mut self, info: &UsbDeviceInfo, strings: &DeviceStrings) {
        self.push(HostEvent::DeviceConnected {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            strings: strings.clone(),
        });
    }

    fn on_device_gone(&mut self) {
        self.push(HostEvent::DeviceGone);
    }

    fn on_keyboard_report(&mut self, current: &KeyboardReport, previous: &KeyboardReport) {
        self.push(HostEvent::KeyboardReport {
            current: *current,
            previous: *previous,
        });
    }

    fn on_key_event(&mut self, event: KeyEvent) {
        self.push(HostEvent::Key(event));
    }

    fn on_mouse_report(&mut self, current: &MouseReport, previous_buttons: MouseButtons) {
        self.push(HostEvent::MouseReport {
            current: *current,
            previous_buttons,
        });
    }

    fn on_mouse_buttons_changed(&mut self, button: MouseButtons, pressed: bool) {
        self.push(HostEvent::MouseButton { button, pressed });
    }

    fn on_mouse_moved(&mut self, report: &MouseReport) {
        self.push(HostEvent::MouseMoved(*report));
    }

    fn on_unrecognized_data(&mut self, endpoint: EndpointAddress, data: &[u8]) {
        let data = &data[..data.len().min(MAX_PACKET_LEN)];
        let mut copy = Vec::new();
        // Cannot fail: `data` is at most MAX_PACKET_LEN long.
        let _ = copy.extend_from_slice(data);
        self.push(HostEvent::Unrecognized {
            endpoint,
            data: copy,
        });
    }

    fn on_matrix_key_changed(&mut self, row: u8, col: u8, pressed: bool) {
        self.push(HostEvent::MatrixKey { row, col, pressed });
    }
}
