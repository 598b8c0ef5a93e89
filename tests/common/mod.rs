//! Shared fixtures: a scripted host controller, a recording sink and
//! descriptor builders.

#![allow(dead_code)]

use std::collections::VecDeque;

use usbhid_bridge::events::{EventSink, HostEvent, KeyEvent};
use usbhid_bridge::hid::keyboard::KeyboardReport;
use usbhid_bridge::hid::mouse::{MouseButtons, MouseReport};
use usbhid_bridge::usb::host::{ControllerEvent, EventQueue, HostController, SetupPacket};
use usbhid_bridge::usb::{DeviceStrings, EndpointAddress, Speed, UsbDeviceInfo};
use usbhid_bridge::TransportError;

// ═══════════════════════════════════════════════════════════════════════════
// Descriptor Builders
// ═══════════════════════════════════════════════════════════════════════════

pub fn device_descriptor(vendor_id: u16, product_id: u16) -> [u8; 18] {
    let [vid_lo, vid_hi] = vendor_id.to_le_bytes();
    let [pid_lo, pid_hi] = product_id.to_le_bytes();
    [
        18, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 64, vid_lo, vid_hi, pid_lo, pid_hi, 0x00, 0x01,
        1, 2, 3, 1,
    ]
}

/// Configuration header followed by `body`, with `wTotalLength` filled in.
pub fn config_descriptor(num_interfaces: u8, body: &[u8]) -> Vec<u8> {
    let total = (9 + body.len()) as u16;
    let [lo, hi] = total.to_le_bytes();
    let mut out = vec![0x09, 0x02, lo, hi, num_interfaces, 0x01, 0x00, 0xA0, 0x32];
    out.extend_from_slice(body);
    out
}

pub fn interface(number: u8, alt: u8, num_endpoints: u8, class: u8, subclass: u8, protocol: u8) -> [u8; 9] {
    [0x09, 0x04, number, alt, num_endpoints, class, subclass, protocol, 0x00]
}

pub fn hid(country_code: u8, report_len: u16) -> [u8; 9] {
    let [lo, hi] = report_len.to_le_bytes();
    [0x09, 0x21, 0x11, 0x01, country_code, 0x01, 0x22, lo, hi]
}

pub fn endpoint(address: u8, attributes: u8, max_packet: u16, interval: u8) -> [u8; 7] {
    let [lo, hi] = max_packet.to_le_bytes();
    [0x07, 0x05, address, attributes, lo, hi, interval]
}

pub fn string_descriptor(s: &str) -> Vec<u8> {
    let mut out = vec![0, 0x03];
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out[0] = out.len() as u8;
    out
}

/// Single boot keyboard on interface 0, endpoint 0x81, 8 bytes every
/// 10 ms, 63-byte report descriptor.
pub fn boot_keyboard_config(country_code: u8) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&interface(0, 0, 1, 0x03, 0x01, 0x01));
    body.extend_from_slice(&hid(country_code, 63));
    body.extend_from_slice(&endpoint(0x81, 0x03, 8, 10));
    config_descriptor(1, &body)
}

/// Boot keyboard (0x81) plus boot mouse (0x82) on interfaces 0 and 1.
pub fn keyboard_mouse_config() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&interface(0, 0, 1, 0x03, 0x01, 0x01));
    body.extend_from_slice(&hid(0, 63));
    body.extend_from_slice(&endpoint(0x81, 0x03, 8, 10));
    body.extend_from_slice(&interface(1, 0, 1, 0x03, 0x01, 0x02));
    body.extend_from_slice(&hid(0, 52));
    body.extend_from_slice(&endpoint(0x82, 0x03, 4, 2));
    config_descriptor(2, &body)
}

/// Vendor keyboard: non-boot HID on interface 0 (0x81, 8 bytes, 1 ms)
/// and a vendor interface with a bulk OUT endpoint.
pub fn kb16_config() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&interface(0, 0, 1, 0x03, 0x00, 0x00));
    body.extend_from_slice(&hid(0, 0));
    body.extend_from_slice(&endpoint(0x81, 0x03, 8, 1));
    body.extend_from_slice(&interface(1, 0, 1, 0xFF, 0x00, 0x00));
    body.extend_from_slice(&endpoint(0x02, 0x02, 64, 0));
    config_descriptor(2, &body)
}

/// KB16 firmware that also exposes a second vendor HID interface.
pub fn kb16_two_hid_config() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&interface(0, 0, 1, 0x03, 0x00, 0x00));
    body.extend_from_slice(&hid(0, 0));
    body.extend_from_slice(&endpoint(0x81, 0x03, 8, 1));
    body.extend_from_slice(&interface(1, 0, 1, 0x03, 0x00, 0x00));
    body.extend_from_slice(&hid(0, 0));
    body.extend_from_slice(&endpoint(0x82, 0x03, 8, 1));
    config_descriptor(2, &body)
}

// ═══════════════════════════════════════════════════════════════════════════
// Mock Host Controller
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct MockDevice {
    pub address: u8,
    pub speed: Speed,
    pub device_descriptor: [u8; 18],
    pub config: Vec<u8>,
    pub strings: Vec<(u8, Vec<u8>)>,
}

impl MockDevice {
    pub fn new(address: u8, vendor_id: u16, product_id: u16, config: Vec<u8>) -> Self {
        Self {
            address,
            speed: Speed::Full,
            device_descriptor: device_descriptor(vendor_id, product_id),
            config,
            strings: vec![
                (1, string_descriptor("ACME")),
                (2, string_descriptor("Keyboard")),
                (3, string_descriptor("0001")),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Open(u8),
    Close(u8),
    Claim { interface: u8, alt: u8 },
    Release(u8),
    Alloc { endpoint: u8, buffer_len: usize, num_bytes: usize },
    Submit(u8),
    Clear(u8),
    Free(u8),
    Control(SetupPacket),
}

#[derive(Debug)]
pub struct MockTransfer {
    id: u32,
    endpoint: EndpointAddress,
}

#[derive(Default)]
pub struct MockHost {
    pub devices: Vec<MockDevice>,
    pub pending: VecDeque<ControllerEvent>,
    pub calls: Vec<Call>,
    /// Transfer ids allocated and not yet freed.
    pub live_transfers: Vec<u32>,
    pub claimed: Vec<u8>,
    pub open: Vec<u8>,
    pub fail_open: bool,
    pub fail_device_descriptor: bool,
    pub fail_config_descriptor: bool,
    pub fail_claim: Vec<u8>,
    pub fail_alloc: Vec<u8>,
    /// Results handed out by successive `submit_transfer` calls; `Ok` once
    /// exhausted.
    pub submit_results: VecDeque<Result<(), TransportError>>,
    next_id: u32,
}

impl MockHost {
    pub fn with_device(device: MockDevice) -> Self {
        Self {
            devices: vec![device],
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: ControllerEvent) {
        self.pending.push_back(event);
    }

    pub fn complete(&mut self, endpoint: u8, data: &[u8]) {
        self.push(ControllerEvent::TransferComplete {
            endpoint: EndpointAddress(endpoint),
            data: heapless::Vec::from_slice(data).unwrap(),
        });
    }

    pub fn submits(&self, endpoint: u8) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == Call::Submit(endpoint))
            .count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn device(&self, address: u8) -> Option<&MockDevice> {
        self.devices.iter().find(|d| d.address == address)
    }
}

impl HostController for MockHost {
    type Device = u8;
    type Transfer = MockTransfer;

    fn handle_events(&mut self, _timeout_ms: u32, events: &mut EventQueue) {
        while !events.is_full() {
            match self.pending.pop_front() {
                Some(event) => events.push_back(event).unwrap(),
                None => break,
            }
        }
    }

    fn open_device(&mut self, address: u8) -> Result<u8, TransportError> {
        self.calls.push(Call::Open(address));
        if self.fail_open || self.device(address).is_none() {
            return Err(TransportError::InvalidArgument);
        }
        self.open.push(address);
        Ok(address)
    }

    fn close_device(&mut self, device: u8) -> Result<(), TransportError> {
        self.calls.push(Call::Close(device));
        self.open.retain(|&a| a != device);
        Ok(())
    }

    fn device_speed(&mut self, device: u8) -> Result<Speed, TransportError> {
        self.device(device)
            .map(|d| d.speed)
            .ok_or(TransportError::InvalidState)
    }

    fn device_descriptor(&mut self, device: u8, buf: &mut [u8; 18]) -> Result<(), TransportError> {
        if self.fail_device_descriptor {
            return Err(TransportError::Timeout);
        }
        let d = self.device(device).ok_or(TransportError::InvalidState)?;
        buf.copy_from_slice(&d.device_descriptor);
        Ok(())
    }

    fn config_descriptor(&mut self, device: u8, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.fail_config_descriptor {
            return Err(TransportError::Timeout);
        }
        let d = self.device(device).ok_or(TransportError::InvalidState)?;
        let n = d.config.len().min(buf.len());
        buf[..n].copy_from_slice(&d.config[..n]);
        Ok(n)
    }

    fn string_descriptor(
        &mut self,
        device: u8,
        index: u8,
        _lang_id: u16,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        let d = self.device(device).ok_or(TransportError::InvalidState)?;
        let (_, bytes) = d
            .strings
            .iter()
            .find(|(i, _)| *i == index)
            .ok_or(TransportError::NotSupported)?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }

    fn claim_interface(&mut self, _device: u8, interface: u8, alt: u8) -> Result<(), TransportError> {
        self.calls.push(Call::Claim { interface, alt });
        if self.fail_claim.contains(&interface) {
            return Err(TransportError::NotSupported);
        }
        self.claimed.push(interface);
        Ok(())
    }

    fn release_interface(&mut self, _device: u8, interface: u8) -> Result<(), TransportError> {
        self.calls.push(Call::Release(interface));
        self.claimed.retain(|&i| i != interface);
        Ok(())
    }

    fn alloc_transfer(
        &mut self,
        _device: u8,
        endpoint: EndpointAddress,
        buffer_len: usize,
        num_bytes: usize,
    ) -> Result<MockTransfer, TransportError> {
        self.calls.push(Call::Alloc {
            endpoint: endpoint.0,
            buffer_len,
            num_bytes,
        });
        if self.fail_alloc.contains(&endpoint.0) {
            return Err(TransportError::NoMemory);
        }
        self.next_id += 1;
        self.live_transfers.push(self.next_id);
        Ok(MockTransfer {
            id: self.next_id,
            endpoint,
        })
    }

    fn submit_transfer(&mut self, transfer: &mut MockTransfer) -> Result<(), TransportError> {
        self.calls.push(Call::Submit(transfer.endpoint.0));
        self.submit_results.pop_front().unwrap_or(Ok(()))
    }

    fn clear_endpoint(&mut self, _device: u8, endpoint: EndpointAddress) -> Result<(), TransportError> {
        self.calls.push(Call::Clear(endpoint.0));
        Ok(())
    }

    fn free_transfer(&mut self, transfer: MockTransfer) -> Result<(), TransportError> {
        self.calls.push(Call::Free(transfer.endpoint.0));
        self.live_transfers.retain(|&id| id != transfer.id);
        Ok(())
    }

    fn submit_control(&mut self, _device: u8, setup: SetupPacket) -> Result<(), TransportError> {
        self.calls.push(Call::Control(setup));
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Recording Sink
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<HostEvent>,
}

impl Recorder {
    pub fn keys(&self) -> Vec<KeyEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Key(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    pub fn connected(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HostEvent::DeviceConnected { .. }))
            .count()
    }

    pub fn gone(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HostEvent::DeviceGone))
            .count()
    }
}

impl EventSink for Recorder {
    fn on_device_connected(&mut self, info: &UsbDeviceInfo, strings: &DeviceStrings) {
        self.events.push(HostEvent::DeviceConnected {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            strings: strings.clone(),
        });
    }

    fn on_device_gone(&mut self) {
        self.events.push(HostEvent::DeviceGone);
    }

    fn on_keyboard_report(&mut self, current: &KeyboardReport, previous: &KeyboardReport) {
        self.events.push(HostEvent::KeyboardReport {
            current: *current,
            previous: *previous,
        });
    }

    fn on_key_event(&mut self, event: KeyEvent) {
        self.events.push(HostEvent::Key(event));
    }

    fn on_mouse_report(&mut self, current: &MouseReport, previous_buttons: MouseButtons) {
        self.events.push(HostEvent::MouseReport {
            current: *current,
            previous_buttons,
        });
    }

    fn on_mouse_buttons_changed(&mut self, button: MouseButtons, pressed: bool) {
        self.events.push(HostEvent::MouseButton { button, pressed });
    }

    fn on_mouse_moved(&mut self, report: &MouseReport) {
        self.events.push(HostEvent::MouseMoved(*report));
    }

    fn on_unrecognized_data(&mut self, endpoint: EndpointAddress, data: &[u8]) {
        self.events.push(HostEvent::Unrecognized {
            endpoint,
            data: heapless::Vec::from_slice(data).unwrap(),
        });
    }

    fn on_matrix_key_changed(&mut self, row: u8, col: u8, pressed: bool) {
        self.events.push(HostEvent::MatrixKey { row, col, pressed });
    }
}
