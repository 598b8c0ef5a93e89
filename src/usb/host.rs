//! The seam between the bridge and whatever actually talks to the USB
//! hardware (a vendor host library, a register-level driver, or a mock in
//! tests).
//!
//! Completions and lifecycle notifications produced in the controller's own
//! execution context are handed to the driver by value through
//! [`EventQueue`]; the driver never shares a buffer with the controller.

use heapless::{Deque, Vec};

use crate::config::{EVENT_QUEUE_LEN, MAX_CONTROL_LEN, MAX_PACKET_LEN};
use crate::error::TransportError;
use crate::usb::descriptor::{descriptor_type, DEVICE_DESCRIPTOR_LEN};
use crate::usb::{EndpointAddress, Speed};

/// Controller events waiting to be processed by the driver.
pub type EventQueue = Deque<ControllerEvent, EVENT_QUEUE_LEN>;

/// Something the controller observed since the last tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A new device was enumerated at `address`.
    Attached { address: u8 },
    /// The device at `address` went away.
    Gone { address: u8 },
    /// An interrupt-IN transfer completed with `data`.
    TransferComplete {
        endpoint: EndpointAddress,
        data: Vec<u8, MAX_PACKET_LEN>,
    },
    /// A control request submitted with [`HostController::submit_control`]
    /// completed. `data` excludes the setup stage.
    ControlComplete {
        setup: SetupPacket,
        data: Vec<u8, MAX_CONTROL_LEN>,
    },
}

/// The 8-byte SETUP stage of a control transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    /// `bRequest` GET_DESCRIPTOR.
    pub const GET_DESCRIPTOR: u8 = 0x06;

    /// Standard GET_DESCRIPTOR(REPORT) addressed to a HID interface.
    pub fn get_report_descriptor(interface: u8, length: u16) -> Self {
        Self {
            // device-to-host, standard, interface recipient
            request_type: 0x81,
            request: Self::GET_DESCRIPTOR,
            value: u16::from(descriptor_type::REPORT) << 8,
            index: u16::from(interface),
            length,
        }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let [value_lo, value_hi] = self.value.to_le_bytes();
        let [index_lo, index_hi] = self.index.to_le_bytes();
        let [length_lo, length_hi] = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value_lo,
            value_hi,
            index_lo,
            index_hi,
            length_lo,
            length_hi,
        ]
    }
}

/// Transport primitives the enumeration and polling logic is built on.
///
/// Every call must return within a bounded time. `Transfer` is an opaque
/// handle to a controller-owned interrupt transfer; the registry holds it
/// exclusively from [`alloc_transfer`](Self::alloc_transfer) until it is
/// passed back to [`free_transfer`](Self::free_transfer).
pub trait HostController {
    /// Handle to an opened device.
    type Device: Copy;
    /// Handle to an allocated interrupt transfer.
    type Transfer;

    /// Service pending host-library and client events, waiting at most
    /// `timeout_ms`, and append what happened to `events`.
    fn handle_events(&mut self, timeout_ms: u32, events: &mut EventQueue);

    fn open_device(&mut self, address: u8) -> Result<Self::Device, TransportError>;

    fn close_device(&mut self, device: Self::Device) -> Result<(), TransportError>;

    fn device_speed(&mut self, device: Self::Device) -> Result<Speed, TransportError>;

    fn device_descriptor(
        &mut self,
        device: Self::Device,
        buf: &mut [u8; DEVICE_DESCRIPTOR_LEN],
    ) -> Result<(), TransportError>;

    /// Copy the active configuration descriptor into `buf` and return the
    /// number of bytes written.
    fn config_descriptor(
        &mut self,
        device: Self::Device,
        buf: &mut [u8],
    ) -> Result<usize, TransportError>;

    /// Fetch string descriptor `index` (header included) into `buf`.
    fn string_descriptor(
        &mut self,
        device: Self::Device,
        index: u8,
        lang_id: u16,
        buf: &mut [u8],
    ) -> Result<usize, TransportError>;

    fn claim_interface(
        &mut self,
        device: Self::Device,
        interface: u8,
        alternate_setting: u8,
    ) -> Result<(), TransportError>;

    fn release_interface(&mut self, device: Self::Device, interface: u8)
        -> Result<(), TransportError>;

    /// Allocate an interrupt transfer of `buffer_len` bytes that requests
    /// `num_bytes` per submission.
    fn alloc_transfer(
        &mut self,
        device: Self::Device,
        endpoint: EndpointAddress,
        buffer_len: usize,
        num_bytes: usize,
    ) -> Result<Self::Transfer, TransportError>;

    fn submit_transfer(&mut self, transfer: &mut Self::Transfer) -> Result<(), TransportError>;

    /// Cancel anything in flight on `endpoint` and clear its halt state.
    fn clear_endpoint(
        &mut self,
        device: Self::Device,
        endpoint: EndpointAddress,
    ) -> Result<(), TransportError>;

    fn free_transfer(&mut self, transfer: Self::Transfer) -> Result<(), TransportError>;

    fn submit_control(
        &mut self,
        device: Self::Device,
        setup: SetupPacket,
    ) -> Result<(), TransportError>;
}
