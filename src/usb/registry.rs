//! Claimed interfaces and live interrupt-IN transfers of the attached
//! device.
//!
//! An [`EndpointRecord`] owns its controller transfer from allocation until
//! [`Registry::teardown`] hands it back. Teardown order is fixed: every
//! endpoint is cleared and its transfer freed, then every interface is
//! released. The driver closes the device handle afterwards.

use heapless::Vec;

use crate::config::{MAX_ENDPOINTS, MAX_INTERFACES};
use crate::error::Error;
use crate::hid::normalizer::ReportHistory;
use crate::usb::host::HostController;
use crate::usb::{EndpointAddress, InterfaceKind, TransferType};

/// A claimed interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceRecord {
    pub number: u8,
    pub alternate_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    /// `bCountryCode` of the interface's HID descriptor.
    pub country_code: Option<u8>,
    pub claimed: bool,
}

impl InterfaceRecord {
    pub fn kind(&self) -> InterfaceKind {
        InterfaceKind::classify(self.class, self.subclass, self.protocol)
    }
}

/// A polled interrupt-IN endpoint and its transfer.
#[derive(Debug)]
pub struct EndpointRecord<T> {
    pub address: EndpointAddress,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
    pub interval_ms: u32,
    /// Owning interface, copied in so completions need no second lookup.
    pub interface: InterfaceRecord,
    /// Tick time of the last submission; `None` until first polled.
    pub last_poll_ms: Option<u32>,
    /// Previous reports seen on this endpoint.
    pub history: ReportHistory,
    transfer: T,
}

impl<T> EndpointRecord<T> {
    pub fn new(
        address: EndpointAddress,
        max_packet_size: u16,
        interval_ms: u32,
        interface: InterfaceRecord,
        transfer: T,
    ) -> Self {
        Self {
            address,
            transfer_type: TransferType::Interrupt,
            max_packet_size,
            interval_ms,
            interface,
            last_poll_ms: None,
            history: ReportHistory::default(),
            transfer,
        }
    }

    /// Transfer buffer length: one byte more than the packet size.
    pub fn buffer_len(&self) -> usize {
        usize::from(self.max_packet_size) + 1
    }

    /// `true` once `interval_ms` has elapsed since the last submission.
    pub fn is_due(&self, now_ms: u32) -> bool {
        match self.last_poll_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.interval_ms,
        }
    }

    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    /// Give up the record, keeping only its transfer.
    pub fn into_transfer(self) -> T {
        self.transfer
    }
}

/// What [`Registry::teardown`] gave back to the controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TeardownStats {
    pub transfers_freed: usize,
    pub interfaces_released: usize,
    /// Controller calls that returned an error (teardown continues).
    pub errors: usize,
}

#[derive(Debug)]
pub struct Registry<T> {
    interfaces: Vec<InterfaceRecord, MAX_INTERFACES>,
    endpoints: Vec<EndpointRecord<T>, MAX_ENDPOINTS>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub const fn new() -> Self {
        Self {
            interfaces: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    pub fn interfaces(&self) -> &[InterfaceRecord] {
        &self.interfaces
    }

    pub fn endpoints(&self) -> &[EndpointRecord<T>] {
        &self.endpoints
    }

    pub fn endpoints_mut(&mut self) -> &mut [EndpointRecord<T>] {
        &mut self.endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty() && self.endpoints.is_empty()
    }

    pub fn has_interface(&self, number: u8) -> bool {
        self.interfaces.iter().any(|i| i.number == number)
    }

    pub fn can_add_interface(&self) -> bool {
        !self.interfaces.is_full()
    }

    pub fn can_add_endpoint(&self) -> bool {
        !self.endpoints.is_full()
    }

    pub fn add_interface(&mut self, record: InterfaceRecord) -> Result<(), Error> {
        self.interfaces.push(record).map_err(|_| Error::RegistryFull)
    }

    /// Store an endpoint. On a full registry the record is handed back so
    /// the caller can free its transfer.
    pub fn add_endpoint(&mut self, record: EndpointRecord<T>) -> Result<(), EndpointRecord<T>> {
        self.endpoints.push(record)
    }

    /// Look up a live endpoint by endpoint number.
    pub fn endpoint_mut(&mut self, number: u8) -> Option<&mut EndpointRecord<T>> {
        self.endpoints
            .iter_mut()
            .find(|e| e.address.number() == number)
    }

    /// Record a HID country code on an interface and its endpoints.
    pub fn set_country_code(&mut self, interface: u8, code: u8) {
        for i in self.interfaces.iter_mut().filter(|i| i.number == interface) {
            i.country_code = Some(code);
        }
        for e in self
            .endpoints
            .iter_mut()
            .filter(|e| e.interface.number == interface)
        {
            e.interface.country_code = Some(code);
        }
    }

    /// Return every transfer and interface to the controller.
    pub fn teardown<H>(&mut self, host: &mut H, device: H::Device) -> TeardownStats
    where
        H: HostController<Transfer = T>,
    {
        let mut stats = TeardownStats::default();

        while let Some(endpoint) = self.endpoints.pop() {
            let address = endpoint.address;
            if let Err(e) = host.clear_endpoint(device, address) {
                warn!("clear endpoint {:#x} failed: {:?}", address.0, e);
                stats.errors += 1;
            }
            match host.free_transfer(endpoint.into_transfer()) {
                Ok(()) => stats.transfers_freed += 1,
                Err(e) => {
                    warn!("free transfer {:#x} failed: {:?}", address.0, e);
                    stats.errors += 1;
                }
            }
        }

        while let Some(interface) = self.interfaces.pop() {
            match host.release_interface(device, interface.number) {
                Ok(()) => stats.interfaces_released += 1,
                Err(e) => {
                    warn!("release interface {} failed: {:?}", interface.number, e);
                    stats.errors += 1;
                }
            }
        }

        stats
    }
}
