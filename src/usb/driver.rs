//! Host driver: device lifecycle, enumeration, polling and dispatch.
//!
//! ```text
//!   Disconnected ──Attached──▶ Enumerating ──▶ Configuring ──▶ Ready
//!        ▲                        │ fetch failed     │ no endpoints
//!        └──────── Gone / detach ─┴──────────────────┴───────────┘
//! ```
//!
//! Everything runs from [`HidHost::tick`]: controller events are drained
//! first, then every due interrupt-IN endpoint is resubmitted.

use crate::config::{HostConfig, CONFIG_BUFFER_LEN, LANGID_EN_US, MAX_CONTROL_LEN, STRING_DESC_LEN};
use crate::error::Error;
use crate::events::EventSink;
use crate::hid::keymap::Locale;
use crate::hid::normalizer::Normalizer;
use crate::hid::report_descriptor;
use crate::quirks::{find_profile, DeviceProfile};
use crate::usb::descriptor::{
    descriptor_type, decode_string, ConfigurationDescriptor, Descriptor, DescriptorWalker,
    DeviceDescriptor, EndpointDescriptor, HidDescriptor, InterfaceDescriptor,
    DEVICE_DESCRIPTOR_LEN,
};
use crate::usb::host::{ControllerEvent, EventQueue, HostController, SetupPacket};
use crate::usb::registry::{EndpointRecord, InterfaceRecord, Registry, TeardownStats};
use crate::usb::{interval_ms, DeviceStrings, Speed, UsbDeviceInfo};

/// Where the driver is in the device lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostState {
    #[default]
    Disconnected,
    Enumerating,
    /// Descriptors fetched, interfaces being claimed. A device with no
    /// usable endpoint stays here until it detaches.
    Configuring,
    /// At least one interrupt-IN endpoint is being polled.
    Ready,
}

struct ActiveDevice<D> {
    handle: D,
    info: UsbDeviceInfo,
    profile: Option<&'static DeviceProfile>,
}

/// Single-device USB HID host.
pub struct HidHost<H: HostController, S: EventSink> {
    host: H,
    sink: S,
    config: HostConfig,
    state: HostState,
    device: Option<ActiveDevice<H::Device>>,
    registry: Registry<H::Transfer>,
    normalizer: Normalizer,
    events: EventQueue,
}

impl<H: HostController, S: EventSink> HidHost<H, S> {
    pub fn new(host: H, sink: S, config: HostConfig) -> Self {
        Self {
            host,
            sink,
            config,
            state: HostState::Disconnected,
            device: None,
            registry: Registry::new(),
            normalizer: Normalizer::new(config.locale),
            events: EventQueue::new(),
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn device_info(&self) -> Option<&UsbDeviceInfo> {
        self.device.as_ref().map(|d| &d.info)
    }

    /// Profile matched for the attached device, if any.
    pub fn profile(&self) -> Option<&'static DeviceProfile> {
        self.device.as_ref().and_then(|d| d.profile)
    }

    pub fn registry(&self) -> &Registry<H::Transfer> {
        &self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Locale currently used for ASCII translation.
    pub fn locale(&self) -> Locale {
        self.normalizer.locale()
    }

    /// Whether switch (`row`, `col`) of a matrix-decoded device is held on
    /// any of its endpoints.
    pub fn matrix_key(&self, row: usize, col: usize) -> bool {
        self.registry
            .endpoints()
            .iter()
            .any(|ep| ep.history.matrix.is_pressed(row, col))
    }

    /// One iteration of the host loop.
    ///
    /// `now_ms` is a free-running millisecond counter; wrap-around is
    /// handled.
    pub fn tick(&mut self, now_ms: u32) {
        self.host.handle_events(self.config.event_wait_ms, &mut self.events);
        while let Some(event) = self.events.pop_front() {
            self.handle_event(event);
        }
        self.poll(now_ms);
    }

    /// Process one controller event.
    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Attached { address } => self.attach(address),
            ControllerEvent::Gone { address } => {
                let ours = self.device.as_ref().map(|d| d.info.address) == Some(address);
                if ours {
                    info!("device {} gone", address);
                    let _ = self.detach();
                } else {
                    debug!("gone event for unknown device {}", address);
                }
            }
            ControllerEvent::TransferComplete { endpoint, data } => {
                let Some(record) = self.registry.endpoint_mut(endpoint.number()) else {
                    debug!("completion on unknown endpoint {:#x}", endpoint.0);
                    return;
                };
                let kind = record.interface.kind();
                if let Err(e) = self.normalizer.process(
                    record.address,
                    kind,
                    &data,
                    &mut record.history,
                    &mut self.sink,
                ) {
                    warn!("ep{:#x} report dropped: {:?}", endpoint.0, e);
                }
            }
            ControllerEvent::ControlComplete { setup, data } => {
                let is_report_descriptor = setup.request == SetupPacket::GET_DESCRIPTOR
                    && (setup.value >> 8) as u8 == descriptor_type::REPORT;
                if is_report_descriptor {
                    report_descriptor::dump(setup.index as u8, &data);
                }
            }
        }
    }

    /// Release every transfer and interface, close the device handle and
    /// return to [`HostState::Disconnected`].
    pub fn detach(&mut self) -> Result<TeardownStats, Error> {
        let device = self.device.take().ok_or(Error::NotConnected)?;
        let stats = self.registry.teardown(&mut self.host, device.handle);
        if let Err(e) = self.host.close_device(device.handle) {
            warn!("close device failed: {:?}", e);
        }
        info!(
            "device {} released: {} transfers, {} interfaces, {} errors",
            device.info.address,
            stats.transfers_freed,
            stats.interfaces_released,
            stats.errors
        );
        self.normalizer.reset();
        self.state = HostState::Disconnected;
        self.sink.on_device_gone();
        Ok(stats)
    }

    fn attach(&mut self, address: u8) {
        if self.device.is_some() {
            warn!("device {} attached while another is active, releasing it", address);
            let _ = self.detach();
        }

        self.state = HostState::Enumerating;
        info!("device attached at address {}", address);
        if let Err(e) = self.enumerate(address) {
            error!("enumeration of device {} failed: {:?}", address, e);
            self.state = HostState::Disconnected;
        }
    }

    /// Open the device, read its descriptors and claim what it offers.
    /// On error nothing is left open.
    fn enumerate(&mut self, address: u8) -> Result<(), Error> {
        let handle = self.host.open_device(address)?;

        let mut raw = [0u8; DEVICE_DESCRIPTOR_LEN];
        let desc = match self.host.device_descriptor(handle, &mut raw) {
            Ok(()) => DeviceDescriptor::from_bytes(&raw),
            Err(e) => {
                warn!("device descriptor: {:?}", e);
                None
            }
        };
        let Some(desc) = desc else {
            self.close_quietly(handle);
            return Err(Error::DeviceDescriptorUnavailable);
        };

        let speed = self.host.device_speed(handle).unwrap_or_else(|e| {
            warn!("device speed unknown ({:?}), assuming full speed", e);
            Speed::Full
        });

        let info = UsbDeviceInfo {
            address,
            vendor_id: desc.vendor_id,
            product_id: desc.product_id,
            speed,
            max_packet_size0: desc.max_packet_size0,
            manufacturer_index: desc.manufacturer_index,
            product_index: desc.product_index,
            serial_index: desc.serial_index,
            raw_descriptor: raw,
        };
        info!(
            "VID {:#x} PID {:#x} speed {:?} ep0 {}",
            info.vendor_id, info.product_id, info.speed, info.max_packet_size0
        );

        let strings = DeviceStrings {
            manufacturer: self.read_string(handle, desc.manufacturer_index),
            product: self.read_string(handle, desc.product_index),
            serial: self.read_string(handle, desc.serial_index),
        };

        let mut config = [0u8; CONFIG_BUFFER_LEN];
        let len = match self.host.config_descriptor(handle, &mut config) {
            Ok(len) => len.min(config.len()),
            Err(e) => {
                warn!("config descriptor: {:?}", e);
                self.close_quietly(handle);
                return Err(Error::ConfigDescriptorUnavailable);
            }
        };

        let profile = find_profile(self.config.profiles, info.vendor_id, info.product_id);
        if let Some(p) = profile {
            info!(
                "profile {} ({})",
                p.name,
                p.strategy.map_or("boot", |s| s.name())
            );
        }

        self.sink.on_device_connected(&info, &strings);
        self.device = Some(ActiveDevice {
            handle,
            info,
            profile,
        });

        self.state = HostState::Configuring;
        let country_code = self.configure(handle, speed, &config[..len]);

        let locale = profile
            .and_then(|p| p.locale)
            .or_else(|| {
                country_code
                    .filter(|_| self.config.follow_country_code)
                    .and_then(Locale::from_country_code)
            })
            .unwrap_or(self.config.locale);
        self.normalizer.configure(profile, locale);

        if self.registry.endpoints().is_empty() {
            warn!("device {} has no interrupt-IN endpoint to poll", address);
        } else {
            info!(
                "device {} ready: {} interfaces, {} endpoints, locale {:?}",
                address,
                self.registry.interfaces().len(),
                self.registry.endpoints().len(),
                locale
            );
            self.state = HostState::Ready;
        }
        Ok(())
    }

    /// Walk the configuration descriptor, claiming interfaces and
    /// allocating a transfer for every interrupt-IN endpoint. Returns the
    /// first non-zero HID country code seen.
    fn configure(&mut self, handle: H::Device, speed: Speed, config: &[u8]) -> Option<u8> {
        if let Some(c) = ConfigurationDescriptor::from_bytes(config) {
            if usize::from(c.total_length) > config.len() {
                warn!(
                    "{:?}, walking first {} bytes",
                    Error::ConfigDescriptorTooLarge {
                        total_length: c.total_length
                    },
                    config.len()
                );
            }
            debug!(
                "configuration {}: {} interfaces, {} mA",
                c.configuration_value,
                c.num_interfaces,
                u16::from(c.max_power) * 2
            );
        }

        let mut current: Option<InterfaceRecord> = None;
        let mut country_code = None;

        for raw in DescriptorWalker::configuration(config) {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("configuration descriptor malformed: {:?}", Error::from(e));
                    break;
                }
            };
            match raw.parse() {
                Descriptor::Interface(iface) => current = self.claim(handle, &iface),
                Descriptor::Hid(hid) => {
                    let Some(iface) = current.as_mut() else {
                        continue;
                    };
                    self.on_hid_descriptor(handle, iface, &hid);
                    if hid.country_code != 0 && country_code.is_none() {
                        country_code = Some(hid.country_code);
                    }
                }
                Descriptor::Endpoint(ep) => {
                    if let Some(iface) = current {
                        self.open_endpoint(handle, speed, iface, &ep);
                    }
                }
                Descriptor::InterfaceAssociation(iad) => debug!(
                    "function: interfaces {}..+{} class {:#x}/{:#x}/{:#x}",
                    iad.first_interface,
                    iad.interface_count,
                    iad.function_class,
                    iad.function_subclass,
                    iad.function_protocol
                ),
                Descriptor::Unknown {
                    descriptor_type, ..
                } => trace!("skipping descriptor type {:#x}", descriptor_type),
                _ => {}
            }
        }
        country_code
    }

    fn claim(&mut self, handle: H::Device, iface: &InterfaceDescriptor) -> Option<InterfaceRecord> {
        if self.registry.has_interface(iface.number) {
            trace!(
                "interface {} alt {} ignored",
                iface.number,
                iface.alternate_setting
            );
            return None;
        }
        if !self.registry.can_add_interface() {
            warn!("interface {} skipped: {:?}", iface.number, Error::RegistryFull);
            return None;
        }

        if let Err(e) = self
            .host
            .claim_interface(handle, iface.number, iface.alternate_setting)
        {
            warn!(
                "{:?}: {:?}",
                Error::InterfaceClaimFailed {
                    interface: iface.number
                },
                e
            );
            return None;
        }

        let record = InterfaceRecord {
            number: iface.number,
            alternate_setting: iface.alternate_setting,
            class: iface.class,
            subclass: iface.subclass,
            protocol: iface.protocol,
            country_code: None,
            claimed: true,
        };
        info!(
            "interface {} claimed: class {:#x}/{:#x}/{:#x} ({:?})",
            record.number,
            record.class,
            record.subclass,
            record.protocol,
            record.kind()
        );
        self.registry.add_interface(record).ok()?;
        Some(record)
    }

    fn on_hid_descriptor(&mut self, handle: H::Device, iface: &mut InterfaceRecord, hid: &HidDescriptor) {
        debug!(
            "interface {} HID {:#x} country {} report descriptor {} bytes",
            iface.number, hid.hid_version, hid.country_code, hid.report_descriptor_length
        );
        iface.country_code = Some(hid.country_code);
        self.registry.set_country_code(iface.number, hid.country_code);

        if self.config.fetch_report_descriptor && hid.report_descriptor_length > 0 {
            let length = hid.report_descriptor_length.min(MAX_CONTROL_LEN as u16);
            let setup = SetupPacket::get_report_descriptor(iface.number, length);
            if let Err(e) = self.host.submit_control(handle, setup) {
                warn!("report descriptor request for interface {}: {:?}", iface.number, e);
            }
        }
    }

    fn open_endpoint(
        &mut self,
        handle: H::Device,
        speed: Speed,
        iface: InterfaceRecord,
        ep: &EndpointDescriptor,
    ) {
        if !ep.is_interrupt_in() {
            trace!("endpoint {:#x} not interrupt-IN, ignored", ep.address.0);
            return;
        }
        if !self.registry.can_add_endpoint() {
            warn!("endpoint {:#x} skipped: {:?}", ep.address.0, Error::RegistryFull);
            return;
        }

        let packet_size = ep.packet_size();
        let buffer_len = usize::from(packet_size) + 1;
        let transfer = match self.host.alloc_transfer(
            handle,
            ep.address,
            buffer_len,
            usize::from(packet_size),
        ) {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    "{:?}: {:?}",
                    Error::TransferAllocFailed {
                        endpoint: ep.address.0
                    },
                    e
                );
                return;
            }
        };

        let period = interval_ms(speed, ep.interval);
        let record = EndpointRecord::new(ep.address, packet_size, period, iface, transfer);
        if let Err(record) = self.registry.add_endpoint(record) {
            let _ = self.host.free_transfer(record.into_transfer());
            return;
        }
        info!(
            "endpoint {:#x} on interface {}: {} bytes every {} ms",
            ep.address.0, iface.number, packet_size, period
        );
    }

    fn read_string(&mut self, handle: H::Device, index: u8) -> heapless::String<STRING_DESC_LEN> {
        if index == 0 {
            return heapless::String::new();
        }
        let mut buf = [0u8; 2 + 2 * STRING_DESC_LEN];
        match self.host.string_descriptor(handle, index, LANGID_EN_US, &mut buf) {
            Ok(len) => decode_string(&buf[..len.min(buf.len())]),
            Err(e) => {
                debug!("string descriptor {}: {:?}", index, e);
                heapless::String::new()
            }
        }
    }

    fn close_quietly(&mut self, handle: H::Device) {
        if let Err(e) = self.host.close_device(handle) {
            warn!("close device failed: {:?}", e);
        }
    }

    /// Resubmit every endpoint whose interval has elapsed.
    fn poll(&mut self, now_ms: u32) {
        if self.state != HostState::Ready {
            return;
        }
        for endpoint in self.registry.endpoints_mut() {
            if !endpoint.is_due(now_ms) {
                continue;
            }
            match self.host.submit_transfer(endpoint.transfer_mut()) {
                Ok(()) => endpoint.last_poll_ms = Some(now_ms),
                Err(e) if e.is_busy() => {
                    endpoint.last_poll_ms = Some(now_ms);
                }
                Err(e) => warn!("submit on ep{:#x} failed: {:?}", endpoint.address.0, e),
            }
        }
    }
}
