//! USB host bridge for HID keyboards and mice.
//!
//! Attaches to a single USB device through a [`HostController`]
//! implementation, walks its configuration descriptor, claims every
//! interface and polls each interrupt-IN endpoint. Completed payloads are
//! normalized into keyboard/mouse reports and per-key events delivered to
//! an [`EventSink`].
//!
//! Keyboards that ignore the boot protocol (the DOIO KB16 macro pad) are
//! decoded through a per-device profile, see [`quirks`].
//!
//! ```text
//!   HostController ──events──▶ HidHost ──payload──▶ Normalizer ──▶ EventSink
//!        ▲                        │
//!        └──── claim / submit ────┘
//! ```
//!
//! The crate is `no_std` and allocation-free. Enable the `defmt` feature
//! for on-target logging.
//!
//! Usage: `cargo test` runs every host-side test.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod config;
pub mod error;
pub mod events;
pub mod hid;
pub mod quirks;
pub mod usb;

pub use config::HostConfig;
pub use error::{DescriptorError, Error, TransportError};
pub use events::{EventSink, HostEvent, KeyEvent, QueueSink};
pub use hid::keymap::Locale;
pub use usb::driver::{HidHost, HostState};
pub use usb::host::{ControllerEvent, HostController, SetupPacket};
