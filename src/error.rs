//! Unified error type for the USB host bridge.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for on-target
//! logging.

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Transport
    /// The host controller returned an error.
    Transport(TransportError),

    /// The device descriptor could not be read; enumeration is aborted.
    DeviceDescriptorUnavailable,

    /// The active configuration descriptor could not be read; enumeration
    /// is aborted.
    ConfigDescriptorUnavailable,

    /// The configuration descriptor does not fit in `CONFIG_BUFFER_LEN`.
    ConfigDescriptorTooLarge { total_length: u16 },

    /// Claiming an interface failed; its endpoints are skipped.
    InterfaceClaimFailed { interface: u8 },

    /// Allocating the transfer for an interrupt endpoint failed.
    TransferAllocFailed { endpoint: u8 },

    // Registry
    /// No room left for another interface or endpoint record.
    RegistryFull,

    /// An operation needed an attached device and there is none.
    NotConnected,

    // Malformed data
    /// A descriptor buffer is malformed.
    Descriptor(DescriptorError),

    /// An interrupt payload is shorter than the active decoder requires.
    ReportTooShort { needed: usize, actual: usize },
}

/// Status codes a host controller can report for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// A transfer on this endpoint is still pending.
    NotFinished,
    /// The endpoint or device is busy / not in a state to accept the call.
    InvalidState,
    /// The controller ran out of transfer memory.
    NoMemory,
    /// The bounded wait expired.
    Timeout,
    /// The request is not supported by the device or controller.
    NotSupported,
    /// An argument was rejected by the controller.
    InvalidArgument,
    /// Any other raw status code.
    Other(i32),
}

impl TransportError {
    /// `true` for the "already pending / endpoint busy" codes the polling
    /// loop expects while a transfer is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, TransportError::NotFinished | TransportError::InvalidState)
    }
}

/// Why the descriptor walker stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorError {
    /// A descriptor declared `bLength` shorter than its own header
    /// (0 or 1).
    InvalidLength { offset: usize, length: u8 },
    /// A descriptor's `bLength` runs past the walkable limit.
    Overflow { offset: usize, length: u8, limit: usize },
    /// Fewer than the two header bytes remain before the limit.
    Truncated { offset: usize },
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<DescriptorError> for Error {
    fn from(e: DescriptorError) -> Self {
        Error::Descriptor(e)
    }
}
