//! Error types for the capture relay.
//!
//! Two layers of error exist here, mirroring the two parties at the boundary:
//!
//! - [`DriverError`] — an opaque failure reported by the vendor acquisition
//!   driver. The relay never decodes these beyond attaching a coarse
//!   [`DriverErrorKind`]; they pass through the poll API unchanged.
//! - [`Error`] — the relay's own validation failures (bad index, bad channel,
//!   out-of-range parameter, registry exhausted), raised synchronously at the
//!   call that would otherwise misuse the data.
//!
//! The streaming callback path never returns errors at all: it has no caller
//! to report to, so anything it cannot do safely it skips.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Coarse category for a driver-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The driver rejected the device handle.
    InvalidHandle,
    /// A parameter was outside the range the driver accepts.
    InvalidParameter,
    /// Communication with the instrument failed.
    Communication,
    /// The instrument itself reported a fault.
    Hardware,
    /// The driver did not respond in time.
    Timeout,
    /// Anything the driver did not classify.
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::InvalidHandle => "invalid_handle",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Opaque failure from the vendor acquisition driver.
///
/// Status codes from the driver are carried through unchanged in `message`;
/// the relay only attaches the driver name and a [`DriverErrorKind`] so
/// callers can log something structured without decoding vendor codes.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver}' {kind} error: {message}")]
pub struct DriverError {
    pub driver: String,
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(
        driver: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for results using the relay error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Relay Errors
// =============================================================================

/// Validation and registry errors raised by the capture relay itself.
///
/// Every fallible entry point validates its arguments synchronously and
/// returns the specific kind below rather than a generic failure. The only
/// variant that does not originate in the relay is [`Error::Driver`], which
/// wraps a status passed through from the vendor driver.
#[derive(Error, Debug)]
pub enum Error {
    /// A device index outside the live range or pointing at a released slot.
    #[error("invalid device index {index}")]
    InvalidIndex { index: usize },

    /// A device handle that is not positive.
    #[error("invalid device handle {handle}")]
    InvalidHandle { handle: i16 },

    /// A channel number outside `[0, channel_count)` for the target device.
    #[error("invalid channel {channel} (device has {count} channels)")]
    InvalidChannel { channel: usize, count: usize },

    /// A digital port number outside `[0, digital_port_count)`.
    #[error("invalid digital port {port} (device has {count} ports)")]
    InvalidDigitalPort { port: usize, count: usize },

    /// A count or length outside its declared range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The registry already holds the maximum number of devices.
    #[error("maximum of {max} devices already registered")]
    MaxDevicesReached { max: usize },

    /// Opaque passthrough from the vendor driver.
    #[error(transparent)]
    Driver(#[from] DriverError),
}
