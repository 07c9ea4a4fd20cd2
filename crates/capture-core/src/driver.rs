//! The boundary with the vendor acquisition driver.
//!
//! The driver is a black box that owns sample buffers, triggers callbacks,
//! and returns status codes. [`ScopeDriver`] is the slice of it the relay
//! needs: start a block capture, request the latest streamed values, and
//! report what kind of instrument a handle refers to.
//!
//! # Callback contract
//!
//! Both acquisition entry points accept a handler the driver will invoke
//! zero or more times. The driver may call a handler synchronously, on the
//! thread that made the request (the real vendor driver does exactly this
//! inside its "get latest values" call), or later from a thread it owns.
//! Implementations of the handler traits must tolerate both, and the code
//! issuing the request must not hold locks the handler needs.

use crate::error::DriverError;

/// Opaque device identifier issued by the driver when a unit is opened.
/// Valid handles are strictly positive.
pub type DeviceHandle = i16;

/// One batch of newly available samples, as described by the driver.
///
/// All fields are authoritative from the driver for this delivery; the relay
/// records them verbatim. `start_index` is an offset into the driver's ring
/// buffer, and by the binding contract the same offset is valid in the
/// caller's buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingDelivery {
    /// Number of samples produced in this batch. May be zero: a zero-sample
    /// delivery with `auto_stop` set is a valid terminal event.
    pub samples: usize,
    /// Offset of the first new sample in every bound buffer.
    pub start_index: usize,
    /// Bitmask of channels that saturated during this interval; bit 0 is
    /// channel A.
    pub overflow: u16,
    /// Sample offset of the trigger point. Meaningful only when `triggered`.
    pub trigger_at: usize,
    /// Whether the trigger fired during this interval.
    pub triggered: bool,
    /// Whether the acquisition halted itself at its sample-count limit.
    pub auto_stop: bool,
}

/// Parameters for a block-mode capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub pre_trigger_samples: usize,
    pub post_trigger_samples: usize,
    pub timebase: u32,
    pub segment: u32,
}

impl BlockRequest {
    /// Total samples the capture will produce.
    pub fn total_samples(&self) -> usize {
        self.pre_trigger_samples + self.post_trigger_samples
    }
}

/// Identity of an open unit, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    /// Model variant string, e.g. `"2205AMSO"` or `"4424"`. The second
    /// character is the analog channel count; an `MSO` suffix marks a
    /// mixed-signal unit with digital ports.
    pub variant: String,
}

/// Receives streaming deliveries from the driver.
///
/// Invoked on a driver-owned execution context. Must never block for long
/// and must never panic; it has no caller to report errors to.
pub trait StreamingHandler: Send + Sync {
    fn deliver(&self, delivery: &StreamingDelivery);
}

/// Notified when a block-mode capture completes.
///
/// Block mode returns data through a separate synchronous retrieval call
/// made by the caller afterwards, so completion carries no payload.
pub trait BlockHandler: Send + Sync {
    fn block_ready(&self);
}

/// The acquisition entry points the relay delegates to.
///
/// Errors are opaque [`DriverError`] values, passed through to the poll
/// API's callers without reinterpretation.
pub trait ScopeDriver: Send + Sync {
    /// Start a block-mode capture. `handler.block_ready()` fires when the
    /// device has captured `request.total_samples()` samples.
    fn run_block(
        &self,
        handle: DeviceHandle,
        request: &BlockRequest,
        handler: std::sync::Arc<dyn BlockHandler>,
    ) -> Result<(), DriverError>;

    /// Ask the driver to hand over whatever streamed samples have arrived
    /// since the last request. The driver invokes `handler.deliver` zero or
    /// more times with batch descriptors.
    fn request_latest_values(
        &self,
        handle: DeviceHandle,
        handler: std::sync::Arc<dyn StreamingHandler>,
    ) -> Result<(), DriverError>;

    /// Report the identity of the unit behind `handle`.
    fn unit_info(&self, handle: DeviceHandle) -> Result<UnitInfo, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_request_total() {
        let req = BlockRequest {
            pre_trigger_samples: 100,
            post_trigger_samples: 900,
            timebase: 8,
            segment: 0,
        };
        assert_eq!(req.total_samples(), 1000);
    }

    #[test]
    fn delivery_default_is_empty() {
        let d = StreamingDelivery::default();
        assert_eq!(d.samples, 0);
        assert!(!d.triggered);
        assert!(!d.auto_stop);
    }
}
