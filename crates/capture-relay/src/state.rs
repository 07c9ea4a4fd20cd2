//! Per-device capture state.
//!
//! One [`CaptureState`] lives inside each registered device slot and holds
//! the transient result of the most recent acquisition cycle. The streaming
//! relay is the only writer of `ready = true`; the poll API only ever reads
//! it or clears it on the way into the next request.

use capture_core::StreamingDelivery;

/// Latest acquisition result for one device.
///
/// `triggered`/`trigger_at` are sticky until the caller clears them; all
/// other fields describe the most recent delivery only.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureState {
    /// False while a request is outstanding; true once the relay has fully
    /// processed a delivery (including a zero-sample terminal one).
    pub ready: bool,
    /// Samples written by the most recent delivery.
    pub samples: usize,
    /// Offset at which the most recent delivery wrote into bound buffers.
    pub start_index: usize,
    /// Whether the trigger has fired since the last clear.
    pub triggered: bool,
    /// Sample offset of the trigger point; meaningful only when `triggered`.
    pub trigger_at: usize,
    /// Channel saturation bitmask from the most recent delivery.
    pub overflow: u16,
    /// Whether the acquisition halted itself at its sample-count limit.
    pub auto_stop: bool,
}

impl CaptureState {
    /// Record a delivery's descriptor fields verbatim. Does not touch
    /// `ready`; the relay publishes that separately, after the copies.
    pub(crate) fn record(&mut self, delivery: &StreamingDelivery) {
        self.samples = delivery.samples;
        self.start_index = delivery.start_index;
        self.triggered = delivery.triggered;
        self.trigger_at = delivery.trigger_at;
        self.overflow = delivery.overflow;
        self.auto_stop = delivery.auto_stop;
    }

    /// Reset on the way into a block-mode request: the expected total is
    /// known up front, so it is published immediately.
    pub(crate) fn begin_block(&mut self, expected_samples: usize) {
        self.ready = false;
        self.samples = expected_samples;
    }

    /// Reset on the way into a streaming request.
    pub(crate) fn begin_streaming(&mut self) {
        self.ready = false;
        self.samples = 0;
        self.auto_stop = false;
    }

    /// Drop the sticky trigger marker. Leaves `ready`, `samples`, and
    /// `overflow` alone.
    pub(crate) fn clear_trigger(&mut self) {
        self.triggered = false;
        self.trigger_at = 0;
    }
}
