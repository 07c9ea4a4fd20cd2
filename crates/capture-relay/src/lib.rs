//! Callback-to-poll capture relay for block/streaming oscilloscope drivers.
//!
//! Vendor acquisition drivers report new samples by invoking a callback on
//! a thread they own. Some callers — host environments that cannot receive
//! callbacks or pass structures — can only poll. This crate bridges the
//! two: the driver's "data ready" notification becomes state a polling
//! caller can safely observe and consume, for up to
//! [`capture_core::limits::MAX_DEVICES`] instruments at once.
//!
//! # Flow
//!
//! 1. The caller registers an opened device with the [`DeviceRegistry`] and
//!    binds caller-owned buffers to the driver-owned ones, per channel or
//!    digital port sub-stream.
//! 2. The caller issues [`DeviceRegistry::run_block`] or
//!    [`DeviceRegistry::get_streaming_latest_values`]; the registry clears
//!    the per-cycle state and hands the driver a relay callback.
//! 3. The driver, on its own execution context, invokes the relay with a
//!    batch descriptor. The relay copies the new range from every enabled
//!    and bound driver buffer into its paired caller buffer, then publishes
//!    the capture state with `ready = true`.
//! 4. The caller, at its own pace, polls [`DeviceRegistry::is_ready`],
//!    [`DeviceRegistry::available_data`] and friends.
//!
//! Publication is guarded: relay copies and the ready flag share one
//! critical section per device, so an observed `ready` implies fully
//! copied buffers.

pub mod bindings;
pub mod registry;
pub mod relay;
pub mod slot;
pub mod state;
pub mod trigger;

pub use registry::{AvailableData, DeviceRegistry};
pub use relay::{BlockRelay, CopyPolicy, StreamingRelay};
pub use state::CaptureState;
pub use trigger::{
    PwqConditions, ThresholdMode, TriggerChannelProperties, TriggerConditions, TriggerState,
};
