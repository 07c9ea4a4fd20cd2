//! One registered device.
//!
//! A [`DeviceSlot`] bundles everything the relay and the poll API share for
//! a single instrument: its driver handle, channel/port counts, enabled
//! masks, the buffer binding table, and the capture state. The whole bundle
//! sits behind one mutex per device, so a delivery's copies and its
//! `ready = true` publication form a single critical section, and a poll
//! that observes `ready` observes fully-copied buffers.
//!
//! Different devices' slots are independent; no cross-device lock exists.

use capture_core::DeviceHandle;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::bindings::BindingTable;
use crate::state::CaptureState;

/// Shared handle to a slot. The registry holds the strong reference; relay
/// callbacks hold weak ones, so a callback that outlives its device resolves
/// to nothing instead of touching reclaimed state.
pub(crate) type SharedSlot = Arc<Mutex<DeviceSlot>>;

/// Per-device state shared between the driver's callback context and the
/// polling caller.
pub struct DeviceSlot {
    pub(crate) handle: DeviceHandle,
    pub(crate) channel_count: usize,
    pub(crate) digital_port_count: usize,
    pub(crate) enabled_channels: Vec<bool>,
    pub(crate) enabled_digital_ports: Vec<bool>,
    pub(crate) bindings: BindingTable,
    pub(crate) state: CaptureState,
}

impl DeviceSlot {
    pub(crate) fn new(handle: DeviceHandle) -> Self {
        Self {
            handle,
            channel_count: 0,
            digital_port_count: 0,
            enabled_channels: Vec::new(),
            enabled_digital_ports: Vec::new(),
            bindings: BindingTable::default(),
            state: CaptureState::default(),
        }
    }

    /// Apply channel/port counts, resetting masks to all-disabled and
    /// dropping any bindings made under the previous counts.
    pub(crate) fn set_counts(&mut self, channel_count: usize, digital_port_count: usize) {
        self.channel_count = channel_count;
        self.digital_port_count = digital_port_count;
        self.enabled_channels = vec![false; channel_count];
        self.enabled_digital_ports = vec![false; digital_port_count];
        self.bindings.configure(channel_count, digital_port_count);
    }
}
