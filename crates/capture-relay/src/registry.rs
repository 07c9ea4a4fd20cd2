//! The device registry and the caller-facing poll API.
//!
//! The registry is a fixed-capacity arena of device slots addressed by a
//! small integer index. It exists because the polling caller cannot hold
//! references or receive callbacks: every operation here is callable with
//! nothing but integers, booleans, and flat buffer handles, and everything
//! the driver produces asynchronously is observed through the capture
//! state published by the relay.
//!
//! Index discipline: indices are handed out in increasing order starting at
//! 0 and stay stable for the life of the registry. Releasing a device
//! deactivates its slot but does not compact the table; the slot is only
//! reclaimed by [`DeviceRegistry::reset_all`], intended for use after every
//! instrument has been disconnected. Every index-taking operation validates
//! both the range and that the slot is still active, and answers
//! [`Error::InvalidIndex`] otherwise — never stale data.

use std::sync::Arc;

use capture_core::limits::{MAX_CHANNELS, MAX_DEVICES, MAX_DIGITAL_PORTS};
use capture_core::{BlockRequest, DeviceHandle, Error, Result, ScopeDriver, SharedSamples};
use parking_lot::Mutex;
use tracing::debug;

use crate::relay::{BlockRelay, CopyPolicy, StreamingRelay};
use crate::slot::{DeviceSlot, SharedSlot};

/// Data location reported by [`DeviceRegistry::available_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableData {
    /// Samples written by the most recent delivery. Zero is a valid answer
    /// for a terminal no-data delivery.
    pub samples: usize,
    /// Offset of the first valid sample in the bound buffers.
    pub start_index: usize,
}

/// Fixed-capacity table of open instruments, plus the poll API over them.
///
/// Owns the only strong references to the per-device slots; the relay
/// callbacks handed to the driver hold weak ones.
pub struct DeviceRegistry {
    driver: Arc<dyn ScopeDriver>,
    slots: Vec<Option<SharedSlot>>,
    /// Next index to hand out; monotonically increasing until `reset_all`.
    next_index: usize,
    active: usize,
    policy: CopyPolicy,
}

impl DeviceRegistry {
    /// A registry relaying for `driver`, with the strict copy policy.
    pub fn new(driver: Arc<dyn ScopeDriver>) -> Self {
        Self::with_policy(driver, CopyPolicy::default())
    }

    /// A registry with an explicit overrun policy for streaming copies.
    pub fn with_policy(driver: Arc<dyn ScopeDriver>, policy: CopyPolicy) -> Self {
        Self {
            driver,
            slots: (0..MAX_DEVICES).map(|_| None).collect(),
            next_index: 0,
            active: 0,
            policy,
        }
    }

    // =========================================================================
    // Slot lifecycle
    // =========================================================================

    /// Register an opened device and return its index.
    ///
    /// Rejects non-positive handles and fails without mutating anything once
    /// [`MAX_DEVICES`] slots have been handed out.
    pub fn register(&mut self, handle: DeviceHandle) -> Result<usize> {
        if handle <= 0 {
            return Err(Error::InvalidHandle { handle });
        }
        if self.next_index == MAX_DEVICES {
            return Err(Error::MaxDevicesReached { max: MAX_DEVICES });
        }
        let index = self.next_index;
        self.slots[index] = Some(Arc::new(Mutex::new(DeviceSlot::new(handle))));
        self.next_index += 1;
        self.active += 1;
        debug!(index, handle, "device registered");
        Ok(index)
    }

    /// Release a device's slot. The index is not reused; any in-flight
    /// callback for this device resolves to nothing from here on.
    pub fn release(&mut self, index: usize) -> Result<()> {
        self.slot(index)?;
        self.slots[index] = None;
        self.active -= 1;
        debug!(index, "device released");
        Ok(())
    }

    /// Reclaim the whole table, invalidating every previously issued index.
    /// Only safe once every device has been disconnected.
    pub fn reset_all(&mut self) {
        self.slots = (0..MAX_DEVICES).map(|_| None).collect();
        self.next_index = 0;
        self.active = 0;
        debug!("registry reset");
    }

    /// Number of currently active slots.
    pub fn count(&self) -> usize {
        self.active
    }

    fn slot(&self, index: usize) -> Result<&SharedSlot> {
        self.slots
            .get(..self.next_index)
            .and_then(|live| live.get(index))
            .and_then(|slot| slot.as_ref())
            .ok_or(Error::InvalidIndex { index })
    }

    // =========================================================================
    // Device configuration
    // =========================================================================

    /// Declare a device's channel and digital port counts directly.
    ///
    /// `channels` must be in `1..=MAX_CHANNELS`; `ports` must be 0 or
    /// [`MAX_DIGITAL_PORTS`]. Resets enabled masks and drops bindings.
    pub fn set_channel_counts(&mut self, index: usize, channels: usize, ports: usize) -> Result<()> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidParameter("channel count out of range"));
        }
        if ports != 0 && ports != MAX_DIGITAL_PORTS {
            return Err(Error::InvalidParameter("digital port count must be 0 or 2"));
        }
        self.slot(index)?.lock().set_counts(channels, ports);
        Ok(())
    }

    /// Derive a device's channel and port counts from the driver's unit
    /// information: the variant string's second character is the analog
    /// channel count, and an `MSO` suffix marks two digital ports.
    pub fn detect_channel_counts(&mut self, index: usize) -> Result<()> {
        let handle = self.slot(index)?.lock().handle;
        let info = self.driver.unit_info(handle)?;
        let channels = info
            .variant
            .chars()
            .nth(1)
            .and_then(|c| c.to_digit(10))
            .map(|d| d as usize)
            .ok_or(Error::InvalidParameter("unit variant has no channel digit"))?;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidParameter("channel count out of range"));
        }
        let ports = if info.variant.contains("MSO") {
            MAX_DIGITAL_PORTS
        } else {
            0
        };
        debug!(index, variant = %info.variant, channels, ports, "channel counts detected");
        self.slot(index)?.lock().set_counts(channels, ports);
        Ok(())
    }

    /// Set which analog channels the relay copies. The mask length must
    /// match the configured channel count.
    pub fn set_enabled_channels(&mut self, index: usize, enabled: &[bool]) -> Result<()> {
        let slot = self.slot(index)?;
        let mut slot = slot.lock();
        if slot.channel_count == 0 {
            return Err(Error::InvalidParameter("channel count not configured"));
        }
        if enabled.len() != slot.channel_count {
            return Err(Error::InvalidParameter("enabled mask length mismatch"));
        }
        slot.enabled_channels.copy_from_slice(enabled);
        Ok(())
    }

    /// Set which digital ports the relay copies. Only meaningful on
    /// mixed-signal devices; the mask length must match the port count.
    pub fn set_enabled_digital_ports(&mut self, index: usize, enabled: &[bool]) -> Result<()> {
        let slot = self.slot(index)?;
        let mut slot = slot.lock();
        if enabled.len() != slot.digital_port_count {
            return Err(Error::InvalidParameter("enabled mask length mismatch"));
        }
        slot.enabled_digital_ports.copy_from_slice(enabled);
        Ok(())
    }

    // =========================================================================
    // Buffer bindings
    // =========================================================================

    /// Bind (or clear, by passing `None`) a channel's max sub-stream.
    pub fn bind_channel(
        &mut self,
        index: usize,
        channel: usize,
        app: Option<SharedSamples>,
        driver: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        self.slot(index)?
            .lock()
            .bindings
            .bind_channel(channel, app, driver, length)
    }

    /// Bind (or clear) both of a channel's sub-streams atomically, for
    /// aggregated acquisition modes.
    #[allow(clippy::too_many_arguments)]
    pub fn bind_channel_min_max(
        &mut self,
        index: usize,
        channel: usize,
        app_max: Option<SharedSamples>,
        app_min: Option<SharedSamples>,
        driver_max: Option<SharedSamples>,
        driver_min: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        self.slot(index)?.lock().bindings.bind_channel_min_max(
            channel, app_max, app_min, driver_max, driver_min, length,
        )
    }

    /// Bind (or clear) a digital port's max sub-stream.
    pub fn bind_digital_port(
        &mut self,
        index: usize,
        port: usize,
        app: Option<SharedSamples>,
        driver: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        self.slot(index)?
            .lock()
            .bindings
            .bind_digital_port(port, app, driver, length)
    }

    /// Bind (or clear) both of a digital port's sub-streams atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn bind_digital_port_min_max(
        &mut self,
        index: usize,
        port: usize,
        app_max: Option<SharedSamples>,
        app_min: Option<SharedSamples>,
        driver_max: Option<SharedSamples>,
        driver_min: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        self.slot(index)?.lock().bindings.bind_digital_port_min_max(
            port, app_max, app_min, driver_max, driver_min, length,
        )
    }

    // =========================================================================
    // Poll API
    // =========================================================================

    /// Whether the most recent request has completed. No side effects.
    pub fn is_ready(&self, index: usize) -> Result<bool> {
        Ok(self.slot(index)?.lock().state.ready)
    }

    /// Where the latest delivery's data landed, or `None` while a request
    /// is still outstanding. Does not clear the ready flag: the next
    /// [`Self::get_streaming_latest_values`] does that.
    pub fn available_data(&self, index: usize) -> Result<Option<AvailableData>> {
        let slot = self.slot(index)?;
        let state = slot.lock().state;
        Ok(state.ready.then_some(AvailableData {
            samples: state.samples,
            start_index: state.start_index,
        }))
    }

    /// Whether the acquisition halted itself at its sample-count limit.
    /// `false` while a request is outstanding.
    pub fn auto_stopped(&self, index: usize) -> Result<bool> {
        let slot = self.slot(index)?;
        let state = slot.lock().state;
        Ok(state.ready && state.auto_stop)
    }

    /// Trigger point of the latest capture, or `None` if the trigger has
    /// not fired since the last clear.
    pub fn is_trigger_ready(&self, index: usize) -> Result<Option<usize>> {
        let slot = self.slot(index)?;
        let state = slot.lock().state;
        Ok(state.triggered.then_some(state.trigger_at))
    }

    /// Drop the sticky trigger marker. Leaves ready, sample count, and
    /// overflow untouched. Idempotent.
    pub fn clear_trigger_ready(&mut self, index: usize) -> Result<()> {
        self.slot(index)?.lock().state.clear_trigger();
        Ok(())
    }

    /// Channel saturation bitmask from the latest delivery; bit 0 is
    /// channel A.
    pub fn has_overflowed(&self, index: usize) -> Result<u16> {
        Ok(self.slot(index)?.lock().state.overflow)
    }

    // =========================================================================
    // Driver delegation
    // =========================================================================

    /// Start a block-mode capture, clearing the ready flag first and
    /// publishing the expected total sample count. Completion is observed
    /// through [`Self::is_ready`]; data is retrieved through the driver's
    /// own synchronous call afterwards.
    pub fn run_block(&mut self, index: usize, request: &BlockRequest) -> Result<()> {
        let shared = self.slot(index)?;
        let handle = {
            let mut slot = shared.lock();
            slot.state.begin_block(request.total_samples());
            slot.handle
        };
        let relay = BlockRelay::new(shared);
        // The slot lock must be dropped before delegating: the driver may
        // invoke the completion callback on this very thread.
        self.driver.run_block(handle, request, relay)?;
        Ok(())
    }

    /// Ask the driver for the next batch of streamed values, clearing the
    /// per-cycle state first. The relay handed to the driver publishes the
    /// outcome; the caller observes it through the poll API.
    pub fn get_streaming_latest_values(&mut self, index: usize) -> Result<()> {
        let shared = self.slot(index)?;
        let handle = {
            let mut slot = shared.lock();
            slot.state.begin_streaming();
            slot.handle
        };
        let relay = StreamingRelay::new(shared, self.policy);
        // As above: the driver may deliver synchronously on this thread.
        self.driver.request_latest_values(handle, relay)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::error::DriverError;
    use capture_core::{BlockHandler, StreamingHandler, UnitInfo};

    /// Driver stub that accepts everything and calls nothing back.
    struct InertDriver;

    impl ScopeDriver for InertDriver {
        fn run_block(
            &self,
            _handle: DeviceHandle,
            _request: &BlockRequest,
            _handler: Arc<dyn BlockHandler>,
        ) -> std::result::Result<(), DriverError> {
            Ok(())
        }

        fn request_latest_values(
            &self,
            _handle: DeviceHandle,
            _handler: Arc<dyn StreamingHandler>,
        ) -> std::result::Result<(), DriverError> {
            Ok(())
        }

        fn unit_info(&self, _handle: DeviceHandle) -> std::result::Result<UnitInfo, DriverError> {
            Ok(UnitInfo {
                variant: "2205AMSO".into(),
            })
        }
    }

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(InertDriver))
    }

    #[test]
    fn register_hands_out_increasing_indices() {
        let mut reg = registry();
        for expected in 0..MAX_DEVICES {
            assert_eq!(reg.register(10 + expected as i16).unwrap(), expected);
        }
        assert_eq!(reg.count(), MAX_DEVICES);

        let err = reg.register(99).unwrap_err();
        assert!(matches!(err, Error::MaxDevicesReached { max } if max == MAX_DEVICES));
        assert_eq!(reg.count(), MAX_DEVICES, "failed register must not mutate");
    }

    #[test]
    fn register_rejects_non_positive_handles() {
        let mut reg = registry();
        assert!(matches!(
            reg.register(0),
            Err(Error::InvalidHandle { handle: 0 })
        ));
        assert!(matches!(
            reg.register(-3),
            Err(Error::InvalidHandle { handle: -3 })
        ));
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn release_keeps_indices_stable() {
        let mut reg = registry();
        let a = reg.register(1).unwrap();
        let b = reg.register(2).unwrap();
        reg.release(a).unwrap();
        assert_eq!(reg.count(), 1);

        // b's index still works; a's does not and is not reused.
        assert!(reg.is_ready(b).is_ok());
        assert!(matches!(reg.is_ready(a), Err(Error::InvalidIndex { .. })));
        let c = reg.register(3).unwrap();
        assert_eq!(c, 2);
    }

    #[test]
    fn released_index_rejected_by_every_poll_call() {
        let mut reg = registry();
        let i = reg.register(1).unwrap();
        reg.release(i).unwrap();

        assert!(matches!(reg.is_ready(i), Err(Error::InvalidIndex { .. })));
        assert!(matches!(reg.available_data(i), Err(Error::InvalidIndex { .. })));
        assert!(matches!(reg.auto_stopped(i), Err(Error::InvalidIndex { .. })));
        assert!(matches!(reg.is_trigger_ready(i), Err(Error::InvalidIndex { .. })));
        assert!(matches!(reg.clear_trigger_ready(i), Err(Error::InvalidIndex { .. })));
        assert!(matches!(reg.has_overflowed(i), Err(Error::InvalidIndex { .. })));
        assert!(matches!(
            reg.get_streaming_latest_values(i),
            Err(Error::InvalidIndex { .. })
        ));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let reg = registry();
        assert!(matches!(reg.is_ready(0), Err(Error::InvalidIndex { index: 0 })));
        assert!(matches!(reg.is_ready(17), Err(Error::InvalidIndex { index: 17 })));
    }

    #[test]
    fn reset_all_reclaims_the_table() {
        let mut reg = registry();
        for h in 1..=MAX_DEVICES as i16 {
            reg.register(h).unwrap();
        }
        reg.reset_all();
        assert_eq!(reg.count(), 0);
        assert_eq!(reg.register(5).unwrap(), 0);
    }

    #[test]
    fn channel_count_validation() {
        let mut reg = registry();
        let i = reg.register(1).unwrap();
        assert!(matches!(
            reg.set_channel_counts(i, 0, 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            reg.set_channel_counts(i, MAX_CHANNELS + 1, 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            reg.set_channel_counts(i, 2, 1),
            Err(Error::InvalidParameter(_))
        ));
        reg.set_channel_counts(i, 2, 2).unwrap();
    }

    #[test]
    fn detect_channel_counts_parses_variant() {
        let mut reg = registry();
        let i = reg.register(1).unwrap();
        reg.detect_channel_counts(i).unwrap();
        // InertDriver reports "2205AMSO": 2 channels, 2 digital ports.
        reg.set_enabled_channels(i, &[true, false]).unwrap();
        reg.set_enabled_digital_ports(i, &[true, true]).unwrap();
    }

    #[test]
    fn enabled_masks_require_configuration() {
        let mut reg = registry();
        let i = reg.register(1).unwrap();
        assert!(matches!(
            reg.set_enabled_channels(i, &[true]),
            Err(Error::InvalidParameter(_))
        ));
        reg.set_channel_counts(i, 4, 0).unwrap();
        assert!(matches!(
            reg.set_enabled_channels(i, &[true, true]),
            Err(Error::InvalidParameter(_))
        ));
        reg.set_enabled_channels(i, &[true, false, true, false]).unwrap();
        // No digital ports on this device: only the empty mask fits.
        reg.set_enabled_digital_ports(i, &[]).unwrap();
        assert!(matches!(
            reg.set_enabled_digital_ports(i, &[true]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn run_block_clears_ready_and_sets_expected_total() {
        let mut reg = registry();
        let i = reg.register(1).unwrap();
        reg.set_channel_counts(i, 2, 0).unwrap();
        reg.run_block(
            i,
            &BlockRequest {
                pre_trigger_samples: 200,
                post_trigger_samples: 800,
                timebase: 8,
                segment: 0,
            },
        )
        .unwrap();
        // InertDriver never completes, so ready stays false with the
        // expected total published.
        assert!(!reg.is_ready(i).unwrap());
        assert_eq!(reg.available_data(i).unwrap(), None);
    }

    #[test]
    fn streaming_request_clears_cycle_state() {
        let mut reg = registry();
        let i = reg.register(1).unwrap();
        reg.set_channel_counts(i, 2, 0).unwrap();
        reg.get_streaming_latest_values(i).unwrap();
        assert!(!reg.is_ready(i).unwrap());
        assert!(!reg.auto_stopped(i).unwrap());
    }
}
