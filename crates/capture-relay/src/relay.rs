//! The streaming relay: the callback the driver invokes when samples exist.
//!
//! The relay runs on an execution context owned by the driver. It resolves
//! its context back to a device slot, records the delivery descriptor,
//! moves the newly produced range from every enabled-and-bound driver
//! buffer into its paired caller buffer, and only then publishes
//! `ready = true`. It returns nothing and reports nothing: a sub-stream it
//! cannot copy safely is skipped whole, never copied partially.
//!
//! A block-mode sibling, [`BlockRelay`], does no copying at all — block
//! data is fetched by the caller through a separate retrieval call — and
//! only flips the ready flag when the driver signals completion.

use std::sync::{Arc, Weak};

use capture_core::{BlockHandler, StreamingDelivery, StreamingHandler};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::bindings::{BufferPair, StreamBindings};
use crate::slot::{DeviceSlot, SharedSlot};

/// What to do when a delivery would overrun a bound buffer.
///
/// The default contract never clamps: shrinking a copy silently would break
/// the sample/offset correspondence callers rely on for later ranges, so an
/// overrunning delivery copies nothing for that sub-stream. One device
/// family historically clamped to the declared capacity instead; that
/// behavior is available as an explicit policy, never as a silent variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CopyPolicy {
    /// Copy exactly the delivered range or nothing at all.
    #[default]
    Strict,
    /// Shrink the copy to fit the declared capacity. The caller-visible
    /// sample count still reports the driver's unclamped value.
    ClampToCapacity,
}

/// Streaming callback state: a weak route back to one device slot plus the
/// copy policy to apply. Constructed fresh for each latest-values request.
pub struct StreamingRelay {
    slot: Weak<Mutex<DeviceSlot>>,
    policy: CopyPolicy,
}

impl StreamingRelay {
    pub(crate) fn new(slot: &SharedSlot, policy: CopyPolicy) -> Arc<Self> {
        Arc::new(Self {
            slot: Arc::downgrade(slot),
            policy,
        })
    }
}

impl StreamingHandler for StreamingRelay {
    fn deliver(&self, delivery: &StreamingDelivery) {
        // A spurious or late callback (device released, registry reset)
        // resolves to nothing and must change nothing.
        let Some(slot) = self.slot.upgrade() else {
            trace!("streaming delivery for a released device, ignoring");
            return;
        };
        let mut slot = slot.lock();
        let slot = &mut *slot;

        slot.state.record(delivery);

        if delivery.samples > 0 {
            for channel in 0..slot.channel_count {
                if !slot.enabled_channels[channel] {
                    continue;
                }
                copy_stream(
                    slot.bindings.channel(channel),
                    delivery,
                    self.policy,
                    "channel",
                    channel,
                );
            }
            for port in 0..slot.digital_port_count {
                if !slot.enabled_digital_ports[port] {
                    continue;
                }
                copy_stream(
                    slot.bindings.port(port),
                    delivery,
                    self.policy,
                    "digital_port",
                    port,
                );
            }
        }

        // Published last, inside the same critical section as the copies.
        // A zero-sample delivery still publishes: together with auto_stop it
        // is the terminal "finished with nothing further" signal.
        slot.state.ready = true;
        trace!(
            samples = delivery.samples,
            start_index = delivery.start_index,
            auto_stop = delivery.auto_stop,
            "streaming delivery published"
        );
    }
}

/// Block-mode completion callback. Only sets the ready flag; block data is
/// retrieved synchronously by the caller afterwards.
pub struct BlockRelay {
    slot: Weak<Mutex<DeviceSlot>>,
}

impl BlockRelay {
    pub(crate) fn new(slot: &SharedSlot) -> Arc<Self> {
        Arc::new(Self {
            slot: Arc::downgrade(slot),
        })
    }
}

impl BlockHandler for BlockRelay {
    fn block_ready(&self) {
        let Some(slot) = self.slot.upgrade() else {
            trace!("block completion for a released device, ignoring");
            return;
        };
        slot.lock().state.ready = true;
    }
}

fn copy_stream(
    bindings: &StreamBindings,
    delivery: &StreamingDelivery,
    policy: CopyPolicy,
    domain: &'static str,
    index: usize,
) {
    if let Some(pair) = &bindings.max {
        copy_pair(pair, bindings.capacity, delivery, policy, domain, index, "max");
    }
    if let Some(pair) = &bindings.min {
        copy_pair(pair, bindings.capacity, delivery, policy, domain, index, "min");
    }
}

#[allow(clippy::too_many_arguments)]
fn copy_pair(
    pair: &BufferPair,
    declared_capacity: usize,
    delivery: &StreamingDelivery,
    policy: CopyPolicy,
    domain: &'static str,
    index: usize,
    sub_stream: &'static str,
) {
    // A buffer bound as both source and destination is a caller error; the
    // two locks below would be the same lock.
    if Arc::ptr_eq(&pair.app, &pair.driver) {
        warn!(domain, index, sub_stream, "source and destination are the same buffer, skipping");
        return;
    }

    let src = pair.driver.lock();
    let mut dst = pair.app.lock();

    let start = delivery.start_index;
    let wanted = delivery.samples;

    let copied = match policy {
        CopyPolicy::Strict => {
            let end = start + wanted;
            if end > src.len() || end > dst.len() {
                warn!(
                    domain,
                    index,
                    sub_stream,
                    start,
                    wanted,
                    src_len = src.len(),
                    dst_len = dst.len(),
                    "delivery overruns bound buffer, skipping copy"
                );
                return;
            }
            wanted
        }
        CopyPolicy::ClampToCapacity => {
            let capacity = declared_capacity.min(src.len()).min(dst.len());
            let room = capacity.saturating_sub(start);
            let copied = wanted.min(room);
            if copied < wanted {
                warn!(
                    domain,
                    index,
                    sub_stream,
                    start,
                    wanted,
                    copied,
                    "delivery clamped to bound capacity"
                );
            }
            copied
        }
    };

    if copied > 0 {
        dst[start..start + copied].copy_from_slice(&src[start..start + copied]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::shared_samples;

    fn slot_with(channels: usize, ports: usize) -> SharedSlot {
        let mut slot = DeviceSlot::new(1);
        slot.set_counts(channels, ports);
        Arc::new(Mutex::new(slot))
    }

    fn fill_ramp(buf: &capture_core::SharedSamples, base: i16) {
        for (i, s) in buf.lock().iter_mut().enumerate() {
            *s = base + i as i16;
        }
    }

    fn delivery(samples: usize, start_index: usize) -> StreamingDelivery {
        StreamingDelivery {
            samples,
            start_index,
            ..Default::default()
        }
    }

    #[test]
    fn copies_enabled_bound_channel() {
        let slot = slot_with(4, 0);
        let app = shared_samples(1000);
        let drv = shared_samples(1000);
        fill_ramp(&drv, 100);
        {
            let mut s = slot.lock();
            s.enabled_channels[0] = true;
            s.bindings
                .bind_channel(0, Some(app.clone()), Some(drv.clone()), 1000)
                .unwrap();
        }

        let relay = StreamingRelay::new(&slot, CopyPolicy::Strict);
        relay.deliver(&delivery(500, 0));

        assert_eq!(app.lock()[..500], drv.lock()[..500]);
        assert!(app.lock()[500..].iter().all(|&s| s == 0));
        let s = slot.lock();
        assert!(s.state.ready);
        assert_eq!(s.state.samples, 500);
        assert_eq!(s.state.start_index, 0);
    }

    #[test]
    fn second_delivery_extends_without_touching_first_range() {
        let slot = slot_with(4, 0);
        let app = shared_samples(1000);
        let drv = shared_samples(1000);
        fill_ramp(&drv, 0);
        {
            let mut s = slot.lock();
            s.enabled_channels[0] = true;
            s.bindings
                .bind_channel(0, Some(app.clone()), Some(drv.clone()), 1000)
                .unwrap();
        }

        let relay = StreamingRelay::new(&slot, CopyPolicy::Strict);
        relay.deliver(&delivery(500, 0));
        relay.deliver(&delivery(500, 500));

        assert_eq!(*app.lock(), *drv.lock());
        let s = slot.lock();
        assert_eq!(s.state.samples, 500);
        assert_eq!(s.state.start_index, 500);
    }

    #[test]
    fn disabled_channel_is_never_copied() {
        let slot = slot_with(4, 0);
        let app = shared_samples(100);
        let drv = shared_samples(100);
        fill_ramp(&drv, 1);
        {
            let mut s = slot.lock();
            // Bound but not enabled.
            s.bindings
                .bind_channel(0, Some(app.clone()), Some(drv), 100)
                .unwrap();
        }

        StreamingRelay::new(&slot, CopyPolicy::Strict).deliver(&delivery(100, 0));

        assert!(app.lock().iter().all(|&s| s == 0));
        assert!(slot.lock().state.ready, "ready publishes even with no copy");
    }

    #[test]
    fn enabled_unbound_channel_is_a_noop() {
        let slot = slot_with(2, 0);
        slot.lock().enabled_channels[1] = true;
        StreamingRelay::new(&slot, CopyPolicy::Strict).deliver(&delivery(64, 0));
        assert!(slot.lock().state.ready);
    }

    #[test]
    fn strict_overrun_skips_whole_sub_stream() {
        let slot = slot_with(1, 0);
        let app = shared_samples(100);
        let drv = shared_samples(1000);
        fill_ramp(&drv, 0);
        {
            let mut s = slot.lock();
            s.enabled_channels[0] = true;
            s.bindings
                .bind_channel(0, Some(app.clone()), Some(drv), 100)
                .unwrap();
        }

        StreamingRelay::new(&slot, CopyPolicy::Strict).deliver(&delivery(500, 0));

        // Nothing copied, but the delivery is still published verbatim.
        assert!(app.lock().iter().all(|&s| s == 0));
        let s = slot.lock();
        assert!(s.state.ready);
        assert_eq!(s.state.samples, 500);
    }

    #[test]
    fn clamp_policy_copies_what_fits() {
        let slot = slot_with(1, 0);
        let app = shared_samples(100);
        let drv = shared_samples(1000);
        fill_ramp(&drv, 0);
        {
            let mut s = slot.lock();
            s.enabled_channels[0] = true;
            s.bindings
                .bind_channel(0, Some(app.clone()), Some(drv.clone()), 100)
                .unwrap();
        }

        StreamingRelay::new(&slot, CopyPolicy::ClampToCapacity).deliver(&delivery(500, 0));

        assert_eq!(app.lock()[..100], drv.lock()[..100]);
        // Caller-visible count stays unclamped.
        assert_eq!(slot.lock().state.samples, 500);
    }

    #[test]
    fn digital_ports_copy_with_same_offsets() {
        let slot = slot_with(2, 2);
        let app = shared_samples(256);
        let drv = shared_samples(256);
        fill_ramp(&drv, 7);
        {
            let mut s = slot.lock();
            s.enabled_digital_ports[1] = true;
            s.bindings
                .bind_digital_port(1, Some(app.clone()), Some(drv.clone()), 256)
                .unwrap();
        }

        StreamingRelay::new(&slot, CopyPolicy::Strict).deliver(&delivery(128, 64));

        assert_eq!(app.lock()[64..192], drv.lock()[64..192]);
        assert!(app.lock()[..64].iter().all(|&s| s == 0));
        assert!(app.lock()[192..].iter().all(|&s| s == 0));
    }

    #[test]
    fn zero_sample_auto_stop_still_publishes() {
        let slot = slot_with(1, 0);
        let relay = StreamingRelay::new(&slot, CopyPolicy::Strict);
        relay.deliver(&StreamingDelivery {
            samples: 0,
            start_index: 750,
            auto_stop: true,
            ..Default::default()
        });
        let s = slot.lock();
        assert!(s.state.ready);
        assert!(s.state.auto_stop);
        assert_eq!(s.state.samples, 0);
        assert_eq!(s.state.start_index, 750);
    }

    #[test]
    fn late_delivery_after_release_is_ignored() {
        let slot = slot_with(1, 0);
        let relay = StreamingRelay::new(&slot, CopyPolicy::Strict);
        drop(slot);
        // Must neither panic nor touch anything.
        relay.deliver(&delivery(100, 0));
    }

    #[test]
    fn self_paired_buffer_is_skipped() {
        let slot = slot_with(1, 0);
        let buf = shared_samples(100);
        {
            let mut s = slot.lock();
            s.enabled_channels[0] = true;
            s.bindings
                .bind_channel(0, Some(buf.clone()), Some(buf.clone()), 100)
                .unwrap();
        }
        // Would deadlock if the relay tried to lock both sides.
        StreamingRelay::new(&slot, CopyPolicy::Strict).deliver(&delivery(10, 0));
        assert!(slot.lock().state.ready);
    }

    #[test]
    fn block_relay_only_sets_ready() {
        let slot = slot_with(2, 0);
        {
            let mut s = slot.lock();
            s.state.begin_block(1000);
        }
        let relay = BlockRelay::new(&slot);
        relay.block_ready();
        let s = slot.lock();
        assert!(s.state.ready);
        assert_eq!(s.state.samples, 1000);
    }

    #[test]
    fn block_relay_tolerates_released_slot() {
        let slot = slot_with(1, 0);
        let relay = BlockRelay::new(&slot);
        drop(slot);
        relay.block_ready();
    }
}
