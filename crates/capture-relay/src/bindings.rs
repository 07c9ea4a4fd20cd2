//! The buffer binding table.
//!
//! Per device, per logical stream (analog channel or digital port), the
//! table records which caller-owned buffer pairs with which driver-owned
//! buffer, and the capacity both were declared with. Aggregated acquisition
//! modes report an upper and lower envelope per interval, so every stream
//! has two independent sub-streams: `max` (also used alone by non-aggregated
//! modes, by convention) and `min`.
//!
//! Bindings are only ever created by explicit bind calls. Supplying `None`
//! for either side of a pair clears that sub-stream instead of setting it,
//! and rebinding replaces the previous pair outright, so no stale reference
//! survives a rebind.

use capture_core::{Error, Result, SharedSamples};

/// One destination/source pair for a single sub-stream.
#[derive(Clone)]
pub(crate) struct BufferPair {
    /// Caller-owned storage; the relay only writes through this.
    pub app: SharedSamples,
    /// Driver-owned storage; the relay only reads through this.
    pub driver: SharedSamples,
}

/// Max/min sub-stream bindings for one channel or port.
#[derive(Clone, Default)]
pub(crate) struct StreamBindings {
    pub max: Option<BufferPair>,
    pub min: Option<BufferPair>,
    /// Declared capacity, in samples, of every buffer bound above. The
    /// relay trusts this only under the clamping copy policy; the caller is
    /// responsible for it matching what the driver was told.
    pub capacity: usize,
}

impl StreamBindings {
    fn is_bound(&self) -> bool {
        self.max.is_some() || self.min.is_some()
    }
}

/// Binding table for one device: analog channels plus digital ports.
///
/// Sized by [`BindingTable::configure`] once the device's channel and port
/// counts are known; bind calls against unconfigured indices fail with the
/// range error for that domain.
#[derive(Default)]
pub struct BindingTable {
    channels: Vec<StreamBindings>,
    ports: Vec<StreamBindings>,
}

fn pair(app: Option<SharedSamples>, driver: Option<SharedSamples>) -> Option<BufferPair> {
    match (app, driver) {
        (Some(app), Some(driver)) => Some(BufferPair { app, driver }),
        _ => None,
    }
}

impl BindingTable {
    /// Size the table for a device's stream counts, dropping any bindings
    /// made under a previous configuration.
    pub(crate) fn configure(&mut self, channel_count: usize, digital_port_count: usize) {
        self.channels = vec![StreamBindings::default(); channel_count];
        self.ports = vec![StreamBindings::default(); digital_port_count];
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn digital_port_count(&self) -> usize {
        self.ports.len()
    }

    pub(crate) fn channel(&self, channel: usize) -> &StreamBindings {
        &self.channels[channel]
    }

    pub(crate) fn port(&self, port: usize) -> &StreamBindings {
        &self.ports[port]
    }

    /// Bind (or clear) the max sub-stream of an analog channel.
    pub(crate) fn bind_channel(
        &mut self,
        channel: usize,
        app: Option<SharedSamples>,
        driver: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        let slot = self.channel_slot(channel)?;
        let max = pair(app, driver);
        Self::apply(slot, max, None, false, length)
    }

    /// Bind (or clear) both sub-streams of an analog channel as one unit.
    pub(crate) fn bind_channel_min_max(
        &mut self,
        channel: usize,
        app_max: Option<SharedSamples>,
        app_min: Option<SharedSamples>,
        driver_max: Option<SharedSamples>,
        driver_min: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        let slot = self.channel_slot(channel)?;
        let max = pair(app_max, driver_max);
        let min = pair(app_min, driver_min);
        Self::apply(slot, max, min, true, length)
    }

    /// Bind (or clear) the max sub-stream of a digital port.
    pub(crate) fn bind_digital_port(
        &mut self,
        port: usize,
        app: Option<SharedSamples>,
        driver: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        let slot = self.port_slot(port)?;
        let max = pair(app, driver);
        Self::apply(slot, max, None, false, length)
    }

    /// Bind (or clear) both sub-streams of a digital port as one unit.
    pub(crate) fn bind_digital_port_min_max(
        &mut self,
        port: usize,
        app_max: Option<SharedSamples>,
        app_min: Option<SharedSamples>,
        driver_max: Option<SharedSamples>,
        driver_min: Option<SharedSamples>,
        length: usize,
    ) -> Result<()> {
        let slot = self.port_slot(port)?;
        let max = pair(app_max, driver_max);
        let min = pair(app_min, driver_min);
        Self::apply(slot, max, min, true, length)
    }

    fn channel_slot(&mut self, channel: usize) -> Result<&mut StreamBindings> {
        let count = self.channels.len();
        self.channels
            .get_mut(channel)
            .ok_or(Error::InvalidChannel { channel, count })
    }

    fn port_slot(&mut self, port: usize) -> Result<&mut StreamBindings> {
        let count = self.ports.len();
        self.ports
            .get_mut(port)
            .ok_or(Error::InvalidDigitalPort { port, count })
    }

    /// Validate, then commit both sub-streams together. Validation happens
    /// before any assignment so a failed call leaves the previous bindings
    /// untouched.
    fn apply(
        slot: &mut StreamBindings,
        max: Option<BufferPair>,
        min: Option<BufferPair>,
        set_min: bool,
        length: usize,
    ) -> Result<()> {
        let setting_any = max.is_some() || min.is_some();
        if setting_any && length == 0 {
            return Err(Error::InvalidParameter("buffer length must be positive"));
        }
        slot.max = max;
        if set_min {
            slot.min = min;
        }
        if setting_any {
            slot.capacity = length;
        } else if !slot.is_bound() {
            slot.capacity = 0;
        }
        Ok(())
    }
}
