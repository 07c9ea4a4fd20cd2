//! Fixed capacities shared across the relay.

/// Maximum number of instruments the registry will track at once.
pub const MAX_DEVICES: usize = 4;

/// Maximum analog channels on any supported device variant.
pub const MAX_CHANNELS: usize = 4;

/// Digital port count on mixed-signal variants. Devices either have this
/// many ports or none at all.
pub const MAX_DIGITAL_PORTS: usize = 2;
