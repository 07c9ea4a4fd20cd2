//! Shared sample storage.
//!
//! Both sides of a buffer binding — the caller-owned destination and the
//! driver-owned source — are expressed as [`SharedSamples`]: a reference-
//! counted, mutex-guarded vector of raw ADC counts. Ownership in the design
//! sense never moves; the relay only ever reads through a driver reference
//! and writes through an app reference during a copy.

use parking_lot::Mutex;
use std::sync::Arc;

/// One sample buffer, shareable between the caller, the relay, and a driver.
///
/// Samples are raw 16-bit ADC counts for analog channels and packed bit
/// patterns for digital ports, matching what the vendor driver produces.
pub type SharedSamples = Arc<Mutex<Vec<i16>>>;

/// Allocate a zeroed shared buffer of `len` samples.
pub fn shared_samples(len: usize) -> SharedSamples {
    Arc::new(Mutex::new(vec![0; len]))
}
