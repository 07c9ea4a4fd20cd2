//! Sample generation for the mock driver.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// What the mock writes into its driver-owned buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPattern {
    /// Deterministic ramp keyed on the absolute sample offset, so a value
    /// identifies its own position when inspecting copied ranges.
    #[default]
    Ramp,
    /// Seeded uniform noise across the full ADC range.
    Noise,
}

/// Fill `samples[..]` as the range starting at absolute offset `start`.
pub(crate) fn fill(samples: &mut [i16], start: usize, pattern: FillPattern, rng: &mut ChaCha8Rng) {
    match pattern {
        FillPattern::Ramp => {
            for (i, s) in samples.iter_mut().enumerate() {
                *s = ((start + i) % 0x8000) as i16;
            }
        }
        FillPattern::Noise => {
            for s in samples.iter_mut() {
                *s = rng.gen_range(-32000..=32000);
            }
        }
    }
}
