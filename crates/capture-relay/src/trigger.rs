//! Flat-array decoders for trigger configuration records.
//!
//! The polling caller cannot pass structures, so trigger conditions,
//! channel properties, and pulse-width qualifier conditions arrive as flat
//! integer sequences: a fixed number of integers per record, concatenated.
//! These builders decode such a sequence into named configuration values
//! that can be handed to the driver's trigger entry points.
//!
//! Decoding is mechanical — the only invariants are the record width and
//! that enum discriminants are in range — which is exactly why it lives
//! here at the boundary and not inside the relay.

use capture_core::{Error, Result};

/// Participation of one input in a trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    /// The input plays no part in the condition.
    #[default]
    DontCare,
    /// The input must be triggering.
    True,
    /// The input must not be triggering.
    False,
}

impl TriggerState {
    fn decode(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::DontCare),
            1 => Ok(Self::True),
            2 => Ok(Self::False),
            _ => Err(Error::InvalidParameter("trigger state out of range")),
        }
    }
}

/// How a channel's thresholds are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Compare against a single level.
    Level,
    /// Compare against a window between the two thresholds.
    Window,
}

impl ThresholdMode {
    fn decode(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Level),
            1 => Ok(Self::Window),
            _ => Err(Error::InvalidParameter("threshold mode out of range")),
        }
    }
}

/// One trigger condition record: the conjunction of states across inputs.
/// Multiple records are OR-ed together by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerConditions {
    pub channel_a: TriggerState,
    pub channel_b: TriggerState,
    pub channel_c: TriggerState,
    pub channel_d: TriggerState,
    pub external: TriggerState,
    pub aux: TriggerState,
    pub pulse_width_qualifier: TriggerState,
    pub digital: TriggerState,
}

impl TriggerConditions {
    /// Integers per flat record.
    pub const FLAT_WIDTH: usize = 8;

    /// Decode a concatenated sequence of condition records.
    pub fn decode_flat(flat: &[u32]) -> Result<Vec<Self>> {
        records(flat, Self::FLAT_WIDTH)?
            .map(|r| {
                Ok(Self {
                    channel_a: TriggerState::decode(r[0])?,
                    channel_b: TriggerState::decode(r[1])?,
                    channel_c: TriggerState::decode(r[2])?,
                    channel_d: TriggerState::decode(r[3])?,
                    external: TriggerState::decode(r[4])?,
                    aux: TriggerState::decode(r[5])?,
                    pulse_width_qualifier: TriggerState::decode(r[6])?,
                    digital: TriggerState::decode(r[7])?,
                })
            })
            .collect()
    }
}

/// One channel's trigger thresholds and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerChannelProperties {
    pub threshold_upper: i32,
    pub threshold_upper_hysteresis: i32,
    pub threshold_lower: i32,
    pub threshold_lower_hysteresis: i32,
    pub channel: u32,
    pub threshold_mode: ThresholdMode,
}

impl TriggerChannelProperties {
    /// Integers per flat record.
    pub const FLAT_WIDTH: usize = 6;

    /// Decode a concatenated sequence of property records.
    pub fn decode_flat(flat: &[i32]) -> Result<Vec<Self>> {
        records(flat, Self::FLAT_WIDTH)?
            .map(|r| {
                if r[4] < 0 {
                    return Err(Error::InvalidParameter("channel must be non-negative"));
                }
                Ok(Self {
                    threshold_upper: r[0],
                    threshold_upper_hysteresis: r[1],
                    threshold_lower: r[2],
                    threshold_lower_hysteresis: r[3],
                    channel: r[4] as u32,
                    threshold_mode: ThresholdMode::decode(r[5])?,
                })
            })
            .collect()
    }
}

/// One pulse-width qualifier condition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PwqConditions {
    pub channel_a: TriggerState,
    pub channel_b: TriggerState,
    pub channel_c: TriggerState,
    pub channel_d: TriggerState,
    pub external: TriggerState,
    pub aux: TriggerState,
    pub digital: TriggerState,
}

impl PwqConditions {
    /// Integers per flat record.
    pub const FLAT_WIDTH: usize = 7;

    /// Decode a concatenated sequence of qualifier condition records.
    pub fn decode_flat(flat: &[u32]) -> Result<Vec<Self>> {
        records(flat, Self::FLAT_WIDTH)?
            .map(|r| {
                Ok(Self {
                    channel_a: TriggerState::decode(r[0])?,
                    channel_b: TriggerState::decode(r[1])?,
                    channel_c: TriggerState::decode(r[2])?,
                    channel_d: TriggerState::decode(r[3])?,
                    external: TriggerState::decode(r[4])?,
                    aux: TriggerState::decode(r[5])?,
                    digital: TriggerState::decode(r[6])?,
                })
            })
            .collect()
    }
}

fn records<T>(flat: &[T], width: usize) -> Result<std::slice::ChunksExact<'_, T>> {
    if flat.len() % width != 0 {
        return Err(Error::InvalidParameter(
            "flat array length is not a multiple of the record width",
        ));
    }
    Ok(flat.chunks_exact(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_trigger_conditions() {
        // Channel A must trigger, channel B must not, rest don't care.
        let flat = [1, 2, 0, 0, 0, 0, 0, 0];
        let decoded = TriggerConditions::decode_flat(&flat).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].channel_a, TriggerState::True);
        assert_eq!(decoded[0].channel_b, TriggerState::False);
        assert_eq!(decoded[0].digital, TriggerState::DontCare);
    }

    #[test]
    fn decodes_multiple_records() {
        let mut flat = vec![0; 8 * 3];
        flat[0] = 1; // record 0: channel A
        flat[8 + 1] = 1; // record 1: channel B
        flat[16 + 7] = 1; // record 2: digital
        let decoded = TriggerConditions::decode_flat(&flat).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].channel_b, TriggerState::True);
        assert_eq!(decoded[2].digital, TriggerState::True);
    }

    #[test]
    fn rejects_ragged_length() {
        let flat = [0u32; 9];
        assert!(matches!(
            TriggerConditions::decode_flat(&flat),
            Err(Error::InvalidParameter(_))
        ));
        let flat = [0u32; 13];
        assert!(matches!(
            PwqConditions::decode_flat(&flat),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_state() {
        let flat = [3, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            TriggerConditions::decode_flat(&flat),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_input_decodes_to_no_records() {
        assert!(TriggerConditions::decode_flat(&[]).unwrap().is_empty());
    }

    #[test]
    fn decodes_channel_properties() {
        let flat = [16000, 256, -16000, 256, 0, 1];
        let decoded = TriggerChannelProperties::decode_flat(&flat).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].threshold_upper, 16000);
        assert_eq!(decoded[0].threshold_lower, -16000);
        assert_eq!(decoded[0].channel, 0);
        assert_eq!(decoded[0].threshold_mode, ThresholdMode::Window);
    }

    #[test]
    fn rejects_negative_channel() {
        let flat = [0, 0, 0, 0, -1, 0];
        assert!(matches!(
            TriggerChannelProperties::decode_flat(&flat),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn decodes_pwq_conditions() {
        let flat = [0, 0, 1, 0, 0, 0, 0];
        let decoded = PwqConditions::decode_flat(&flat).unwrap();
        assert_eq!(decoded[0].channel_c, TriggerState::True);
    }
}
