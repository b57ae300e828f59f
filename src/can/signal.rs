//! Immutable description of one CAN signal.
//!
//! Mirrors the field set the teacher crate keeps on `SignalDBC`
//! (`examples/MarcoBelluDev-can_tools/src/dbc/types/signal.rs`): bit
//! position/length, endianness, sign/format, scaling, bounds and
//! multiplexing role. Unlike the teacher, descriptions here are plain value
//! types keyed by name rather than SlotMap arena entries — the spec treats
//! them as immutable and shared, with no need for the teacher's
//! stable-key-across-reordering guarantee.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::can::bitcodec::{DataFormat, Endian};

/// Where a signal's bits live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataSource {
    FrameId,
    #[default]
    Payload,
}

/// A signal's role (if any) in multiplexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultiplexState {
    #[default]
    None,
    MultiplexorSwitch,
    MultiplexedSignal,
    SwitchAndSignal,
}

/// Immutable description of one signal within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescription {
    pub name: String,
    pub data_source: DataSource,
    pub start_bit: u16,
    pub bit_length: u16,
    pub data_format: DataFormat,
    pub data_endian: Endian,
    pub factor: f64,
    pub offset: f64,
    pub scaling: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub multiplex_state: MultiplexState,
    /// switch-signal-name -> inclusive `[min, max]` ranges. Empty = unconditional.
    pub multiplex_signals: BTreeMap<String, Vec<(i64, i64)>>,
}

impl Default for SignalDescription {
    fn default() -> Self {
        SignalDescription {
            name: String::new(),
            data_source: DataSource::Payload,
            start_bit: 0,
            bit_length: 1,
            data_format: DataFormat::UnsignedInteger,
            data_endian: Endian::Little,
            factor: f64::NAN,
            offset: f64::NAN,
            scaling: f64::NAN,
            minimum: f64::NAN,
            maximum: f64::NAN,
            multiplex_state: MultiplexState::None,
            multiplex_signals: BTreeMap::new(),
        }
    }
}

impl SignalDescription {
    pub fn new(name: impl Into<String>) -> Self {
        SignalDescription {
            name: name.into(),
            ..Default::default()
        }
    }

    /// `factor`/`scaling` of exactly `0.0` are normalized to `NaN` ("not
    /// applied"), per spec.
    pub fn normalize(&mut self) {
        if self.factor == 0.0 {
            self.factor = f64::NAN;
        }
        if self.scaling == 0.0 {
            self.scaling = f64::NAN;
        }
    }

    /// Structural validity per spec §3: non-empty name, start bit/length
    /// within range for the data source and format.
    pub fn is_valid(&self) -> bool {
        if self.name.is_empty() {
            return false;
        }
        let max_start = match self.data_source {
            DataSource::FrameId => 28,
            DataSource::Payload => 63,
        };
        if self.start_bit > max_start {
            return false;
        }
        if self.bit_length == 0 || self.bit_length > 64 {
            return false;
        }
        match self.data_format {
            DataFormat::Float if self.bit_length != 32 => return false,
            DataFormat::Double if self.bit_length != 64 => return false,
            DataFormat::AsciiString if self.bit_length % 8 != 0 => return false,
            _ => {}
        }
        true
    }

    /// Whether this signal is a multiplexor switch (selects other signals).
    pub fn is_multiplexor(&self) -> bool {
        matches!(
            self.multiplex_state,
            MultiplexState::MultiplexorSwitch | MultiplexState::SwitchAndSignal
        )
    }

    /// Whether this signal is gated by one or more multiplexor switches.
    pub fn is_multiplexed(&self) -> bool {
        matches!(
            self.multiplex_state,
            MultiplexState::MultiplexedSignal | MultiplexState::SwitchAndSignal
        )
    }

    /// A multiplexed signal is selectable only when every named switch has
    /// already produced a value (in `resolved`) that falls inside at least
    /// one of its declared ranges. Unconditional (empty map) => always true.
    pub fn is_selectable(&self, resolved: &std::collections::HashMap<String, f64>) -> bool {
        if !self.is_multiplexed() {
            return true;
        }
        for (switch, ranges) in &self.multiplex_signals {
            let Some(&value) = resolved.get(switch) else {
                return false;
            };
            let value = value.round() as i64;
            if !ranges.iter().any(|&(min, max)| value >= min && value <= max) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_factor_and_scaling_normalize_to_nan() {
        let mut s = SignalDescription::new("s");
        s.factor = 0.0;
        s.scaling = 0.0;
        s.normalize();
        assert!(s.factor.is_nan());
        assert!(s.scaling.is_nan());
    }

    #[test]
    fn invalid_when_name_empty() {
        let s = SignalDescription::new("");
        assert!(!s.is_valid());
    }

    #[test]
    fn invalid_float_with_wrong_length() {
        let mut s = SignalDescription::new("s");
        s.data_format = DataFormat::Float;
        s.bit_length = 16;
        assert!(!s.is_valid());
    }

    #[test]
    fn selectable_respects_ranges() {
        let mut s = SignalDescription::new("s1");
        s.multiplex_state = MultiplexState::MultiplexedSignal;
        s.multiplex_signals
            .insert("mux".to_string(), vec![(1, 1)]);

        let mut resolved = std::collections::HashMap::new();
        resolved.insert("mux".to_string(), 1.0);
        assert!(s.is_selectable(&resolved));

        resolved.insert("mux".to_string(), 2.0);
        assert!(!s.is_selectable(&resolved));
    }
}
