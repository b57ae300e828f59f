//! Decodes/encodes a CAN frame into/from a map of named signal values,
//! using [`UniqueIdDescription`] and [`MessageDescription`]s.
//!
//! The decode/encode algorithms and the multiplexor fixed-point resolution
//! follow spec.md §4.2 exactly; bit access goes through
//! [`crate::can::bitcodec`].

use std::collections::HashMap;

use crate::can::bitcodec::{self, DataFormat, RawValue};
use crate::can::frame::{CanFrame, FrameType};
use crate::can::message::MessageDescription;
use crate::can::signal::{DataSource, SignalDescription};
use crate::can::unique_id::UniqueIdDescription;
use crate::error::CanError;

/// Result of decoding one frame: its unique ID plus the physical values of
/// every signal whose multiplexor conditions were satisfied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedFrame {
    pub unique_id: u32,
    pub signals: HashMap<String, f64>,
}

/// Decodes/encodes CAN frames against a set of [`MessageDescription`]s.
#[derive(Debug, Clone, Default)]
pub struct FrameProcessor {
    uid_description: UniqueIdDescription,
    messages: HashMap<u32, MessageDescription>,
    /// Non-fatal issues from the most recent `parse`/`build` call.
    pub warnings: Vec<String>,
}

impl FrameProcessor {
    pub fn new(uid_description: UniqueIdDescription) -> Self {
        FrameProcessor {
            uid_description,
            messages: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn uid_description(&self) -> &UniqueIdDescription {
        &self.uid_description
    }

    /// Registers a message description, keyed by `unique_id`. Descriptions
    /// are value-copied in, matching spec §5 ("value-copied into engines at
    /// configuration time").
    pub fn add_message(&mut self, message: MessageDescription) {
        self.messages.insert(message.unique_id, message);
    }

    pub fn message(&self, unique_id: u32) -> Option<&MessageDescription> {
        self.messages.get(&unique_id)
    }

    fn uid_bit_source_len(&self) -> u32 {
        self.uid_description.bit_length as u32
    }

    fn extract_uid(&self, buffer: &[u8]) -> Result<u32, CanError> {
        let raw = bitcodec::extract(
            buffer,
            self.uid_description.start_bit as u32,
            self.uid_bit_source_len(),
            self.uid_description.endian,
            DataFormat::UnsignedInteger,
        )
        .map_err(|e| CanError::Decoding {
            reason: format!("unique id field: {e}"),
        })?;
        match raw {
            RawValue::Unsigned(v) => Ok(v as u32),
            _ => unreachable!(),
        }
    }

    fn insert_uid(&self, id_buffer: &mut [u8], unique_id: u32) -> Result<(), CanError> {
        bitcodec::insert(
            id_buffer,
            self.uid_description.start_bit as u32,
            self.uid_bit_source_len(),
            self.uid_description.endian,
            DataFormat::UnsignedInteger,
            &RawValue::Unsigned(unique_id as u64),
        )
        .map_err(|e| CanError::Encoding {
            reason: format!("unique id field: {e}"),
        })
    }

    /// Decodes `frame` into `{uniqueId, signalMap}` per spec §4.2.
    pub fn parse(&mut self, frame: &CanFrame) -> Result<DecodedFrame, CanError> {
        self.warnings.clear();

        if frame.frame_type != FrameType::Data {
            return Err(CanError::UnsupportedFrameFormat {
                reason: format!("frame type is {:?}, expected Data", frame.frame_type),
            });
        }
        if !self.uid_description.is_valid() {
            return Err(CanError::Decoding {
                reason: "no valid UniqueIdDescription configured".to_string(),
            });
        }

        let unique_id = match self.uid_description.source {
            DataSource::FrameId => self.extract_uid(&frame.frame_id().to_le_bytes())?,
            DataSource::Payload => self.extract_uid(&frame.payload)?,
        };

        let message = self.messages.get(&unique_id).ok_or_else(|| CanError::Decoding {
            reason: format!("no message description for unique id {unique_id}"),
        })?;

        if frame.payload.len() != message.size as usize {
            return Err(CanError::Decoding {
                reason: format!(
                    "payload length {} does not match message size {}",
                    frame.payload.len(),
                    message.size
                ),
            });
        }

        let mut results: HashMap<String, f64> = HashMap::new();
        let mut pending: Vec<&SignalDescription> = message.signals.values().collect();

        loop {
            let mut progressed = false;
            let mut still_pending = Vec::with_capacity(pending.len());

            for signal in pending {
                if !signal.is_selectable(&results) {
                    still_pending.push(signal);
                    continue;
                }

                match self.decode_signal(frame, signal) {
                    Ok(Some(value)) => {
                        results.insert(signal.name.clone(), value);
                        progressed = true;
                    }
                    Ok(None) => {
                        // Unreachable bits: skip with a warning (spec §4.2 step 8).
                        self.warnings.push(format!(
                            "signal '{}' bit field exceeds payload bounds, skipped",
                            signal.name
                        ));
                        progressed = true;
                    }
                    Err(e) => {
                        self.warnings
                            .push(format!("signal '{}': {e}", signal.name));
                        progressed = true;
                    }
                }
            }

            pending = still_pending;
            if pending.is_empty() || !progressed {
                break;
            }
        }
        // Remaining `pending` entries never became selectable: silently
        // omitted, per spec §4.2 step 7 / §9(b).

        Ok(DecodedFrame {
            unique_id,
            signals: results,
        })
    }

    fn decode_signal(
        &self,
        frame: &CanFrame,
        signal: &SignalDescription,
    ) -> Result<Option<f64>, CanError> {
        let id_bytes;
        let source: &[u8] = match signal.data_source {
            DataSource::FrameId => {
                id_bytes = frame.frame_id().to_le_bytes();
                &id_bytes
            }
            DataSource::Payload => &frame.payload,
        };

        let raw = match bitcodec::extract(
            source,
            signal.start_bit as u32,
            signal.bit_length as u32,
            signal.data_endian,
            signal.data_format,
        ) {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };

        Ok(Some(apply_conversion(signal, &raw)))
    }

    /// Encodes `(uniqueId, signalMap)` into a `CanFrame` per spec §4.2.
    pub fn build(
        &mut self,
        unique_id: u32,
        values: &HashMap<String, f64>,
    ) -> Result<CanFrame, CanError> {
        self.warnings.clear();

        if !self.uid_description.is_valid() {
            return Err(CanError::Encoding {
                reason: "no valid UniqueIdDescription configured".to_string(),
            });
        }

        let message = self
            .messages
            .get(&unique_id)
            .ok_or_else(|| CanError::Encoding {
                reason: format!("no message description for unique id {unique_id}"),
            })?
            .clone();

        let mut payload = vec![0u8; message.size as usize];
        let mut id_bytes = [0u8; 4];

        match self.uid_description.source {
            DataSource::Payload => self.insert_uid(&mut payload, unique_id)?,
            DataSource::FrameId => self.insert_uid(&mut id_bytes, unique_id)?,
        }

        for (name, &value) in values {
            let Some(signal) = message.signals.get(name) else {
                self.warnings
                    .push(format!("signal '{name}' is not part of message, skipped"));
                continue;
            };

            if !signal.is_selectable(values) {
                self.warnings.push(format!(
                    "signal '{name}' multiplexor conditions not satisfied, skipped"
                ));
                continue;
            }

            let raw = inverse_conversion(signal, value);
            let target: &mut [u8] = match signal.data_source {
                DataSource::FrameId => &mut id_bytes,
                DataSource::Payload => &mut payload,
            };
            if let Err(e) = bitcodec::insert(
                target,
                signal.start_bit as u32,
                signal.bit_length as u32,
                signal.data_endian,
                signal.data_format,
                &raw,
            ) {
                self.warnings
                    .push(format!("signal '{name}' could not be encoded: {e}"));
            }
        }

        let frame_id = u32::from_le_bytes(id_bytes) & 0x1FFF_FFFF;
        let extended = frame_id > 0x7FF;
        Ok(CanFrame::new(frame_id, extended, payload))
    }
}

/// `physical = scaling * (raw * factor + offset)`, each NaN parameter
/// omitted from its step (spec §4.2).
fn apply_conversion(signal: &SignalDescription, raw: &RawValue) -> f64 {
    let Some(mut value) = raw.as_f64() else {
        // Ascii has no numeric conversion; report 0.0 as a stand-in and let
        // callers treat non-numeric formats specially if needed.
        return 0.0;
    };
    if !signal.factor.is_nan() {
        value *= signal.factor;
    }
    if !signal.offset.is_nan() {
        value += signal.offset;
    }
    if !signal.scaling.is_nan() {
        value *= signal.scaling;
    }
    value
}

/// Inverse of [`apply_conversion`]. Divisions by `factor`/`scaling` are safe
/// because `0.0` is normalized to `NaN` at signal-description time.
fn inverse_conversion(signal: &SignalDescription, physical: f64) -> RawValue {
    let mut value = physical;
    if !signal.scaling.is_nan() {
        value /= signal.scaling;
    }
    if !signal.offset.is_nan() {
        value -= signal.offset;
    }
    if !signal.factor.is_nan() {
        value /= signal.factor;
    }

    match signal.data_format {
        DataFormat::UnsignedInteger => RawValue::Unsigned(value.round().max(0.0) as u64),
        DataFormat::SignedInteger => RawValue::Signed(value.round() as i64),
        DataFormat::Float => RawValue::Float(value as f32),
        DataFormat::Double => RawValue::Double(value),
        DataFormat::AsciiString => RawValue::Ascii(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::message::MessageDescription;
    use crate::can::signal::MultiplexState;

    fn make_uid_processor() -> FrameProcessor {
        FrameProcessor::new(UniqueIdDescription::dbc())
    }

    #[test]
    fn decode_simple_message() {
        let mut proc = make_uid_processor();
        let mut msg = MessageDescription::new(1234, "Test", 2);
        let mut s0 = SignalDescription::new("s0");
        s0.start_bit = 0;
        s0.bit_length = 8;
        s0.factor = 1.0;
        s0.offset = 0.0;
        msg.signals.insert("s0".to_string(), s0);
        proc.add_message(msg);

        let frame = CanFrame::new(1234, true, vec![5, 0]);
        let decoded = proc.parse(&frame).unwrap();
        assert_eq!(decoded.unique_id, 1234);
        assert_eq!(decoded.signals["s0"], 5.0);
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut proc = make_uid_processor();
        let mut msg = MessageDescription::new(42, "M", 4);
        let mut s0 = SignalDescription::new("s0");
        s0.start_bit = 0;
        s0.bit_length = 16;
        msg.signals.insert("s0".to_string(), s0);
        proc.add_message(msg);

        let mut values = HashMap::new();
        values.insert("s0".to_string(), 1000.0);

        let frame = proc.build(42, &values).unwrap();
        let decoded = proc.parse(&frame).unwrap();
        assert_eq!(decoded.unique_id, 42);
        assert_eq!(decoded.signals["s0"], 1000.0);
    }

    #[test]
    fn multiplexed_decode_scenario() {
        // Scenario 3: message size 3; s0 mux switch bits0..1; s1 when s0=1
        // bits2..7; s2 when s0=2 bits2..7.
        let mut proc = make_uid_processor();
        let mut msg = MessageDescription::new(1, "Mux", 3);

        let mut s0 = SignalDescription::new("s0");
        s0.start_bit = 0;
        s0.bit_length = 2;
        s0.multiplex_state = MultiplexState::MultiplexorSwitch;
        msg.signals.insert("s0".to_string(), s0);

        let mut s1 = SignalDescription::new("s1");
        s1.start_bit = 2;
        s1.bit_length = 6;
        s1.multiplex_state = MultiplexState::MultiplexedSignal;
        s1.multiplex_signals
            .insert("s0".to_string(), vec![(1, 1)]);
        msg.signals.insert("s1".to_string(), s1);

        let mut s2 = SignalDescription::new("s2");
        s2.start_bit = 2;
        s2.bit_length = 6;
        s2.multiplex_state = MultiplexState::MultiplexedSignal;
        s2.multiplex_signals
            .insert("s0".to_string(), vec![(2, 2)]);
        msg.signals.insert("s2".to_string(), s2);

        proc.add_message(msg);

        let decoded = proc.parse(&CanFrame::new(1, true, vec![0x29, 0x00, 0x00])).unwrap();
        assert_eq!(decoded.signals.get("s0"), Some(&1.0));
        assert_eq!(decoded.signals.get("s1"), Some(&10.0));
        assert_eq!(decoded.signals.get("s2"), None);

        let decoded = proc.parse(&CanFrame::new(1, true, vec![0x2E, 0x00, 0x00])).unwrap();
        assert_eq!(decoded.signals.get("s0"), Some(&2.0));
        assert_eq!(decoded.signals.get("s2"), Some(&11.0));
        assert_eq!(decoded.signals.get("s1"), None);
    }

    #[test]
    fn non_data_frame_rejected() {
        let mut proc = make_uid_processor();
        let mut f = CanFrame::new(1, true, vec![]);
        f.frame_type = FrameType::RemoteRequest;
        assert!(matches!(
            proc.parse(&f),
            Err(CanError::UnsupportedFrameFormat { .. })
        ));
    }

    #[test]
    fn unknown_message_is_decoding_error() {
        let mut proc = make_uid_processor();
        let f = CanFrame::new(999, true, vec![0u8; 8]);
        assert!(matches!(proc.parse(&f), Err(CanError::Decoding { .. })));
    }
}
