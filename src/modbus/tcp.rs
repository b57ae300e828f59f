//! Modbus TCP ADU framing: a 7-byte MBAP header followed by the PDU.
//!
//! Grounded on the MBAP layout in
//! `other_examples/71c7ce23_slowtec-modbus-core__src-codec-tcp-mod.rs.rs`
//! (`transaction_id`, `protocol_id` fixed at 0, `length`, `unit_id`).

use crate::error::ModbusError;

const MBAP_HEADER_LEN: usize = 7;
const PROTOCOL_ID: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub unit_id: u8,
}

pub struct TcpFramer;

impl TcpFramer {
    /// Wraps `pdu` with an MBAP header; `length` covers `unit_id` + `pdu`.
    pub fn encode(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + pdu.len());
        frame.extend_from_slice(&transaction_id.to_be_bytes());
        frame.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
        frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
        frame.push(unit_id);
        frame.extend_from_slice(pdu);
        frame
    }

    /// Parses the MBAP header and returns `(header, pdu)`, validating that
    /// `length` matches the bytes actually present.
    pub fn decode(frame: &[u8]) -> Result<(MbapHeader, &[u8]), ModbusError> {
        if frame.len() < MBAP_HEADER_LEN {
            return Err(ModbusError::ReadError("frame shorter than MBAP header".to_string()));
        }
        let transaction_id = u16::from_be_bytes([frame[0], frame[1]]);
        let protocol_id = u16::from_be_bytes([frame[2], frame[3]]);
        if protocol_id != PROTOCOL_ID {
            return Err(ModbusError::ReadError(format!(
                "unexpected protocol id {protocol_id:#06x}"
            )));
        }
        let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
        let unit_id = frame[6];
        let pdu = &frame[MBAP_HEADER_LEN..];
        if length != pdu.len() + 1 {
            return Err(ModbusError::ReadError(format!(
                "MBAP length {length} does not match {} PDU bytes",
                pdu.len()
            )));
        }
        Ok((
            MbapHeader {
                transaction_id,
                unit_id,
            },
            pdu,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let pdu = [0x03, 0x00, 0x10, 0x00, 0x04];
        let frame = TcpFramer::encode(7, 1, &pdu);
        let (header, decoded_pdu) = TcpFramer::decode(&frame).unwrap();
        assert_eq!(header.transaction_id, 7);
        assert_eq!(header.unit_id, 1);
        assert_eq!(decoded_pdu, pdu);
    }

    #[test]
    fn mismatched_length_is_rejected() {
        let mut frame = TcpFramer::encode(1, 1, &[0x03, 0x00, 0x10, 0x00, 0x04]);
        frame[5] = 0xFF;
        assert!(TcpFramer::decode(&frame).is_err());
    }
}
