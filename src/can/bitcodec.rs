//! Bit-granular read/write of integer/float/string values across byte buffers.
//!
//! Two bit-numbering schemes are supported, selected by [`Endian`]:
//!
//! - **Little** (Intel): `startBit` is the LSB of the field; bits run
//!   `startBit .. startBit + bitLength - 1` with increasing significance.
//! - **Big** (Motorola / DBC): `startBit` is the MSB of the field. Within a
//!   byte, consumption runs towards bit 0; once bit 0 is passed, the next
//!   sourced bit is bit 7 of the following byte. Position `p` is followed by
//!   `p - 1` when `p % 8 != 0`, otherwise by `p + 15`.
//!
//! Both schemes number bits as `byte_index * 8 + bit_offset`, `bit_offset`
//! 0 being the LSB of that byte — the same absolute numbering, traversed in
//! opposite directions.

use std::fmt;

/// Numeric/text representation extracted from or inserted into a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Unsigned(u64),
    Signed(i64),
    Float(f32),
    Double(f64),
    Ascii(String),
}

impl RawValue {
    /// Best-effort conversion to `f64` for the linear scaling step; `None`
    /// for `Ascii`, which has no numeric conversion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Unsigned(v) => Some(*v as f64),
            RawValue::Signed(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v as f64),
            RawValue::Double(v) => Some(*v),
            RawValue::Ascii(_) => None,
        }
    }
}

/// Endianness of a bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Interpretation of the raw bits of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum DataFormat {
    #[default]
    UnsignedInteger,
    SignedInteger,
    Float,
    Double,
    AsciiString,
}

/// A bit field position/length/format combination could not be read or
/// written against the given buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitCodecError(pub String);

impl fmt::Display for BitCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BitCodecError {}

/// Checks `bitLength` against the constraints §3 places on `dataFormat`.
fn check_format_length(format: DataFormat, bit_length: u32) -> Result<(), BitCodecError> {
    match format {
        DataFormat::Float if bit_length != 32 => Err(BitCodecError(format!(
            "Float fields must be 32 bits wide, got {bit_length}"
        ))),
        DataFormat::Double if bit_length != 64 => Err(BitCodecError(format!(
            "Double fields must be 64 bits wide, got {bit_length}"
        ))),
        DataFormat::AsciiString if bit_length % 8 != 0 => Err(BitCodecError(format!(
            "AsciiString bit length must be a multiple of 8, got {bit_length}"
        ))),
        _ => Ok(()),
    }
}

/// Absolute bit positions consumed by a field, MSB-first if `msb_first`.
///
/// For [`Endian::Little`] positions simply increase from `start_bit`. For
/// [`Endian::Big`] the DBC recurrence is applied; the first position
/// produced is the field's most significant bit.
fn positions(start_bit: u32, bit_length: u32, endian: Endian) -> Vec<u32> {
    let mut out = Vec::with_capacity(bit_length as usize);
    match endian {
        Endian::Little => {
            for i in 0..bit_length {
                out.push(start_bit + i);
            }
        }
        Endian::Big => {
            let mut p = start_bit;
            for _ in 0..bit_length {
                out.push(p);
                p = if p % 8 != 0 { p - 1 } else { p + 15 };
            }
        }
    }
    out
}

fn get_bit(buffer: &[u8], position: u32) -> Option<u8> {
    let byte_index = (position / 8) as usize;
    let bit_offset = position % 8;
    buffer.get(byte_index).map(|b| (b >> bit_offset) & 1)
}

fn set_bit(buffer: &mut [u8], position: u32, value: u8) -> Option<()> {
    let byte_index = (position / 8) as usize;
    let bit_offset = position % 8;
    let byte = buffer.get_mut(byte_index)?;
    if value & 1 == 1 {
        *byte |= 1 << bit_offset;
    } else {
        *byte &= !(1 << bit_offset);
    }
    Some(())
}

/// Reads the unsigned raw bit pattern of a field as a `u64`.
///
/// For [`Endian::Little`] the first position is the LSB of the result; for
/// [`Endian::Big`] the first position is the MSB.
fn extract_raw_u64(
    buffer: &[u8],
    start_bit: u32,
    bit_length: u32,
    endian: Endian,
) -> Result<u64, BitCodecError> {
    let pos = positions(start_bit, bit_length, endian);
    let mut raw: u64 = 0;
    for (i, &p) in pos.iter().enumerate() {
        let bit = get_bit(buffer, p).ok_or_else(|| {
            BitCodecError(format!(
                "bit position {p} (start={start_bit}, length={bit_length}) exceeds buffer of {} bytes",
                buffer.len()
            ))
        })?;
        let shift = match endian {
            Endian::Little => i as u32,
            Endian::Big => bit_length - 1 - i as u32,
        };
        raw |= (bit as u64) << shift;
    }
    Ok(raw)
}

fn insert_raw_u64(
    buffer: &mut [u8],
    start_bit: u32,
    bit_length: u32,
    endian: Endian,
    raw: u64,
) -> Result<(), BitCodecError> {
    let pos = positions(start_bit, bit_length, endian);
    for (i, &p) in pos.iter().enumerate() {
        let shift = match endian {
            Endian::Little => i as u32,
            Endian::Big => bit_length - 1 - i as u32,
        };
        let bit = ((raw >> shift) & 1) as u8;
        set_bit(buffer, p, bit).ok_or_else(|| {
            BitCodecError(format!(
                "bit position {p} (start={start_bit}, length={bit_length}) exceeds buffer of {} bytes",
                buffer.len()
            ))
        })?;
    }
    Ok(())
}

fn sign_extend(raw: u64, bit_length: u32) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return raw as i64;
    }
    let sign_bit = 1u64 << (bit_length - 1);
    if raw & sign_bit != 0 {
        let mask = (1u64 << bit_length) - 1;
        (raw | !mask) as i64
    } else {
        raw as i64
    }
}

/// Extracts a value from `buffer` at the given bit position per `format`.
pub fn extract(
    buffer: &[u8],
    start_bit: u32,
    bit_length: u32,
    endian: Endian,
    format: DataFormat,
) -> Result<RawValue, BitCodecError> {
    check_format_length(format, bit_length)?;

    if format == DataFormat::AsciiString {
        let n_bytes = (bit_length / 8) as usize;
        let mut bytes = Vec::with_capacity(n_bytes);
        for b in 0..n_bytes {
            let byte_raw = extract_raw_u64(buffer, start_bit + (b as u32) * 8, 8, Endian::Little)?;
            bytes.push(byte_raw as u8);
        }
        return Ok(RawValue::Ascii(bytes.iter().map(|&b| b as char).collect()));
    }

    let raw = extract_raw_u64(buffer, start_bit, bit_length, endian)?;
    Ok(match format {
        DataFormat::UnsignedInteger => RawValue::Unsigned(raw),
        DataFormat::SignedInteger => RawValue::Signed(sign_extend(raw, bit_length)),
        DataFormat::Float => RawValue::Float(f32::from_bits(raw as u32)),
        DataFormat::Double => RawValue::Double(f64::from_bits(raw)),
        DataFormat::AsciiString => unreachable!("handled above"),
    })
}

/// Inserts `value` into `buffer` at the given bit position, clearing the
/// target bits first and preserving bits outside the field.
pub fn insert(
    buffer: &mut [u8],
    start_bit: u32,
    bit_length: u32,
    endian: Endian,
    format: DataFormat,
    value: &RawValue,
) -> Result<(), BitCodecError> {
    check_format_length(format, bit_length)?;

    if let RawValue::Ascii(text) = value {
        let n_bytes = (bit_length / 8) as usize;
        let text_bytes = text.as_bytes();
        for b in 0..n_bytes {
            let byte = *text_bytes.get(b).unwrap_or(&0);
            insert_raw_u64(
                buffer,
                start_bit + (b as u32) * 8,
                8,
                Endian::Little,
                byte as u64,
            )?;
        }
        return Ok(());
    }

    let raw: u64 = match (format, value) {
        (DataFormat::UnsignedInteger, RawValue::Unsigned(v)) => *v,
        (DataFormat::SignedInteger, RawValue::Signed(v)) => {
            let mask = if bit_length >= 64 {
                u64::MAX
            } else {
                (1u64 << bit_length) - 1
            };
            (*v as u64) & mask
        }
        (DataFormat::Float, RawValue::Float(v)) => v.to_bits() as u64,
        (DataFormat::Double, RawValue::Double(v)) => v.to_bits(),
        _ => {
            return Err(BitCodecError(format!(
                "value {value:?} does not match format {format:?}"
            )));
        }
    };

    insert_raw_u64(buffer, start_bit, bit_length, endian, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_signal_across_byte_boundary() {
        // payload [0xE5,0xEC,0xF4,0x12], start=4, len=12, LE, unsigned -> 0xECE
        let payload = [0xE5u8, 0xEC, 0xF4, 0x12];
        let v = extract(&payload, 4, 12, Endian::Little, DataFormat::UnsignedInteger).unwrap();
        assert_eq!(v, RawValue::Unsigned(0xECE));
    }

    #[test]
    fn big_endian_signal_dbc_form() {
        // Scenario 2: payload [0x12,0x34,0x56,0x78], start=7, len=12, BE, unsigned -> 0x123
        let payload = [0x12u8, 0x34, 0x56, 0x78];
        let v = extract(&payload, 7, 12, Endian::Big, DataFormat::UnsignedInteger).unwrap();
        assert_eq!(v, RawValue::Unsigned(0x123));
    }

    #[test]
    fn extract_insert_round_trip_little_endian() {
        let mut buf = [0u8; 4];
        insert(
            &mut buf,
            4,
            12,
            Endian::Little,
            DataFormat::UnsignedInteger,
            &RawValue::Unsigned(0xCEE),
        )
        .unwrap();
        let v = extract(&buf, 4, 12, Endian::Little, DataFormat::UnsignedInteger).unwrap();
        assert_eq!(v, RawValue::Unsigned(0xCEE));
    }

    #[test]
    fn extract_insert_round_trip_big_endian() {
        let mut buf = [0u8; 4];
        insert(
            &mut buf,
            7,
            12,
            Endian::Big,
            DataFormat::UnsignedInteger,
            &RawValue::Unsigned(0x123),
        )
        .unwrap();
        let v = extract(&buf, 7, 12, Endian::Big, DataFormat::UnsignedInteger).unwrap();
        assert_eq!(v, RawValue::Unsigned(0x123));
    }

    #[test]
    fn insert_preserves_surrounding_bits() {
        let mut buf = [0xFFu8; 2];
        insert(
            &mut buf,
            4,
            4,
            Endian::Little,
            DataFormat::UnsignedInteger,
            &RawValue::Unsigned(0),
        )
        .unwrap();
        assert_eq!(buf, [0x0F, 0xFF]);
    }

    #[test]
    fn signed_sign_extension() {
        let mut buf = [0u8; 1];
        insert(
            &mut buf,
            0,
            4,
            Endian::Little,
            DataFormat::SignedInteger,
            &RawValue::Signed(-1),
        )
        .unwrap();
        let v = extract(&buf, 0, 4, Endian::Little, DataFormat::SignedInteger).unwrap();
        assert_eq!(v, RawValue::Signed(-1));
    }

    #[test]
    fn float_round_trip() {
        let mut buf = [0u8; 4];
        insert(
            &mut buf,
            0,
            32,
            Endian::Little,
            DataFormat::Float,
            &RawValue::Float(3.5),
        )
        .unwrap();
        let v = extract(&buf, 0, 32, Endian::Little, DataFormat::Float).unwrap();
        assert_eq!(v, RawValue::Float(3.5));
    }

    #[test]
    fn ascii_string_round_trip() {
        let mut buf = [0u8; 4];
        insert(
            &mut buf,
            0,
            32,
            Endian::Little,
            DataFormat::AsciiString,
            &RawValue::Ascii("ABCD".to_string()),
        )
        .unwrap();
        let v = extract(&buf, 0, 32, Endian::Little, DataFormat::AsciiString).unwrap();
        assert_eq!(v, RawValue::Ascii("ABCD".to_string()));
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let buf = [0u8; 1];
        assert!(extract(&buf, 4, 8, Endian::Little, DataFormat::UnsignedInteger).is_err());
    }
}
