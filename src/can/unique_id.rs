//! Where in a frame the message identifier lives.

use serde::{Deserialize, Serialize};

use crate::can::signal::DataSource;
use crate::can::bitcodec::Endian;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniqueIdDescription {
    pub source: DataSource,
    pub start_bit: u16,
    pub bit_length: u8,
    pub endian: Endian,
}

impl UniqueIdDescription {
    pub fn new(source: DataSource, start_bit: u16, bit_length: u8, endian: Endian) -> Self {
        UniqueIdDescription {
            source,
            start_bit,
            bit_length,
            endian,
        }
    }

    /// Valid when `0 < bitLength <= 32`, per spec §3.
    pub fn is_valid(&self) -> bool {
        self.bit_length > 0 && self.bit_length <= 32
    }

    /// The fixed `UniqueIdDescription` for DBC-described messages (spec §4.3):
    /// `source=FrameId, little-endian, startBit=0, bitLength=29`.
    pub fn dbc() -> Self {
        UniqueIdDescription {
            source: DataSource::FrameId,
            start_bit: 0,
            bit_length: 29,
            endian: Endian::Little,
        }
    }
}

impl Default for UniqueIdDescription {
    fn default() -> Self {
        UniqueIdDescription::dbc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbc_default_is_valid() {
        assert!(UniqueIdDescription::dbc().is_valid());
    }

    #[test]
    fn zero_length_is_invalid() {
        let u = UniqueIdDescription::new(DataSource::FrameId, 0, 0, Endian::Little);
        assert!(!u.is_valid());
    }

    #[test]
    fn over_32_bits_is_invalid() {
        let u = UniqueIdDescription::new(DataSource::FrameId, 0, 33, Endian::Little);
        assert!(!u.is_valid());
    }
}
