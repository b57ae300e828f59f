//! In-memory register banks a [`crate::modbus::server::ServerEngine`]
//! dispatches requests against (spec §4.6).

use serde::{Deserialize, Serialize};

use crate::error::ModbusError;
use crate::modbus::pdu::ExceptionCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterType {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

/// Maximum FIFO queue depth a `ReadFifoQueue` response can report (spec §4.4).
pub const MAX_FIFO_COUNT: usize = 31;

/// Four independently-sized register banks, addressed `0..len` each, plus a
/// single FIFO queue bank for function code 0x18.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModbusDataMap {
    pub coils: Vec<bool>,
    pub discrete_inputs: Vec<bool>,
    pub holding_registers: Vec<u16>,
    pub input_registers: Vec<u16>,
    pub fifo_queue: Vec<u16>,
}

impl ModbusDataMap {
    pub fn new(coils: usize, discrete_inputs: usize, holding_registers: usize, input_registers: usize) -> Self {
        ModbusDataMap {
            coils: vec![false; coils],
            discrete_inputs: vec![false; discrete_inputs],
            holding_registers: vec![0; holding_registers],
            input_registers: vec![0; input_registers],
            fifo_queue: Vec::new(),
        }
    }

    /// Returns the current FIFO snapshot, capped at [`MAX_FIFO_COUNT`]
    /// registers regardless of how many are queued internally.
    pub fn read_fifo_queue(&self) -> Vec<u16> {
        self.fifo_queue
            .iter()
            .take(MAX_FIFO_COUNT)
            .copied()
            .collect()
    }

    fn illegal_address() -> ModbusError {
        ModbusError::ProtocolError(ExceptionCode::IllegalDataAddress)
    }

    pub fn read_bits(&self, register: RegisterType, address: u16, quantity: u16) -> Result<Vec<bool>, ModbusError> {
        let bank = match register {
            RegisterType::Coils => &self.coils,
            RegisterType::DiscreteInputs => &self.discrete_inputs,
            _ => return Err(ModbusError::ProtocolError(ExceptionCode::IllegalFunction)),
        };
        let start = address as usize;
        let end = start + quantity as usize;
        bank.get(start..end).map(<[bool]>::to_vec).ok_or_else(Self::illegal_address)
    }

    pub fn read_registers(&self, register: RegisterType, address: u16, quantity: u16) -> Result<Vec<u16>, ModbusError> {
        let bank = match register {
            RegisterType::HoldingRegisters => &self.holding_registers,
            RegisterType::InputRegisters => &self.input_registers,
            _ => return Err(ModbusError::ProtocolError(ExceptionCode::IllegalFunction)),
        };
        let start = address as usize;
        let end = start + quantity as usize;
        bank.get(start..end).map(<[u16]>::to_vec).ok_or_else(Self::illegal_address)
    }

    /// Writes `values` starting at `address`; returns whether any stored bit
    /// actually changed, so callers can suppress "data written" notifications
    /// for no-op writes (spec §4.8).
    pub fn write_bits(&mut self, register: RegisterType, address: u16, values: &[bool]) -> Result<bool, ModbusError> {
        let bank = match register {
            RegisterType::Coils => &mut self.coils,
            _ => return Err(ModbusError::ProtocolError(ExceptionCode::IllegalFunction)),
        };
        let start = address as usize;
        let end = start + values.len();
        let slice = bank.get_mut(start..end).ok_or_else(Self::illegal_address)?;
        let changed = slice != values;
        slice.copy_from_slice(values);
        Ok(changed)
    }

    pub fn write_registers(&mut self, register: RegisterType, address: u16, values: &[u16]) -> Result<bool, ModbusError> {
        let bank = match register {
            RegisterType::HoldingRegisters => &mut self.holding_registers,
            _ => return Err(ModbusError::ProtocolError(ExceptionCode::IllegalFunction)),
        };
        let start = address as usize;
        let end = start + values.len();
        let slice = bank.get_mut(start..end).ok_or_else(Self::illegal_address)?;
        let changed = slice != values;
        slice.copy_from_slice(values);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_out_of_bounds_is_illegal_address() {
        let map = ModbusDataMap::new(0, 0, 4, 0);
        let err = map.read_registers(RegisterType::HoldingRegisters, 2, 4).unwrap_err();
        assert_eq!(err, ModbusError::ProtocolError(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn write_reports_whether_value_changed() {
        let mut map = ModbusDataMap::new(0, 0, 4, 0);
        assert!(map
            .write_registers(RegisterType::HoldingRegisters, 0, &[42])
            .unwrap());
        assert!(!map
            .write_registers(RegisterType::HoldingRegisters, 0, &[42])
            .unwrap());
    }

    #[test]
    fn read_write_coils_round_trip() {
        let mut map = ModbusDataMap::new(8, 0, 0, 0);
        map.write_bits(RegisterType::Coils, 2, &[true, true, false]).unwrap();
        let read = map.read_bits(RegisterType::Coils, 0, 8).unwrap();
        assert_eq!(read, vec![false, false, true, true, false, false, false, false]);
    }
}
