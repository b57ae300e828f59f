//! Modbus application-layer PDU encode/decode (spec §4.4), independent of
//! whichever ADU framing (`rtu`/`tcp`) carries the bytes.
//!
//! Grounded in shape on `other_examples/71c7ce23_slowtec-modbus-core__src-codec-tcp-mod.rs.rs`'s
//! `Request`/`Response` split, adapted to the function-code set and exception
//! table this crate's spec calls for (the original source's Qt client,
//! `qmodbusclient.cpp`, enumerates the same function/exception codes).

use serde::{Deserialize, Serialize};

use crate::error::ModbusError;

/// Exception codes 1-11 of the Modbus application protocol (codes 9 and 12-255
/// are reserved and never returned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionCode {
    IllegalFunction = 1,
    IllegalDataAddress = 2,
    IllegalDataValue = 3,
    ServerDeviceFailure = 4,
    Acknowledge = 5,
    ServerDeviceBusy = 6,
    NegativeAcknowledge = 7,
    MemoryParityError = 8,
    GatewayPathUnavailable = 10,
    GatewayTargetDeviceFailedToRespond = 11,
}

impl TryFrom<u8> for ExceptionCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => ExceptionCode::IllegalFunction,
            2 => ExceptionCode::IllegalDataAddress,
            3 => ExceptionCode::IllegalDataValue,
            4 => ExceptionCode::ServerDeviceFailure,
            5 => ExceptionCode::Acknowledge,
            6 => ExceptionCode::ServerDeviceBusy,
            7 => ExceptionCode::NegativeAcknowledge,
            8 => ExceptionCode::MemoryParityError,
            10 => ExceptionCode::GatewayPathUnavailable,
            11 => ExceptionCode::GatewayTargetDeviceFailedToRespond,
            _ => return Err(()),
        })
    }
}

const FC_READ_COILS: u8 = 0x01;
const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
const FC_READ_INPUT_REGISTERS: u8 = 0x04;
const FC_WRITE_SINGLE_COIL: u8 = 0x05;
const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
const FC_DIAGNOSTICS: u8 = 0x08;
const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
const FC_REPORT_SERVER_ID: u8 = 0x11;
const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
const FC_READ_FIFO_QUEUE: u8 = 0x18;
const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    ReadCoils { address: u16, quantity: u16 },
    ReadDiscreteInputs { address: u16, quantity: u16 },
    ReadHoldingRegisters { address: u16, quantity: u16 },
    ReadInputRegisters { address: u16, quantity: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleCoils { address: u16, values: Vec<bool> },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
    Diagnostics { sub_function: u16, data: u16 },
    ReadWriteMultipleRegisters {
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        write_values: Vec<u16>,
    },
    ReadFifoQueue { fifo_pointer_address: u16 },
    ReportServerId,
}

impl Request {
    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadCoils { .. } => FC_READ_COILS,
            Request::ReadDiscreteInputs { .. } => FC_READ_DISCRETE_INPUTS,
            Request::ReadHoldingRegisters { .. } => FC_READ_HOLDING_REGISTERS,
            Request::ReadInputRegisters { .. } => FC_READ_INPUT_REGISTERS,
            Request::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Request::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Request::WriteMultipleCoils { .. } => FC_WRITE_MULTIPLE_COILS,
            Request::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Request::Diagnostics { .. } => FC_DIAGNOSTICS,
            Request::ReadWriteMultipleRegisters { .. } => FC_READ_WRITE_MULTIPLE_REGISTERS,
            Request::ReadFifoQueue { .. } => FC_READ_FIFO_QUEUE,
            Request::ReportServerId => FC_REPORT_SERVER_ID,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.function_code()];
        match self {
            Request::ReadCoils { address, quantity }
            | Request::ReadDiscreteInputs { address, quantity }
            | Request::ReadHoldingRegisters { address, quantity }
            | Request::ReadInputRegisters { address, quantity } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&quantity.to_be_bytes());
            }
            Request::WriteSingleCoil { address, value } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&if *value { 0xFF00u16 } else { 0x0000u16 }.to_be_bytes());
            }
            Request::WriteSingleRegister { address, value } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&value.to_be_bytes());
            }
            Request::WriteMultipleCoils { address, values } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&(values.len() as u16).to_be_bytes());
                let packed = pack_bits(values);
                out.push(packed.len() as u8);
                out.extend_from_slice(&packed);
            }
            Request::WriteMultipleRegisters { address, values } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&(values.len() as u16).to_be_bytes());
                out.push((values.len() * 2) as u8);
                for v in values {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Request::Diagnostics { sub_function, data } => {
                out.extend_from_slice(&sub_function.to_be_bytes());
                out.extend_from_slice(&data.to_be_bytes());
            }
            Request::ReadWriteMultipleRegisters {
                read_address,
                read_quantity,
                write_address,
                write_values,
            } => {
                out.extend_from_slice(&read_address.to_be_bytes());
                out.extend_from_slice(&read_quantity.to_be_bytes());
                out.extend_from_slice(&write_address.to_be_bytes());
                out.extend_from_slice(&(write_values.len() as u16).to_be_bytes());
                out.push((write_values.len() * 2) as u8);
                for v in write_values {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Request::ReadFifoQueue { fifo_pointer_address } => {
                out.extend_from_slice(&fifo_pointer_address.to_be_bytes());
            }
            Request::ReportServerId => {}
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Request, ModbusError> {
        let (&function, rest) = bytes
            .split_first()
            .ok_or_else(|| ModbusError::ReadError("empty PDU".to_string()))?;
        let need = |n: usize| -> Result<(), ModbusError> {
            if rest.len() < n {
                Err(ModbusError::ReadError(format!(
                    "PDU too short for function {function:#04x}"
                )))
            } else {
                Ok(())
            }
        };
        Ok(match function {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_READ_HOLDING_REGISTERS
            | FC_READ_INPUT_REGISTERS => {
                need(4)?;
                let address = u16::from_be_bytes([rest[0], rest[1]]);
                let quantity = u16::from_be_bytes([rest[2], rest[3]]);
                match function {
                    FC_READ_COILS => Request::ReadCoils { address, quantity },
                    FC_READ_DISCRETE_INPUTS => Request::ReadDiscreteInputs { address, quantity },
                    FC_READ_HOLDING_REGISTERS => Request::ReadHoldingRegisters { address, quantity },
                    _ => Request::ReadInputRegisters { address, quantity },
                }
            }
            FC_WRITE_SINGLE_COIL => {
                need(4)?;
                let address = u16::from_be_bytes([rest[0], rest[1]]);
                let raw = u16::from_be_bytes([rest[2], rest[3]]);
                Request::WriteSingleCoil {
                    address,
                    value: raw == 0xFF00,
                }
            }
            FC_WRITE_SINGLE_REGISTER => {
                need(4)?;
                let address = u16::from_be_bytes([rest[0], rest[1]]);
                let value = u16::from_be_bytes([rest[2], rest[3]]);
                Request::WriteSingleRegister { address, value }
            }
            FC_WRITE_MULTIPLE_COILS => {
                need(5)?;
                let address = u16::from_be_bytes([rest[0], rest[1]]);
                let quantity = u16::from_be_bytes([rest[2], rest[3]]) as usize;
                let byte_count = rest[4] as usize;
                need(5 + byte_count)?;
                let values = unpack_bits(&rest[5..5 + byte_count], quantity);
                Request::WriteMultipleCoils { address, values }
            }
            FC_WRITE_MULTIPLE_REGISTERS => {
                need(5)?;
                let address = u16::from_be_bytes([rest[0], rest[1]]);
                let quantity = u16::from_be_bytes([rest[2], rest[3]]) as usize;
                let byte_count = rest[4] as usize;
                need(5 + byte_count)?;
                let values = rest[5..5 + byte_count]
                    .chunks_exact(2)
                    .take(quantity)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Request::WriteMultipleRegisters { address, values }
            }
            FC_DIAGNOSTICS => {
                need(4)?;
                let sub_function = u16::from_be_bytes([rest[0], rest[1]]);
                let data = u16::from_be_bytes([rest[2], rest[3]]);
                Request::Diagnostics { sub_function, data }
            }
            FC_READ_WRITE_MULTIPLE_REGISTERS => {
                need(9)?;
                let read_address = u16::from_be_bytes([rest[0], rest[1]]);
                let read_quantity = u16::from_be_bytes([rest[2], rest[3]]);
                let write_address = u16::from_be_bytes([rest[4], rest[5]]);
                let write_quantity = u16::from_be_bytes([rest[6], rest[7]]) as usize;
                let byte_count = rest[8] as usize;
                need(9 + byte_count)?;
                let write_values = rest[9..9 + byte_count]
                    .chunks_exact(2)
                    .take(write_quantity)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Request::ReadWriteMultipleRegisters {
                    read_address,
                    read_quantity,
                    write_address,
                    write_values,
                }
            }
            FC_READ_FIFO_QUEUE => {
                need(2)?;
                let fifo_pointer_address = u16::from_be_bytes([rest[0], rest[1]]);
                Request::ReadFifoQueue { fifo_pointer_address }
            }
            FC_REPORT_SERVER_ID => Request::ReportServerId,
            other => {
                return Err(ModbusError::ReadError(format!(
                    "unsupported function code {other:#04x}"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    ReadCoils(Vec<bool>),
    ReadDiscreteInputs(Vec<bool>),
    ReadHoldingRegisters(Vec<u16>),
    ReadInputRegisters(Vec<u16>),
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleCoils { address: u16, quantity: u16 },
    WriteMultipleRegisters { address: u16, quantity: u16 },
    Diagnostics { sub_function: u16, data: u16 },
    ReadWriteMultipleRegisters(Vec<u16>),
    ReadFifoQueue(Vec<u16>),
    ReportServerId { server_id: Vec<u8>, run_indicator_status: bool },
    Exception { function: u8, code: ExceptionCode },
}

impl Response {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::ReadCoils(bits) | Response::ReadDiscreteInputs(bits) => {
                let function = if matches!(self, Response::ReadCoils(_)) {
                    FC_READ_COILS
                } else {
                    FC_READ_DISCRETE_INPUTS
                };
                let packed = pack_bits(bits);
                let mut out = vec![function, packed.len() as u8];
                out.extend_from_slice(&packed);
                out
            }
            Response::ReadHoldingRegisters(regs) | Response::ReadInputRegisters(regs) => {
                let function = if matches!(self, Response::ReadHoldingRegisters(_)) {
                    FC_READ_HOLDING_REGISTERS
                } else {
                    FC_READ_INPUT_REGISTERS
                };
                let mut out = vec![function, (regs.len() * 2) as u8];
                for r in regs {
                    out.extend_from_slice(&r.to_be_bytes());
                }
                out
            }
            Response::WriteSingleCoil { address, value } => {
                let mut out = vec![FC_WRITE_SINGLE_COIL];
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&if *value { 0xFF00u16 } else { 0 }.to_be_bytes());
                out
            }
            Response::WriteSingleRegister { address, value } => {
                let mut out = vec![FC_WRITE_SINGLE_REGISTER];
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&value.to_be_bytes());
                out
            }
            Response::WriteMultipleCoils { address, quantity } => {
                let mut out = vec![FC_WRITE_MULTIPLE_COILS];
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&quantity.to_be_bytes());
                out
            }
            Response::WriteMultipleRegisters { address, quantity } => {
                let mut out = vec![FC_WRITE_MULTIPLE_REGISTERS];
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&quantity.to_be_bytes());
                out
            }
            Response::Diagnostics { sub_function, data } => {
                let mut out = vec![FC_DIAGNOSTICS];
                out.extend_from_slice(&sub_function.to_be_bytes());
                out.extend_from_slice(&data.to_be_bytes());
                out
            }
            Response::ReadWriteMultipleRegisters(regs) => {
                let mut out = vec![FC_READ_WRITE_MULTIPLE_REGISTERS, (regs.len() * 2) as u8];
                for r in regs {
                    out.extend_from_slice(&r.to_be_bytes());
                }
                out
            }
            Response::ReadFifoQueue(regs) => {
                let mut out = vec![FC_READ_FIFO_QUEUE];
                let byte_count = (2 + regs.len() * 2) as u16;
                out.extend_from_slice(&byte_count.to_be_bytes());
                out.extend_from_slice(&(regs.len() as u16).to_be_bytes());
                for r in regs {
                    out.extend_from_slice(&r.to_be_bytes());
                }
                out
            }
            Response::ReportServerId {
                server_id,
                run_indicator_status,
            } => {
                let mut out = vec![FC_REPORT_SERVER_ID, (server_id.len() + 1) as u8];
                out.extend_from_slice(server_id);
                out.push(if *run_indicator_status { 0xFF } else { 0x00 });
                out
            }
            Response::Exception { function, code } => {
                vec![function | EXCEPTION_FLAG, *code as u8]
            }
        }
    }

    pub fn decode(bytes: &[u8], request: &Request) -> Result<Response, ModbusError> {
        let (&function, rest) = bytes
            .split_first()
            .ok_or_else(|| ModbusError::ReadError("empty PDU".to_string()))?;

        if function & EXCEPTION_FLAG != 0 {
            let &raw_code = rest
                .first()
                .ok_or_else(|| ModbusError::ReadError("truncated exception response".to_string()))?;
            let code = ExceptionCode::try_from(raw_code)
                .map_err(|_| ModbusError::ReadError(format!("unknown exception code {raw_code}")))?;
            return Ok(Response::Exception {
                function: function & !EXCEPTION_FLAG,
                code,
            });
        }

        Ok(match (function, request) {
            (FC_READ_COILS, Request::ReadCoils { quantity, .. }) => {
                let byte_count = *rest.first().ok_or_else(too_short)? as usize;
                let data = rest.get(1..1 + byte_count).ok_or_else(too_short)?;
                Response::ReadCoils(unpack_bits(data, *quantity as usize))
            }
            (FC_READ_DISCRETE_INPUTS, Request::ReadDiscreteInputs { quantity, .. }) => {
                let byte_count = *rest.first().ok_or_else(too_short)? as usize;
                let data = rest.get(1..1 + byte_count).ok_or_else(too_short)?;
                Response::ReadDiscreteInputs(unpack_bits(data, *quantity as usize))
            }
            (FC_READ_HOLDING_REGISTERS, Request::ReadHoldingRegisters { quantity, .. }) => {
                let byte_count = *rest.first().ok_or_else(too_short)? as usize;
                let data = rest.get(1..1 + byte_count).ok_or_else(too_short)?;
                Response::ReadHoldingRegisters(decode_registers(data, *quantity as usize))
            }
            (FC_READ_INPUT_REGISTERS, Request::ReadInputRegisters { quantity, .. }) => {
                let byte_count = *rest.first().ok_or_else(too_short)? as usize;
                let data = rest.get(1..1 + byte_count).ok_or_else(too_short)?;
                Response::ReadInputRegisters(decode_registers(data, *quantity as usize))
            }
            (FC_WRITE_SINGLE_COIL, _) => {
                let address = u16::from_be_bytes([*rest.first().ok_or_else(too_short)?, *rest.get(1).ok_or_else(too_short)?]);
                let raw = u16::from_be_bytes([*rest.get(2).ok_or_else(too_short)?, *rest.get(3).ok_or_else(too_short)?]);
                Response::WriteSingleCoil {
                    address,
                    value: raw == 0xFF00,
                }
            }
            (FC_WRITE_SINGLE_REGISTER, _) => {
                let address = u16::from_be_bytes([*rest.first().ok_or_else(too_short)?, *rest.get(1).ok_or_else(too_short)?]);
                let value = u16::from_be_bytes([*rest.get(2).ok_or_else(too_short)?, *rest.get(3).ok_or_else(too_short)?]);
                Response::WriteSingleRegister { address, value }
            }
            (FC_WRITE_MULTIPLE_COILS, _) => {
                let address = u16::from_be_bytes([*rest.first().ok_or_else(too_short)?, *rest.get(1).ok_or_else(too_short)?]);
                let quantity = u16::from_be_bytes([*rest.get(2).ok_or_else(too_short)?, *rest.get(3).ok_or_else(too_short)?]);
                Response::WriteMultipleCoils { address, quantity }
            }
            (FC_WRITE_MULTIPLE_REGISTERS, _) => {
                let address = u16::from_be_bytes([*rest.first().ok_or_else(too_short)?, *rest.get(1).ok_or_else(too_short)?]);
                let quantity = u16::from_be_bytes([*rest.get(2).ok_or_else(too_short)?, *rest.get(3).ok_or_else(too_short)?]);
                Response::WriteMultipleRegisters { address, quantity }
            }
            (FC_DIAGNOSTICS, _) => {
                let sub_function = u16::from_be_bytes([*rest.first().ok_or_else(too_short)?, *rest.get(1).ok_or_else(too_short)?]);
                let data = u16::from_be_bytes([*rest.get(2).ok_or_else(too_short)?, *rest.get(3).ok_or_else(too_short)?]);
                Response::Diagnostics { sub_function, data }
            }
            (FC_READ_WRITE_MULTIPLE_REGISTERS, Request::ReadWriteMultipleRegisters { read_quantity, .. }) => {
                let byte_count = *rest.first().ok_or_else(too_short)? as usize;
                let data = rest.get(1..1 + byte_count).ok_or_else(too_short)?;
                Response::ReadWriteMultipleRegisters(decode_registers(data, *read_quantity as usize))
            }
            (FC_READ_FIFO_QUEUE, _) => {
                let fifo_count = u16::from_be_bytes([*rest.get(2).ok_or_else(too_short)?, *rest.get(3).ok_or_else(too_short)?]) as usize;
                let data = rest.get(4..4 + fifo_count * 2).ok_or_else(too_short)?;
                Response::ReadFifoQueue(decode_registers(data, fifo_count))
            }
            (FC_REPORT_SERVER_ID, _) => {
                let byte_count = *rest.first().ok_or_else(too_short)? as usize;
                let data = rest.get(1..1 + byte_count).ok_or_else(too_short)?;
                let (run_byte, id_bytes) = data.split_last().ok_or_else(too_short)?;
                Response::ReportServerId {
                    server_id: id_bytes.to_vec(),
                    run_indicator_status: *run_byte == 0xFF,
                }
            }
            (other, _) => {
                return Err(ModbusError::ReadError(format!(
                    "response function {other:#04x} does not match request"
                )))
            }
        })
    }
}

fn too_short() -> ModbusError {
    ModbusError::ReadError("response PDU too short".to_string())
}

fn decode_registers(data: &[u8], quantity: usize) -> Vec<u16> {
    data.chunks_exact(2)
        .take(quantity)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

pub(crate) fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

pub(crate) fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}
