//! Server-side request dispatch against a [`ModbusDataMap`], with the
//! diagnostic counters and options table spec §4.8 calls for.

use serde::{Deserialize, Serialize};

use crate::error::ModbusError;
use crate::modbus::data_map::{ModbusDataMap, RegisterType};
use crate::modbus::pdu::{ExceptionCode, Request, Response};

const MAX_READ_COILS: u16 = 2000;
const MAX_WRITE_COILS: usize = 1968;
const MAX_READ_REGISTERS: u16 = 125;
const MAX_WRITE_REGISTERS: usize = 123;
const MAX_RW_WRITE_REGISTERS: usize = 121;

/// A subset of the Modbus diagnostics sub-function counters (0x0001-0x0014);
/// the ones meaningful to a request/response dispatcher without a real
/// transport underneath (bus-level counters like "character overrun" need a
/// serial line this engine doesn't own).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCounters {
    pub bus_message_count: u64,
    pub bus_communication_error_count: u64,
    pub server_exception_error_count: u64,
    pub server_message_count: u64,
    pub server_no_response_count: u64,
}

impl DiagnosticCounters {
    pub fn reset(&mut self) {
        *self = DiagnosticCounters::default();
    }
}

pub struct ServerEngine {
    pub data_map: ModbusDataMap,
    pub diagnostics: DiagnosticCounters,
    /// The unit identifier / server address this engine answers to. A
    /// request addressed to any other unit is silently dropped (spec §4.8
    /// step 1).
    pub server_address: u8,
    /// Forces every request into a `ServerDeviceBusy` exception.
    pub device_busy: bool,
    /// Set by the `Force Listen Only Mode` diagnostics sub-function
    /// (0x0004); while set, requests are still dispatched but no response
    /// is ever sent back.
    pub listen_only: bool,
}

impl ServerEngine {
    pub fn new(data_map: ModbusDataMap) -> Self {
        ServerEngine {
            data_map,
            diagnostics: DiagnosticCounters::default(),
            server_address: 1,
            device_busy: false,
            listen_only: false,
        }
    }

    /// Handles a `Diagnostics` (0x08) sub-function: the echo/query
    /// sub-functions spec §4.8 calls out, plus the per-counter reads from
    /// the wider table in `original_source/qmodbusserver.cpp` (0x000A-0x000F)
    /// so "other sub-functions return the requested counter" has content.
    /// Returns `None` for sub-functions that elicit no response.
    fn dispatch_diagnostics(&mut self, sub_function: u16, data: u16) -> Option<Response> {
        const RESTART_COMMUNICATIONS: u16 = 0x0001;
        const FORCE_LISTEN_ONLY_MODE: u16 = 0x0004;
        const CLEAR_COUNTERS: u16 = 0x000A;
        const RETURN_BUS_MESSAGE_COUNT: u16 = 0x000B;
        const RETURN_BUS_COMMUNICATION_ERROR_COUNT: u16 = 0x000C;
        const RETURN_BUS_EXCEPTION_ERROR_COUNT: u16 = 0x000D;
        const RETURN_SERVER_MESSAGE_COUNT: u16 = 0x000E;
        const RETURN_SERVER_NO_RESPONSE_COUNT: u16 = 0x000F;

        if sub_function == FORCE_LISTEN_ONLY_MODE {
            self.listen_only = true;
            return None;
        }

        let response_data = match sub_function {
            RESTART_COMMUNICATIONS | CLEAR_COUNTERS => {
                self.diagnostics.reset();
                data
            }
            RETURN_BUS_MESSAGE_COUNT => self.diagnostics.bus_message_count as u16,
            RETURN_BUS_COMMUNICATION_ERROR_COUNT => self.diagnostics.bus_communication_error_count as u16,
            RETURN_BUS_EXCEPTION_ERROR_COUNT => self.diagnostics.server_exception_error_count as u16,
            RETURN_SERVER_MESSAGE_COUNT => self.diagnostics.server_message_count as u16,
            RETURN_SERVER_NO_RESPONSE_COUNT => self.diagnostics.server_no_response_count as u16,
            _ => data,
        };

        Some(Response::Diagnostics {
            sub_function,
            data: response_data,
        })
    }

    /// Validates the quantity bounds spec §4.4 places on each read/write
    /// function code, ahead of touching the data map.
    fn check_quantity(request: &Request) -> Result<(), ModbusError> {
        let illegal_value = || ModbusError::ProtocolError(ExceptionCode::IllegalDataValue);
        match request {
            Request::ReadCoils { quantity, .. } | Request::ReadDiscreteInputs { quantity, .. } => {
                if *quantity == 0 || *quantity > MAX_READ_COILS {
                    return Err(illegal_value());
                }
            }
            Request::ReadHoldingRegisters { quantity, .. } | Request::ReadInputRegisters { quantity, .. } => {
                if *quantity == 0 || *quantity > MAX_READ_REGISTERS {
                    return Err(illegal_value());
                }
            }
            Request::WriteMultipleCoils { values, .. } => {
                if values.is_empty() || values.len() > MAX_WRITE_COILS {
                    return Err(illegal_value());
                }
            }
            Request::WriteMultipleRegisters { values, .. } => {
                if values.is_empty() || values.len() > MAX_WRITE_REGISTERS {
                    return Err(illegal_value());
                }
            }
            Request::ReadWriteMultipleRegisters {
                read_quantity,
                write_values,
                ..
            } => {
                if *read_quantity == 0 || *read_quantity > MAX_READ_REGISTERS {
                    return Err(illegal_value());
                }
                if write_values.is_empty() || write_values.len() > MAX_RW_WRITE_REGISTERS {
                    return Err(illegal_value());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Dispatches `request`, addressed to `unit_id`, against the data map.
    /// Returns `Some((response, data_written))` when a reply must be sent,
    /// or `None` when spec §4.8's options call for silence: the request is
    /// addressed to a different unit, `listen_only` is active, or the
    /// request itself is the Listen-Only-Mode diagnostic.
    pub fn process_request(&mut self, unit_id: u8, request: &Request) -> Option<(Response, bool)> {
        if unit_id != self.server_address {
            return None;
        }

        if self.device_busy {
            self.diagnostics.bus_message_count += 1;
            self.diagnostics.server_exception_error_count += 1;
            let response = Response::Exception {
                function: request.function_code(),
                code: ExceptionCode::ServerDeviceBusy,
            };
            return self.suppress_if_listen_only((response, false));
        }

        self.diagnostics.bus_message_count += 1;

        if let Request::Diagnostics { sub_function, data } = request {
            let response = self.dispatch_diagnostics(*sub_function, *data);
            return match response {
                Some(response) => {
                    self.diagnostics.server_message_count += 1;
                    self.suppress_if_listen_only((response, false))
                }
                None => {
                    self.diagnostics.server_no_response_count += 1;
                    None
                }
            };
        }

        let result = Self::check_quantity(request).and_then(|()| self.dispatch(request));

        let outcome = match result {
            Ok((response, data_written)) => {
                self.diagnostics.server_message_count += 1;
                (response, data_written)
            }
            Err(ModbusError::ProtocolError(code)) => {
                self.diagnostics.server_exception_error_count += 1;
                (
                    Response::Exception {
                        function: request.function_code(),
                        code,
                    },
                    false,
                )
            }
            Err(_) => {
                self.diagnostics.server_exception_error_count += 1;
                (
                    Response::Exception {
                        function: request.function_code(),
                        code: ExceptionCode::ServerDeviceFailure,
                    },
                    false,
                )
            }
        };

        self.suppress_if_listen_only(outcome)
    }

    fn suppress_if_listen_only(&mut self, outcome: (Response, bool)) -> Option<(Response, bool)> {
        if self.listen_only {
            self.diagnostics.server_no_response_count += 1;
            None
        } else {
            Some(outcome)
        }
    }

    /// The actual per-function-code data map access, once address, busy and
    /// quantity checks have passed. Diagnostics is handled separately in
    /// [`Self::process_request`] since it never touches the data map.
    fn dispatch(&mut self, request: &Request) -> Result<(Response, bool), ModbusError> {
        match request {
            Request::ReadCoils { address, quantity } => self
                .data_map
                .read_bits(RegisterType::Coils, *address, *quantity)
                .map(|bits| (Response::ReadCoils(bits), false)),
            Request::ReadDiscreteInputs { address, quantity } => self
                .data_map
                .read_bits(RegisterType::DiscreteInputs, *address, *quantity)
                .map(|bits| (Response::ReadDiscreteInputs(bits), false)),
            Request::ReadHoldingRegisters { address, quantity } => self
                .data_map
                .read_registers(RegisterType::HoldingRegisters, *address, *quantity)
                .map(|regs| (Response::ReadHoldingRegisters(regs), false)),
            Request::ReadInputRegisters { address, quantity } => self
                .data_map
                .read_registers(RegisterType::InputRegisters, *address, *quantity)
                .map(|regs| (Response::ReadInputRegisters(regs), false)),
            Request::WriteSingleCoil { address, value } => {
                let changed = self.data_map.write_bits(RegisterType::Coils, *address, &[*value])?;
                Ok((
                    Response::WriteSingleCoil {
                        address: *address,
                        value: *value,
                    },
                    changed,
                ))
            }
            Request::WriteSingleRegister { address, value } => {
                let changed = self
                    .data_map
                    .write_registers(RegisterType::HoldingRegisters, *address, &[*value])?;
                Ok((
                    Response::WriteSingleRegister {
                        address: *address,
                        value: *value,
                    },
                    changed,
                ))
            }
            Request::WriteMultipleCoils { address, values } => {
                let changed = self.data_map.write_bits(RegisterType::Coils, *address, values)?;
                Ok((
                    Response::WriteMultipleCoils {
                        address: *address,
                        quantity: values.len() as u16,
                    },
                    changed,
                ))
            }
            Request::WriteMultipleRegisters { address, values } => {
                let changed = self
                    .data_map
                    .write_registers(RegisterType::HoldingRegisters, *address, values)?;
                Ok((
                    Response::WriteMultipleRegisters {
                        address: *address,
                        quantity: values.len() as u16,
                    },
                    changed,
                ))
            }
            Request::ReadWriteMultipleRegisters {
                read_address,
                read_quantity,
                write_address,
                write_values,
            } => {
                let changed = self
                    .data_map
                    .write_registers(RegisterType::HoldingRegisters, *write_address, write_values)?;
                let regs =
                    self.data_map
                        .read_registers(RegisterType::HoldingRegisters, *read_address, *read_quantity)?;
                Ok((Response::ReadWriteMultipleRegisters(regs), changed))
            }
            Request::ReadFifoQueue { .. } => {
                Ok((Response::ReadFifoQueue(self.data_map.read_fifo_queue()), false))
            }
            Request::ReportServerId => Ok((
                Response::ReportServerId {
                    server_id: vec![self.server_address],
                    run_indicator_status: true,
                },
                false,
            )),
            Request::Diagnostics { .. } => unreachable!("Diagnostics is dispatched in process_request"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_single_register_reports_change() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 4, 0));
        let (response, written) = server
            .process_request(1, &Request::WriteSingleRegister { address: 0, value: 7 })
            .unwrap();
        assert_eq!(response, Response::WriteSingleRegister { address: 0, value: 7 });
        assert!(written);

        let (_, written_again) = server
            .process_request(1, &Request::WriteSingleRegister { address: 0, value: 7 })
            .unwrap();
        assert!(!written_again);
    }

    #[test]
    fn out_of_range_read_yields_exception_response() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 2, 0));
        let (response, _) = server
            .process_request(1, &Request::ReadHoldingRegisters { address: 0, quantity: 5 })
            .unwrap();
        assert_eq!(
            response,
            Response::Exception {
                function: 0x03,
                code: ExceptionCode::IllegalDataAddress
            }
        );
        assert_eq!(server.diagnostics.server_exception_error_count, 1);
        assert_eq!(server.diagnostics.server_message_count, 0);
    }

    #[test]
    fn over_quantity_read_yields_illegal_data_value() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 4, 0));
        let (response, _) = server
            .process_request(
                1,
                &Request::ReadHoldingRegisters {
                    address: 0,
                    quantity: 200,
                },
            )
            .unwrap();
        assert_eq!(
            response,
            Response::Exception {
                function: 0x03,
                code: ExceptionCode::IllegalDataValue
            }
        );
    }

    #[test]
    fn read_coils_round_trip_through_dispatch() {
        let mut server = ServerEngine::new(ModbusDataMap::new(8, 0, 0, 0));
        server.process_request(
            1,
            &Request::WriteMultipleCoils {
                address: 0,
                values: vec![true, false, true],
            },
        );
        let (response, _) = server
            .process_request(1, &Request::ReadCoils { address: 0, quantity: 3 })
            .unwrap();
        assert_eq!(response, Response::ReadCoils(vec![true, false, true]));
    }

    #[test]
    fn diagnostics_returns_requested_counter() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 1, 0));
        server.process_request(1, &Request::ReadHoldingRegisters { address: 0, quantity: 1 });

        let (response, _) = server
            .process_request(
                1,
                &Request::Diagnostics {
                    sub_function: 0x000B,
                    data: 0,
                },
            )
            .unwrap();
        assert_eq!(
            response,
            Response::Diagnostics {
                sub_function: 0x000B,
                data: 2, // the ReadHoldingRegisters call above plus this one
            }
        );
    }

    #[test]
    fn server_message_count_only_counts_successes() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 2, 0));
        server.process_request(1, &Request::ReadHoldingRegisters { address: 0, quantity: 1 });
        server.process_request(1, &Request::ReadHoldingRegisters { address: 0, quantity: 5 });
        assert_eq!(server.diagnostics.server_message_count, 1);
        assert_eq!(server.diagnostics.server_exception_error_count, 1);
        assert_eq!(server.diagnostics.bus_message_count, 2);
    }

    #[test]
    fn mismatched_unit_id_yields_no_response() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 1, 0));
        let result = server.process_request(2, &Request::ReadHoldingRegisters { address: 0, quantity: 1 });
        assert!(result.is_none());
        assert_eq!(server.diagnostics.bus_message_count, 0);
    }

    #[test]
    fn device_busy_forces_exception() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 1, 0));
        server.device_busy = true;
        let (response, _) = server
            .process_request(1, &Request::ReadHoldingRegisters { address: 0, quantity: 1 })
            .unwrap();
        assert_eq!(
            response,
            Response::Exception {
                function: 0x03,
                code: ExceptionCode::ServerDeviceBusy
            }
        );
    }

    #[test]
    fn listen_only_mode_suppresses_responses() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 1, 0));
        let result = server.process_request(
            1,
            &Request::Diagnostics {
                sub_function: 0x0004,
                data: 0,
            },
        );
        assert!(result.is_none());
        assert!(server.listen_only);

        let result = server.process_request(1, &Request::ReadHoldingRegisters { address: 0, quantity: 1 });
        assert!(result.is_none());
    }

    #[test]
    fn report_server_id_round_trip() {
        let mut server = ServerEngine::new(ModbusDataMap::new(0, 0, 0, 0));
        let (response, _) = server.process_request(1, &Request::ReportServerId).unwrap();
        assert_eq!(
            response,
            Response::ReportServerId {
                server_id: vec![1],
                run_indicator_status: true,
            }
        );
    }
}
