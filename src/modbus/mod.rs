//! Modbus TCP/RTU protocol engines: PDU codec, ADU framing, client
//! transaction lifecycle and server request dispatch (spec §4.4-§4.9).

pub mod client;
pub mod data_map;
pub mod pdu;
pub mod rtu;
pub mod server;
pub mod tcp;
