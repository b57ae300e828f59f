//! # can_tools
//!
//! CAN bus signal codec and Modbus client/server protocol engines.
//!
//! ## Highlights
//! - **CAN codec**: [`can::frame_processor::FrameProcessor`] decodes/encodes raw
//!   [`can::frame::CanFrame`] payloads into named signal values using
//!   [`can::signal::SignalDescription`]/[`can::message::MessageDescription`],
//!   including multiplexed signal selection and bit-exact endian handling.
//! - **DBC parser**: [`can::dbc::DbcParser`] turns `.dbc` text into the message and
//!   signal descriptions the codec consumes.
//! - **Modbus**: [`modbus::client::ClientEngine`] and [`modbus::server::ServerEngine`]
//!   implement the request/response state machines for Modbus TCP and RTU, built on
//!   [`modbus::pdu`], [`modbus::rtu`], [`modbus::tcp`] and [`modbus::data_map`].
//!
//! Transports (sockets, serial ports, CAN hardware backends) are external
//! collaborators: this crate consumes and produces bytes/frames but never
//! performs I/O itself.

pub mod can;
pub mod error;
pub mod modbus;
