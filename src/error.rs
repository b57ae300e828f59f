//! Error taxonomies for the CAN codec, the DBC parser and the Modbus engines.
//!
//! Each taxonomy mirrors one of the `thiserror` enums the teacher crate keeps
//! in `dbc/types/errors.rs`: a closed set of variants, each carrying a
//! human-readable `Display` message. Recoverable per-record / per-signal
//! issues do not produce an `Err` — they accumulate into a `warnings: Vec<String>`
//! on the owning type instead (cleared on every top-level call), so only
//! genuinely fatal conditions reach these enums.

use thiserror::Error;

/// Errors produced by [`crate::can::frame_processor::FrameProcessor`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanError {
    #[error("frame is not a Data frame: {reason}")]
    UnsupportedFrameFormat { reason: String },
    #[error("decoding failed: {reason}")]
    Decoding { reason: String },
    #[error("encoding failed: {reason}")]
    Encoding { reason: String },
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },
}

/// Errors produced while parsing a `.dbc` file with [`crate::can::dbc::parser`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbcError {
    #[error("failed to read '{path}': {reason}")]
    FileReading { path: String, reason: String },
    #[error("parse error: {reason}")]
    Parsing { reason: String },
}

/// Errors surfaced by [`crate::modbus::client::ClientEngine`] and
/// [`crate::modbus::server::ServerEngine`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    #[error("read error: {0}")]
    ReadError(String),
    #[error("write error: {0}")]
    WriteError(String),
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    #[error("unknown error: {0}")]
    UnknownError(String),
    #[error("operation error: {0}")]
    OperationError(String),
    #[error("request timed out")]
    TimeoutError,
    #[error("protocol exception: {0:?}")]
    ProtocolError(crate::modbus::pdu::ExceptionCode),
}
