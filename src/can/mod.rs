//! CAN signal codec: bit-level encode/decode, value types and DBC parsing.

pub mod bitcodec;
pub mod dbc;
pub mod frame;
pub mod frame_processor;
pub mod message;
pub mod signal;
pub mod unique_id;
