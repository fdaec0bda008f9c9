//! RESP (Redis Serialization Protocol) implementation.
//!
//! Supports RESP2 and RESP3. The protocol version is threaded through both
//! directions of the codec; it decides how Null and Boolean appear on the wire.

pub mod encoder;
pub mod parser;
pub mod value;

pub use encoder::{encode, encode_command, encode_into};
pub use parser::{decode, measure, ParseError, ParseResult};
pub use value::{Kind, ProtocolVersion, Value};
