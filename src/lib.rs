//! telly: a minimal client for Redis-compatible servers.
//!
//! - `resp`: RESP2/RESP3 value model, encoder and parser
//! - `client`: connection state machine, handshake and TCP transport
//! - `command`: tokenizer for human-typed command lines
//! - `config`: CLI and TOML configuration for the `telly` binary
//!
//! ```no_run
//! use telly::{ConnectOptions, Connection, ProtocolVersion};
//!
//! # fn main() -> telly::Result<()> {
//! let options = ConnectOptions {
//!     protocol: ProtocolVersion::V3,
//!     ..ConnectOptions::default()
//! };
//! let mut conn = Connection::connect(&options)?;
//! conn.send_command(&["SET", "foo", "bar"])?;
//! println!("{}", conn.send_command(&["GET", "foo"])?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod resp;

pub use client::{ConnState, ConnectOptions, Connection, TcpTransport, Transport};
pub use command::split_args;
pub use config::Config;
pub use error::{Error, Result};
pub use resp::{ProtocolVersion, Value};
