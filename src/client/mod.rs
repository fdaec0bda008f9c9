//! Client connection.
//!
//! - `transport`: the byte stream a connection owns
//! - `buffer`: accumulates reads until a full reply frame is available
//! - `connection`: state machine and `send_command`
//! - `handshake`: `CLIENT ID`, `HELLO` and `CLIENT SETINFO`, run on attach

mod buffer;
mod connection;
mod handshake;
mod transport;

pub use buffer::{ReadBuffer, DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_SIZE};
pub use connection::{ConnState, ConnectOptions, Connection};
pub use transport::{TcpTransport, Transport};
