//! Connection state machine.
//!
//! A connection owns its transport exclusively and carries one request at a
//! time: `send_command` writes a request, then blocks until exactly one reply
//! frame has been read and decoded.
//!
//! ```text
//! Disconnected -> Connecting -> Identifying -> Ready
//!        \             \             \           \
//!         +-------------+-------------+-----------+--> Failed
//! ```

use super::buffer::{ReadBuffer, DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_SIZE};
use super::transport::{TcpTransport, Transport};
use crate::command::split_args;
use crate::error::{Error, Result};
use crate::resp::{decode, encode_command, ProtocolVersion, Value};
use bytes::BytesMut;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No transport attached.
    Disconnected,
    /// Transport attached, handshake not started.
    Connecting,
    /// Handshake in progress.
    Identifying,
    /// Handshake complete; commands may be sent.
    Ready,
    /// A transport, protocol or handshake failure made the connection unusable.
    Failed,
}

/// Parameters for opening a connection and running its handshake.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Protocol requested with `HELLO`.
    pub protocol: ProtocolVersion,
    /// Announce `lib_name`/`lib_version` with `CLIENT SETINFO`.
    pub set_info: bool,
    pub lib_name: Option<String>,
    pub lib_version: Option<String>,
    /// Size of each transport read.
    pub read_size: usize,
    /// Most bytes buffered while waiting for one reply to complete.
    pub max_frame_size: usize,
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            protocol: ProtocolVersion::V2,
            set_info: true,
            lib_name: Some(env!("CARGO_PKG_NAME").to_string()),
            lib_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            read_size: DEFAULT_READ_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout: None,
            io_timeout: None,
        }
    }
}

/// A client connection to a RESP server.
#[derive(Debug)]
pub struct Connection<T = TcpTransport> {
    transport: Option<T>,
    state: ConnState,
    /// Version used to decode replies. Stays RESP2 until `HELLO` succeeds.
    pub(super) protocol: ProtocolVersion,
    pub(super) client_id: Option<i64>,
    buffer: ReadBuffer,
    write_buf: BytesMut,
    pub(super) options: ConnectOptions,
}

impl Connection<TcpTransport> {
    /// Open a TCP connection to `options.host:options.port` and run the handshake.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut conn = Connection::new(options.clone());
        conn.set_state(ConnState::Connecting);

        let transport = match TcpTransport::connect(
            &options.host,
            options.port,
            options.connect_timeout,
            options.io_timeout,
        ) {
            Ok(transport) => transport,
            Err(e) => {
                warn!(host = %options.host, port = options.port, error = %e, "Connect failed");
                conn.set_state(ConnState::Failed);
                return Err(Error::Transport(e));
            }
        };

        conn.attach(transport)?;
        Ok(conn)
    }
}

impl<T: Transport> Connection<T> {
    /// Create a connection with no transport attached.
    pub fn new(options: ConnectOptions) -> Self {
        Self {
            transport: None,
            state: ConnState::Disconnected,
            protocol: ProtocolVersion::V2,
            client_id: None,
            buffer: ReadBuffer::new(options.read_size, options.max_frame_size),
            write_buf: BytesMut::new(),
            options,
        }
    }

    /// Take ownership of an already opened transport and run the handshake.
    ///
    /// On failure the connection is left `Failed` and the transport is dropped.
    pub fn attach(&mut self, transport: T) -> Result<()> {
        self.transport = Some(transport);
        self.protocol = ProtocolVersion::V2;
        self.client_id = None;
        self.buffer.clear();
        self.set_state(ConnState::Connecting);

        if let Err(e) = self.handshake() {
            warn!(error = %e, "Handshake failed");
            self.fail();
            return Err(e);
        }
        Ok(())
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Ready
    }

    /// Protocol version used for replies.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Server-assigned id from `CLIENT ID`. Set when the handshake completes,
    /// cleared when the connection fails or is closed.
    pub fn client_id(&self) -> Option<i64> {
        self.client_id
    }

    pub fn get_ref(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Drop the transport and return to `Disconnected`.
    pub fn close(&mut self) {
        self.transport = None;
        self.buffer.clear();
        self.client_id = None;
        self.set_state(ConnState::Disconnected);
    }

    /// Send one command and wait for its reply.
    ///
    /// Only valid once the handshake has completed. In any other state this
    /// returns [`Error::NotReady`] without touching the transport. A server
    /// error reply is returned as `Ok(Value::SimpleError(_))`.
    pub fn send_command<S: AsRef<[u8]>>(&mut self, words: &[S]) -> Result<Value> {
        if self.state != ConnState::Ready {
            return Err(Error::NotReady(self.state));
        }

        match self.round_trip(words) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if !matches!(e, Error::EmptyCommand) {
                    warn!(error = %e, "Command failed, connection is no longer usable");
                    self.fail();
                }
                Err(e)
            }
        }
    }

    /// Split a command line into words and send it.
    pub fn execute(&mut self, line: &str) -> Result<Value> {
        let words = split_args(line)?;
        self.send_command(&words)
    }

    /// Write a request and read back one decoded reply, regardless of state.
    pub(super) fn round_trip<S: AsRef<[u8]>>(&mut self, words: &[S]) -> Result<Value> {
        self.write_command(words)?;
        let protocol = self.protocol;
        let transport = self.transport.as_mut().ok_or(Error::NotReady(self.state))?;
        let reply = self
            .buffer
            .read_measured(transport, |frame| decode(frame, protocol))?;
        trace!(kind = ?reply.kind(), "Reply");
        Ok(reply)
    }

    pub(super) fn write_command<S: AsRef<[u8]>>(&mut self, words: &[S]) -> Result<()> {
        if words.is_empty() {
            return Err(Error::EmptyCommand);
        }
        let transport = self.transport.as_mut().ok_or(Error::NotReady(self.state))?;

        self.write_buf.clear();
        encode_command(words, &mut self.write_buf);
        trace!(
            command = %String::from_utf8_lossy(words[0].as_ref()),
            args = words.len() - 1,
            bytes = self.write_buf.len(),
            "Sending command"
        );
        transport.send(&self.write_buf)?;
        Ok(())
    }

    /// Read one frame using `parse`, pulling more bytes until it completes.
    pub(super) fn read_with<R, F>(&mut self, parse: F) -> Result<R>
    where
        F: FnMut(&[u8]) -> crate::resp::ParseResult<R>,
    {
        let transport = self.transport.as_mut().ok_or(Error::NotReady(self.state))?;
        self.buffer.read_frame(transport, parse)
    }

    pub(super) fn set_state(&mut self, state: ConnState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Connection state change");
            self.state = state;
        }
    }

    fn fail(&mut self) {
        self.transport = None;
        self.buffer.clear();
        self.client_id = None;
        self.set_state(ConnState::Failed);
    }
}
