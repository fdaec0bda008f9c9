//! Client error type.

use crate::client::ConnState;
use crate::resp::{ParseError, Value};
use std::io;
use thiserror::Error;

/// Errors returned by connection and command operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connect, send or receive failed at the transport.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// The peer closed the stream before a complete reply arrived.
    #[error("connection closed by server")]
    ConnectionClosed,
    /// The reply bytes are not valid RESP.
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),
    /// A reply grew past the configured frame limit without completing.
    #[error("reply exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error("connection is not ready (state: {0:?})")]
    NotReady(ConnState),
    #[error("command must contain at least one word")]
    EmptyCommand,
    /// A handshake command was answered with an error reply.
    #[error("server rejected {command}: {message}")]
    Server {
        command: &'static str,
        message: String,
    },
    #[error("unexpected reply to {command}: {reply:?}")]
    UnexpectedReply {
        command: &'static str,
        reply: Value,
    },
    #[error("unterminated quote in command line")]
    UnterminatedQuote,
}

impl Error {
    /// Whether the failure happened below the protocol, at the byte transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
