//! Connection handshake.
//!
//! Run once per attached transport:
//! 1. `CLIENT ID`: store the server-assigned connection id.
//! 2. `HELLO <version>`: switch the reply protocol.
//! 3. `CLIENT SETINFO LIB-NAME` / `LIB-VERSION`: optional, failures ignored.

use super::connection::{ConnState, Connection};
use super::transport::Transport;
use crate::error::{Error, Result};
use crate::resp::{decode, measure, ProtocolVersion, Value};
use tracing::{debug, info};

impl<T: Transport> Connection<T> {
    pub(super) fn handshake(&mut self) -> Result<()> {
        self.set_state(ConnState::Identifying);

        let client_id = self.identify()?;
        self.hello(self.options.protocol)?;

        if self.options.set_info {
            self.announce_library()?;
        }

        self.client_id = Some(client_id);
        self.set_state(ConnState::Ready);
        info!(client_id, protocol = %self.protocol, "Connection ready");
        Ok(())
    }

    fn identify(&mut self) -> Result<i64> {
        match self.round_trip(&["CLIENT", "ID"])? {
            Value::Integer(id) => Ok(id),
            Value::SimpleError(ref message) => Err(Error::Server {
                command: "CLIENT ID",
                message: message.clone(),
            }),
            reply => Err(Error::UnexpectedReply {
                command: "CLIENT ID",
                reply,
            }),
        }
    }

    /// The reply is the server's description of itself. Under RESP3 it is a
    /// map, which the value model does not represent, so a successful reply is
    /// skipped rather than decoded.
    fn hello(&mut self, version: ProtocolVersion) -> Result<()> {
        let version_arg = version.as_u8().to_string();
        self.write_command(&["HELLO", version_arg.as_str()])?;

        let rejection = self.read_with(|buf| match buf.first().copied() {
            Some(b'-') => decode(buf, ProtocolVersion::V2).map(Some),
            _ => measure(buf).map(|()| None),
        })?;

        match rejection {
            None => {
                debug!(protocol = %version, "Protocol negotiated");
                self.protocol = version;
                Ok(())
            }
            Some(Value::SimpleError(ref message)) => Err(Error::Server {
                command: "HELLO",
                message: message.clone(),
            }),
            Some(reply) => Err(Error::UnexpectedReply {
                command: "HELLO",
                reply,
            }),
        }
    }

    /// Only error replies are swallowed (servers before 7.2 do not know
    /// `SETINFO`), and the reply is always read so the stream stays in step.
    /// A transport or decode failure here still fails the handshake: the
    /// reply stream is no longer aligned with the requests after one.
    fn announce_library(&mut self) -> Result<()> {
        let attributes = [
            ("LIB-NAME", self.options.lib_name.clone()),
            ("LIB-VERSION", self.options.lib_version.clone()),
        ];

        for (attribute, value) in attributes {
            let Some(value) = value else {
                continue;
            };
            let reply = self.round_trip(&["CLIENT", "SETINFO", attribute, value.as_str()])?;
            if let Value::SimpleError(message) = &reply {
                debug!(attribute, error = %message, "CLIENT SETINFO rejected");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connection::ConnectOptions;
    use crate::client::transport::mock::MockTransport;

    const CLIENT_ID: &str = "*2\r\n$6\r\nCLIENT\r\n$2\r\nID\r\n";
    const HELLO_2: &str = "*2\r\n$5\r\nHELLO\r\n$1\r\n2\r\n";
    const HELLO_3: &str = "*2\r\n$5\r\nHELLO\r\n$1\r\n3\r\n";
    const SETINFO_NAME: &str =
        "*4\r\n$6\r\nCLIENT\r\n$7\r\nSETINFO\r\n$8\r\nLIB-NAME\r\n$5\r\ntelly\r\n";
    const SETINFO_VERSION: &str =
        "*4\r\n$6\r\nCLIENT\r\n$7\r\nSETINFO\r\n$11\r\nLIB-VERSION\r\n$5\r\n1.2.3\r\n";

    const HELLO_2_REPLY: &[u8] = b"*6\r\n\
        $6\r\nserver\r\n$5\r\nredis\r\n\
        $5\r\nproto\r\n:2\r\n\
        $7\r\nmodules\r\n*0\r\n";
    const HELLO_3_REPLY: &[u8] = b"%4\r\n\
        $6\r\nserver\r\n$5\r\nredis\r\n\
        $5\r\nproto\r\n:3\r\n\
        $2\r\nid\r\n:42\r\n\
        $7\r\nmodules\r\n*0\r\n";

    fn options(protocol: ProtocolVersion, set_info: bool) -> ConnectOptions {
        ConnectOptions {
            protocol,
            set_info,
            lib_name: Some("telly".to_string()),
            lib_version: Some("1.2.3".to_string()),
            ..ConnectOptions::default()
        }
    }

    #[test]
    fn test_handshake_sequence_with_setinfo() {
        let transport = MockTransport::new()
            .reply(b":42\r\n")
            .reply(HELLO_2_REPLY)
            .reply(b"+OK\r\n")
            .reply(b"+OK\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V2, true));
        conn.attach(transport).unwrap();

        assert_eq!(conn.state(), ConnState::Ready);
        assert!(conn.is_connected());
        assert_eq!(conn.client_id(), Some(42));
        assert_eq!(conn.protocol(), ProtocolVersion::V2);
        assert_eq!(
            conn.get_ref().unwrap().sent_text(),
            vec![
                CLIENT_ID.to_string(),
                HELLO_2.to_string(),
                SETINFO_NAME.to_string(),
                SETINFO_VERSION.to_string(),
            ]
        );
    }

    #[test]
    fn test_handshake_resp3_skips_hello_map() {
        let transport = MockTransport::new()
            .reply(b":7\r\n")
            .reply(HELLO_3_REPLY)
            .reply(b"#t\r\n_\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V3, false));
        conn.attach(transport).unwrap();

        assert_eq!(conn.protocol(), ProtocolVersion::V3);
        assert_eq!(conn.client_id(), Some(7));
        assert_eq!(conn.get_ref().unwrap().sent_text(), vec![CLIENT_ID, HELLO_3]);

        // Replies now decode with RESP3 rules.
        assert_eq!(conn.send_command(&["EXISTS", "k"]).unwrap(), Value::Boolean(true));
        assert_eq!(conn.send_command(&["GET", "k"]).unwrap(), Value::Null);
    }

    #[test]
    fn test_handshake_hello_reply_split_across_reads() {
        let (head, tail) = HELLO_3_REPLY.split_at(20);
        let transport = MockTransport::new().reply(b":1\r\n").reply(head).reply(tail);
        let mut conn = Connection::new(options(ProtocolVersion::V3, false));
        conn.attach(transport).unwrap();
        assert!(conn.is_connected());
    }

    #[test]
    fn test_handshake_hello_rejected() {
        let transport = MockTransport::new()
            .reply(b":1\r\n")
            .reply(b"-NOPROTO unsupported protocol version\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V3, true));
        match conn.attach(transport) {
            Err(Error::Server {
                command: "HELLO",
                message,
            }) => assert_eq!(message, "NOPROTO unsupported protocol version"),
            other => panic!("Expected HELLO rejection, got {other:?}"),
        }
        assert_eq!(conn.state(), ConnState::Failed);
        assert_eq!(conn.protocol(), ProtocolVersion::V2);
        assert!(conn.get_ref().is_none());
        assert_eq!(conn.client_id(), None);
    }

    #[test]
    fn test_handshake_client_id_unexpected_reply() {
        let transport = MockTransport::new().reply(b"+OK\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V2, false));
        match conn.attach(transport) {
            Err(Error::UnexpectedReply {
                command: "CLIENT ID",
                reply,
            }) => assert_eq!(reply, Value::simple("OK")),
            other => panic!("Expected unexpected reply, got {other:?}"),
        }
        assert_eq!(conn.state(), ConnState::Failed);
    }

    #[test]
    fn test_handshake_client_id_error_reply() {
        let transport = MockTransport::new().reply(b"-NOPERM no permission\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V2, false));
        assert!(matches!(
            conn.attach(transport),
            Err(Error::Server { command: "CLIENT ID", .. })
        ));
        assert_eq!(conn.state(), ConnState::Failed);
    }

    #[test]
    fn test_handshake_setinfo_errors_are_ignored() {
        let transport = MockTransport::new()
            .reply(b":5\r\n")
            .reply(HELLO_2_REPLY)
            .reply(b"-ERR unknown subcommand 'SETINFO'\r\n")
            .reply(b"-ERR unknown subcommand 'SETINFO'\r\n")
            .reply(b"+PONG\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V2, true));
        conn.attach(transport).unwrap();

        assert_eq!(conn.state(), ConnState::Ready);
        // Both SETINFO replies were consumed, so the next reply lines up.
        assert_eq!(conn.send_command(&["PING"]).unwrap(), Value::simple("PONG"));
    }

    #[test]
    fn test_handshake_setinfo_transport_failure_is_fatal() {
        let transport = MockTransport::new().reply(b":5\r\n").reply(HELLO_2_REPLY);
        let mut conn = Connection::new(options(ProtocolVersion::V2, true));
        match conn.attach(transport) {
            Err(Error::ConnectionClosed) => {}
            other => panic!("Expected connection closed, got {other:?}"),
        }
        assert_eq!(conn.state(), ConnState::Failed);
        assert_eq!(conn.client_id(), None);
    }

    #[test]
    fn test_handshake_setinfo_skips_missing_attributes() {
        let transport = MockTransport::new()
            .reply(b":5\r\n")
            .reply(HELLO_2_REPLY)
            .reply(b"+OK\r\n");
        let mut conn = Connection::new(ConnectOptions {
            lib_version: None,
            ..options(ProtocolVersion::V2, true)
        });
        conn.attach(transport).unwrap();

        let sent = conn.get_ref().unwrap().sent_text();
        assert_eq!(sent.len(), 3);
        assert!(sent[2].contains("LIB-NAME"));
    }

    #[test]
    fn test_handshake_eof() {
        let transport = MockTransport::new().reply(b":5\r\n");
        let mut conn = Connection::new(options(ProtocolVersion::V2, false));
        match conn.attach(transport) {
            Err(Error::ConnectionClosed) => {}
            other => panic!("Expected connection closed, got {other:?}"),
        }
        assert_eq!(conn.state(), ConnState::Failed);
        // CLIENT ID succeeded, but a failed handshake keeps no partial state.
        assert_eq!(conn.client_id(), None);
    }

    #[test]
    fn test_reattach_after_failure() {
        let mut conn = Connection::new(options(ProtocolVersion::V2, false));
        assert!(conn.attach(MockTransport::new()).is_err());
        assert_eq!(conn.state(), ConnState::Failed);

        let transport = MockTransport::new().reply(b":9\r\n").reply(HELLO_2_REPLY);
        conn.attach(transport).unwrap();
        assert_eq!(conn.client_id(), Some(9));
        assert!(conn.is_connected());
    }
}
