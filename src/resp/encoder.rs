//! RESP encoder.
//!
//! Serializes a [`Value`] tree for a given protocol version. Null and
//! Boolean are the only kinds whose wire form depends on the version.

use super::value::{ProtocolVersion, Value};
use bytes::BytesMut;

const CRLF: &[u8] = b"\r\n";

/// RESP2 spelling of a null, borrowed from the null bulk string.
const RESP2_NULL: &[u8] = b"$-1\r\n";
const RESP3_NULL: &[u8] = b"_\r\n";

/// Encode a value to bytes
pub fn encode(value: &Value, version: ProtocolVersion) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_into(value, version, &mut buf);
    buf
}

/// Encode a value into an existing buffer
pub fn encode_into(value: &Value, version: ProtocolVersion, buf: &mut BytesMut) {
    match value {
        Value::Null => match version {
            ProtocolVersion::V2 => buf.extend_from_slice(RESP2_NULL),
            ProtocolVersion::V3 => buf.extend_from_slice(RESP3_NULL),
        },
        Value::Integer(n) => {
            buf.extend_from_slice(b":");
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.extend_from_slice(CRLF);
        }
        Value::Double(d) => {
            buf.extend_from_slice(b",");
            buf.extend_from_slice(format_double(*d).as_bytes());
            buf.extend_from_slice(CRLF);
        }
        Value::SimpleString(s) => {
            buf.extend_from_slice(b"+");
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(CRLF);
        }
        Value::SimpleError(s) => {
            buf.extend_from_slice(b"-");
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(CRLF);
        }
        Value::BulkString(data) => {
            encode_bulk(data, buf);
        }
        Value::Array(values) => {
            buf.extend_from_slice(b"*");
            buf.extend_from_slice(values.len().to_string().as_bytes());
            buf.extend_from_slice(CRLF);
            for value in values {
                encode_into(value, version, buf);
            }
        }
        Value::Boolean(b) => match version {
            // RESP2 has no boolean type; the parser turns these back into booleans.
            ProtocolVersion::V2 => {
                let frame: &[u8] = if *b { b"+true\r\n" } else { b"+false\r\n" };
                buf.extend_from_slice(frame);
            }
            ProtocolVersion::V3 => {
                let frame: &[u8] = if *b { b"#t\r\n" } else { b"#f\r\n" };
                buf.extend_from_slice(frame);
            }
        },
    }
}

/// Encode command words as an array of bulk strings.
///
/// Requests look the same under either protocol version.
pub fn encode_command<S: AsRef<[u8]>>(words: &[S], buf: &mut BytesMut) {
    buf.extend_from_slice(b"*");
    buf.extend_from_slice(words.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    for word in words {
        encode_bulk(word.as_ref(), buf);
    }
}

fn encode_bulk(data: &[u8], buf: &mut BytesMut) {
    buf.reserve(data.len() + 16);
    buf.extend_from_slice(b"$");
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

/// Shortest decimal that parses back to the same `f64`.
fn format_double(d: f64) -> String {
    if d.is_nan() {
        "nan".to_string()
    } else if d == f64::INFINITY {
        "inf".to_string()
    } else if d == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rstest::rstest;

    #[rstest]
    #[case(Value::integer(1000), b":1000\r\n".as_slice())]
    #[case(Value::integer(-42), b":-42\r\n".as_slice())]
    #[case(Value::double(3.25), b",3.25\r\n".as_slice())]
    #[case(Value::double(f64::INFINITY), b",inf\r\n".as_slice())]
    #[case(Value::double(f64::NEG_INFINITY), b",-inf\r\n".as_slice())]
    #[case(Value::double(f64::NAN), b",nan\r\n".as_slice())]
    #[case(Value::simple("OK"), b"+OK\r\n".as_slice())]
    #[case(Value::error("ERR unknown"), b"-ERR unknown\r\n".as_slice())]
    #[case(Value::bulk("hello"), b"$5\r\nhello\r\n".as_slice())]
    #[case(Value::bulk(Bytes::new()), b"$0\r\n\r\n".as_slice())]
    #[case(Value::array(vec![]), b"*0\r\n".as_slice())]
    fn test_encode_version_independent(#[case] value: Value, #[case] expected: &[u8]) {
        assert_eq!(&encode(&value, ProtocolVersion::V2)[..], expected);
        assert_eq!(&encode(&value, ProtocolVersion::V3)[..], expected);
    }

    #[test]
    fn test_encode_null() {
        assert_eq!(&encode(&Value::null(), ProtocolVersion::V2)[..], b"$-1\r\n");
        assert_eq!(&encode(&Value::null(), ProtocolVersion::V3)[..], b"_\r\n");
    }

    #[test]
    fn test_encode_boolean() {
        let t = Value::boolean(true);
        let f = Value::boolean(false);
        assert_eq!(&encode(&t, ProtocolVersion::V2)[..], b"+true\r\n");
        assert_eq!(&encode(&f, ProtocolVersion::V2)[..], b"+false\r\n");
        assert_eq!(&encode(&t, ProtocolVersion::V3)[..], b"#t\r\n");
        assert_eq!(&encode(&f, ProtocolVersion::V3)[..], b"#f\r\n");
    }

    #[test]
    fn test_encode_bulk_declares_byte_length() {
        // Multi-byte UTF-8: length counts bytes, not characters.
        let value = Value::bulk("héllo");
        assert_eq!(&encode(&value, ProtocolVersion::V2)[..], "$6\r\nhéllo\r\n".as_bytes());

        let binary = Value::bulk(vec![0u8, b'\r', b'\n', 0xff]);
        assert_eq!(&encode(&binary, ProtocolVersion::V2)[..], b"$4\r\n\x00\r\n\xff\r\n");
    }

    #[test]
    fn test_encode_nested_array() {
        let value = Value::array(vec![
            Value::bulk("foo"),
            Value::integer(7),
            Value::array(vec![Value::null(), Value::boolean(true)]),
        ]);
        assert_eq!(
            &encode(&value, ProtocolVersion::V2)[..],
            b"*3\r\n$3\r\nfoo\r\n:7\r\n*2\r\n$-1\r\n+true\r\n"
        );
        assert_eq!(
            &encode(&value, ProtocolVersion::V3)[..],
            b"*3\r\n$3\r\nfoo\r\n:7\r\n*2\r\n_\r\n#t\r\n"
        );
    }

    #[test]
    fn test_encode_command() {
        let mut buf = BytesMut::new();
        encode_command(&["SET", "foo", "bar"], &mut buf);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn test_encode_into_appends() {
        let mut buf = BytesMut::from(&b"+PING\r\n"[..]);
        encode_into(&Value::integer(1), ProtocolVersion::V3, &mut buf);
        assert_eq!(&buf[..], b"+PING\r\n:1\r\n");
    }
}
