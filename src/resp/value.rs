//! RESP value model.
//!
//! A `Value` is one decoded (or to-be-encoded) RESP frame. The set of kinds
//! is closed; every codec dispatch site matches on it exhaustively.

use bytes::Bytes;
use serde::Deserialize;
use std::fmt;

/// Protocol generation negotiated with the server via `HELLO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum ProtocolVersion {
    /// RESP2, the default for a freshly opened connection.
    #[default]
    V2,
    /// RESP3, adds the dedicated null and boolean markers.
    V3,
}

impl ProtocolVersion {
    /// The numeric argument passed to `HELLO`.
    pub fn as_u8(self) -> u8 {
        match self {
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version {
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            other => Err(format!("unsupported RESP version {other}, expected 2 or 3")),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RESP{}", self.as_u8())
    }
}

/// Discriminant of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Integer,
    Double,
    SimpleString,
    BulkString,
    SimpleError,
    Array,
    Boolean,
}

/// RESP value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null: `_\r\n` (RESP3) or `$-1\r\n` (RESP2)
    Null,
    /// Integer: `:1000\r\n`
    Integer(i64),
    /// Double: `,3.14\r\n`
    Double(f64),
    /// Simple string: `+OK\r\n`
    SimpleString(String),
    /// Bulk string: `$5\r\nhello\r\n`
    BulkString(Bytes),
    /// Simple error: `-ERR message\r\n`
    SimpleError(String),
    /// Array: `*2\r\n...`
    Array(Vec<Value>),
    /// Boolean: `#t\r\n` (RESP3) or `+true\r\n` (RESP2)
    Boolean(bool),
}

impl Value {
    pub fn null() -> Value {
        Value::Null
    }

    pub fn integer(n: i64) -> Value {
        Value::Integer(n)
    }

    pub fn double(d: f64) -> Value {
        Value::Double(d)
    }

    /// Create a simple string. The text must not contain `\r` or `\n`;
    /// the encoder writes it verbatim.
    pub fn simple<S: Into<String>>(s: S) -> Value {
        Value::SimpleString(s.into())
    }

    pub fn bulk<B: Into<Bytes>>(data: B) -> Value {
        Value::BulkString(data.into())
    }

    /// Create a simple error. Same line restrictions as [`Value::simple`].
    pub fn error<S: Into<String>>(s: S) -> Value {
        Value::SimpleError(s.into())
    }

    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(values)
    }

    pub fn boolean(b: bool) -> Value {
        Value::Boolean(b)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Integer(_) => Kind::Integer,
            Value::Double(_) => Kind::Double,
            Value::SimpleString(_) => Kind::SimpleString,
            Value::BulkString(_) => Kind::BulkString,
            Value::SimpleError(_) => Kind::SimpleError,
            Value::Array(_) => Kind::Array,
            Value::Boolean(_) => Kind::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::SimpleError(_))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Raw payload of a string-like value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::BulkString(data) => Some(data),
            Value::SimpleString(s) | Value::SimpleError(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Text payload of a string-like value, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Render a value that is not a non-empty array.
    fn fmt_leaf(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "(nil)"),
            Value::Integer(n) => write!(f, "(integer) {n}"),
            Value::Double(d) => write!(f, "(double) {d}"),
            Value::SimpleString(s) => write!(f, "{s}"),
            Value::BulkString(data) => write!(f, "\"{}\"", data.escape_ascii()),
            Value::SimpleError(s) => write!(f, "(error) {s}"),
            Value::Boolean(b) => write!(f, "({b})"),
            Value::Array(_) => write!(f, "(empty array)"),
        }
    }
}

/// Array being rendered, with the index of the next item to print.
struct Level<'a> {
    items: &'a [Value],
    next: usize,
    indent: usize,
    width: usize,
}

/// Human-readable rendering, in the style of `redis-cli`.
///
/// Nested arrays are walked with an explicit stack, so depth is limited
/// only by memory.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut levels: Vec<Level<'_>> = Vec::new();
        let mut value = self;
        let mut indent = 0;

        loop {
            match value {
                Value::Array(items) if !items.is_empty() => levels.push(Level {
                    items,
                    next: 0,
                    indent,
                    width: items.len().to_string().len(),
                }),
                leaf => leaf.fmt_leaf(f)?,
            }

            loop {
                let Some(level) = levels.last_mut() else {
                    return Ok(());
                };
                if level.next == level.items.len() {
                    levels.pop();
                    continue;
                }
                if level.next > 0 {
                    writeln!(f)?;
                    write!(f, "{:indent$}", "", indent = level.indent)?;
                }
                write!(f, "{:>width$}) ", level.next + 1, width = level.width)?;

                let items = level.items;
                value = &items[level.next];
                indent = level.indent + level.width + 2;
                level.next += 1;
                break;
            }
        }
    }
}

/// Nested arrays are flattened onto a heap stack before being freed, so
/// dropping a deeply nested reply cannot overflow the call stack.
impl Drop for Value {
    fn drop(&mut self) {
        let Value::Array(items) = self else {
            return;
        };
        let mut pending = std::mem::take(items);
        while let Some(mut value) = pending.pop() {
            if let Value::Array(children) = &mut value {
                pending.append(children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_constructor() {
        assert_eq!(Value::null().kind(), Kind::Null);
        assert_eq!(Value::integer(1).kind(), Kind::Integer);
        assert_eq!(Value::double(1.5).kind(), Kind::Double);
        assert_eq!(Value::simple("OK").kind(), Kind::SimpleString);
        assert_eq!(Value::bulk("foo").kind(), Kind::BulkString);
        assert_eq!(Value::error("ERR").kind(), Kind::SimpleError);
        assert_eq!(Value::array(vec![]).kind(), Kind::Array);
        assert_eq!(Value::boolean(true).kind(), Kind::Boolean);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::integer(42).as_integer(), Some(42));
        assert_eq!(Value::bulk("foo").as_integer(), None);
        assert_eq!(Value::bulk("foo").as_bytes(), Some(&b"foo"[..]));
        assert_eq!(Value::simple("OK").as_str(), Some("OK"));
        assert_eq!(Value::bulk(vec![0xff, 0xfe]).as_str(), None);
        assert!(Value::null().is_null());
        assert!(Value::error("ERR").is_error());
    }

    #[test]
    fn test_protocol_version_from_u8() {
        assert_eq!(ProtocolVersion::try_from(2u8), Ok(ProtocolVersion::V2));
        assert_eq!(ProtocolVersion::try_from(3u8), Ok(ProtocolVersion::V3));
        assert!(ProtocolVersion::try_from(4u8).is_err());
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::V2);
        assert_eq!(ProtocolVersion::V3.to_string(), "RESP3");
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::null().to_string(), "(nil)");
        assert_eq!(Value::integer(-3).to_string(), "(integer) -3");
        assert_eq!(Value::simple("OK").to_string(), "OK");
        assert_eq!(Value::bulk("bar").to_string(), "\"bar\"");
        assert_eq!(Value::bulk(&b"a\r\n"[..]).to_string(), "\"a\\r\\n\"");
        assert_eq!(Value::error("ERR nope").to_string(), "(error) ERR nope");
        assert_eq!(Value::boolean(false).to_string(), "(false)");
        assert_eq!(Value::array(vec![]).to_string(), "(empty array)");
    }

    #[test]
    fn test_display_nested_array() {
        let value = Value::array(vec![
            Value::bulk("a"),
            Value::array(vec![Value::integer(1), Value::integer(2)]),
        ]);
        assert_eq!(
            value.to_string(),
            "1) \"a\"\n2) 1) (integer) 1\n   2) (integer) 2"
        );
    }

    #[test]
    fn test_deeply_nested_display_and_drop() {
        let mut value = Value::integer(1);
        for _ in 0..100_000 {
            value = Value::array(vec![value]);
        }
        let rendered = value.to_string();
        assert!(rendered.starts_with("1) 1) 1) "));
        assert!(rendered.ends_with(") (integer) 1"));
        assert_eq!(rendered.len(), 100_000 * 3 + "(integer) 1".len());
        drop(value);
    }
}
