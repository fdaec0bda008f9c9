//! RESP parser.
//!
//! Decodes one frame at a time from the front of a buffer. The buffer may
//! hold trailing bytes of later frames; the parser reports how many bytes
//! the decoded frame occupied so the caller can advance past it.
//!
//! A short buffer is reported as [`ParseResult::Incomplete`], which is
//! retryable once more bytes arrive. Malformed input is
//! [`ParseResult::Error`]. Neither is ever reported as a `Null` value.

use super::value::{ProtocolVersion, Value};
use bytes::Bytes;
use thiserror::Error;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

const NULL: u8 = b'_';
const INTEGER: u8 = b':';
const DOUBLE: u8 = b',';
const SIMPLE_STRING: u8 = b'+';
const BULK_STRING: u8 = b'$';
const SIMPLE_ERROR: u8 = b'-';
const ARRAY: u8 = b'*';
const BOOLEAN: u8 = b'#';

// RESP3 kinds the value model does not represent. Only `measure` knows them.
const BIG_NUMBER: u8 = b'(';
const BULK_ERROR: u8 = b'!';
const VERBATIM: u8 = b'=';
const MAP: u8 = b'%';
const SET: u8 = b'~';
const PUSH: u8 = b'>';
const ATTRIBUTE: u8 = b'|';

const TRUE: u8 = b't';
const FALSE: u8 = b'f';

/// Smallest possible encoded frame (`_\r\n`), used to bound preallocation.
const MIN_FRAME_LEN: usize = 3;

/// Malformed frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown frame type: {0:?}")]
    UnknownType(char),
    #[error("frame type {prefix:?} is not valid under {version}")]
    UnsupportedType { prefix: char, version: ProtocolVersion },
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid double: {0}")]
    InvalidDouble(String),
    #[error("invalid {kind} length: {len}")]
    InvalidLength { kind: &'static str, len: String },
    #[error("malformed {0} frame")]
    Malformed(&'static str),
}

/// Parse result
#[derive(Debug, PartialEq)]
pub enum ParseResult<T = Value> {
    /// Successfully parsed a frame with bytes consumed
    Complete(T, usize),
    /// Need more data
    Incomplete,
    /// Parse error
    Error(ParseError),
}

impl<T> ParseResult<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ParseResult<U> {
        match self {
            ParseResult::Complete(value, consumed) => ParseResult::Complete(f(value), consumed),
            ParseResult::Incomplete => ParseResult::Incomplete,
            ParseResult::Error(e) => ParseResult::Error(e),
        }
    }
}

/// `Ok(None)` means the buffer ended before the frame did.
type Step<T> = Result<Option<(T, usize)>, ParseError>;

impl<T> From<Step<T>> for ParseResult<T> {
    fn from(step: Step<T>) -> Self {
        match step {
            Ok(Some((value, consumed))) => ParseResult::Complete(value, consumed),
            Ok(None) => ParseResult::Incomplete,
            Err(e) => ParseResult::Error(e),
        }
    }
}

/// Unwrap a completed step, or propagate `Incomplete` to the caller.
macro_rules! complete {
    ($step:expr) => {
        match $step? {
            Some(done) => done,
            None => return Ok(None),
        }
    };
}

/// Decode a single value from the front of `buffer`.
pub fn decode(buffer: &[u8], version: ProtocolVersion) -> ParseResult {
    decode_value(buffer, version).into()
}

/// Find the length of the frame at the front of `buffer` without
/// building a value.
///
/// Understands every RESP3 frame type, including maps, sets, pushes and
/// attributes, so replies outside the value model can still be skipped.
pub fn measure(buffer: &[u8]) -> ParseResult<()> {
    measure_value(buffer).map(|done| done.map(|consumed| ((), consumed))).into()
}

/// One frame header: a finished leaf, or an array whose elements follow.
enum Header {
    Leaf(Value),
    Array(usize),
}

/// Array whose elements are still being decoded.
struct OpenArray {
    len: usize,
    items: Vec<Value>,
}

/// Nested arrays are tracked on a heap stack, so nesting depth is bounded
/// only by the buffer.
fn decode_value(buffer: &[u8], version: ProtocolVersion) -> Step<Value> {
    let mut open: Vec<OpenArray> = Vec::new();
    let mut offset = 0;

    loop {
        let (header, consumed) = complete!(decode_header(&buffer[offset..], version));
        offset += consumed;

        let mut value = match header {
            Header::Array(len) => {
                let capacity = len.min((buffer.len() - offset) / MIN_FRAME_LEN);
                open.push(OpenArray {
                    len,
                    items: Vec::with_capacity(capacity),
                });
                continue;
            }
            Header::Leaf(value) => value,
        };

        // Close every array this value completes.
        loop {
            let Some(mut array) = open.pop() else {
                return Ok(Some((value, offset)));
            };
            array.items.push(value);
            if array.items.len() < array.len {
                open.push(array);
                break;
            }
            value = Value::Array(array.items);
        }
    }
}

fn decode_header(buffer: &[u8], version: ProtocolVersion) -> Step<Header> {
    let Some(&prefix) = buffer.first() else {
        return Ok(None);
    };

    let leaf = match prefix {
        NULL => decode_null(buffer),
        INTEGER => decode_integer(buffer),
        DOUBLE => decode_double(buffer),
        SIMPLE_STRING => decode_simple_string(buffer, version),
        BULK_STRING => decode_bulk_string(buffer, version),
        SIMPLE_ERROR => decode_simple_error(buffer),
        ARRAY => return decode_array_header(buffer, version),
        BOOLEAN => match version {
            ProtocolVersion::V2 => Err(ParseError::UnsupportedType {
                prefix: BOOLEAN as char,
                version,
            }),
            ProtocolVersion::V3 => decode_boolean(buffer),
        },
        _ => Err(ParseError::UnknownType(prefix as char)),
    };

    Ok(leaf?.map(|(value, consumed)| (Header::Leaf(value), consumed)))
}

/// Find CRLF in buffer, return position of \r
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == [CR, LF])
}

/// Payload between the prefix byte and the first terminator.
fn read_line(buffer: &[u8]) -> Step<&[u8]> {
    Ok(find_crlf(buffer).map(|end| (&buffer[1..end], end + 2)))
}

fn line_str<'a>(line: &'a [u8], kind: &'static str) -> Result<&'a str, ParseError> {
    std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8(kind))
}

/// Parse a length or count header. `-1` is passed through; other negatives are rejected.
fn read_length(buffer: &[u8], kind: &'static str) -> Step<i64> {
    let (line, consumed) = complete!(read_line(buffer));
    let text = line_str(line, kind)?;
    let invalid = || ParseError::InvalidLength {
        kind,
        len: text.to_string(),
    };
    let len: i64 = text.parse().map_err(|_| invalid())?;
    if len < -1 {
        return Err(invalid());
    }
    Ok(Some((len, consumed)))
}

/// Parse a null: _\r\n
fn decode_null(buffer: &[u8]) -> Step<Value> {
    if buffer.len() < 3 {
        return Ok(None);
    }
    if buffer[1..3] != [CR, LF] {
        return Err(ParseError::Malformed("null"));
    }
    Ok(Some((Value::Null, 3)))
}

/// Parse an integer: :1000\r\n
fn decode_integer(buffer: &[u8]) -> Step<Value> {
    let (line, consumed) = complete!(read_line(buffer));
    let text = line_str(line, "integer")?;
    let n = text
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidInteger(text.to_string()))?;
    Ok(Some((Value::Integer(n), consumed)))
}

/// Parse a double: ,3.14\r\n
fn decode_double(buffer: &[u8]) -> Step<Value> {
    let (line, consumed) = complete!(read_line(buffer));
    let text = line_str(line, "double")?;
    let d = match text {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        "nan" | "-nan" => f64::NAN,
        _ => text
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidDouble(text.to_string()))?,
    };
    Ok(Some((Value::Double(d), consumed)))
}

/// Parse a simple string: +OK\r\n
fn decode_simple_string(buffer: &[u8], version: ProtocolVersion) -> Step<Value> {
    let (line, consumed) = complete!(read_line(buffer));
    let text = line_str(line, "simple string")?;
    let value = match (version, text) {
        // RESP2 carries booleans as these two simple strings.
        (ProtocolVersion::V2, "true") => Value::Boolean(true),
        (ProtocolVersion::V2, "false") => Value::Boolean(false),
        _ => Value::SimpleString(text.to_string()),
    };
    Ok(Some((value, consumed)))
}

/// Parse an error: -ERR message\r\n
fn decode_simple_error(buffer: &[u8]) -> Step<Value> {
    let (line, consumed) = complete!(read_line(buffer));
    let text = line_str(line, "simple error")?;
    Ok(Some((Value::SimpleError(text.to_string()), consumed)))
}

/// Parse a bulk string: $5\r\nhello\r\n, or the RESP2 null $-1\r\n
fn decode_bulk_string(buffer: &[u8], version: ProtocolVersion) -> Step<Value> {
    let (len, header) = complete!(read_length(buffer, "bulk string"));

    if len < 0 {
        return match version {
            ProtocolVersion::V2 => Ok(Some((Value::Null, header))),
            ProtocolVersion::V3 => Err(ParseError::InvalidLength {
                kind: "bulk string",
                len: len.to_string(),
            }),
        };
    }

    let (data, consumed) = complete!(read_payload(buffer, header, len as usize, "bulk string"));
    Ok(Some((Value::BulkString(Bytes::copy_from_slice(data)), consumed)))
}

/// Slice `len` payload bytes starting at `start` and check the trailing CRLF.
fn read_payload<'a>(
    buffer: &'a [u8],
    start: usize,
    len: usize,
    kind: &'static str,
) -> Step<&'a [u8]> {
    let end = start.saturating_add(len);
    let total = end.saturating_add(2);
    if buffer.len() < total {
        return Ok(None);
    }
    if buffer[end..total] != [CR, LF] {
        return Err(ParseError::Malformed(kind));
    }
    Ok(Some((&buffer[start..end], total)))
}

/// Parse an array header: *2\r\n. Empty and null arrays are complete leaves.
fn decode_array_header(buffer: &[u8], version: ProtocolVersion) -> Step<Header> {
    let (count, header) = complete!(read_length(buffer, "array"));

    let frame = if count < 0 {
        // `*-1` is the RESP2 null array.
        match version {
            ProtocolVersion::V2 => Header::Leaf(Value::Null),
            ProtocolVersion::V3 => {
                return Err(ParseError::InvalidLength {
                    kind: "array",
                    len: count.to_string(),
                })
            }
        }
    } else if count == 0 {
        Header::Leaf(Value::Array(Vec::new()))
    } else {
        Header::Array(count as usize)
    };

    Ok(Some((frame, header)))
}

/// Parse a boolean: #t\r\n or #f\r\n
fn decode_boolean(buffer: &[u8]) -> Step<Value> {
    if buffer.len() < 4 {
        return Ok(None);
    }
    let b = match buffer[1] {
        TRUE => true,
        FALSE => false,
        _ => return Err(ParseError::Malformed("boolean")),
    };
    if buffer[2..4] != [CR, LF] {
        return Err(ParseError::Malformed("boolean"));
    }
    Ok(Some((Value::Boolean(b), 4)))
}

fn measure_value(buffer: &[u8]) -> Result<Option<usize>, ParseError> {
    // Elements still owed to each open aggregate, innermost last.
    let mut owed: Vec<usize> = Vec::new();
    let mut offset = 0;

    loop {
        let Some((children, consumed)) = measure_header(&buffer[offset..])? else {
            return Ok(None);
        };
        offset += consumed;
        if children > 0 {
            owed.push(children);
            continue;
        }

        loop {
            match owed.last_mut() {
                None => return Ok(Some(offset)),
                Some(remaining) => {
                    *remaining -= 1;
                    if *remaining > 0 {
                        break;
                    }
                }
            }
            owed.pop();
        }
    }
}

/// Length of one frame header and the number of child frames that follow it.
fn measure_header(buffer: &[u8]) -> Step<usize> {
    let Some(&prefix) = buffer.first() else {
        return Ok(None);
    };

    let frame = match prefix {
        NULL | INTEGER | DOUBLE | SIMPLE_STRING | SIMPLE_ERROR | BOOLEAN | BIG_NUMBER => {
            find_crlf(buffer).map(|end| (0, end + 2))
        }
        BULK_STRING | BULK_ERROR | VERBATIM => {
            let (len, header) = complete!(read_length(buffer, "bulk string"));
            if len < 0 {
                Some((0, header))
            } else {
                read_payload(buffer, header, len as usize, "bulk string")?
                    .map(|(_, total)| (0, total))
            }
        }
        ARRAY | SET | PUSH | MAP | ATTRIBUTE => {
            let (count, header) = complete!(read_length(buffer, "aggregate"));
            let count = count.max(0) as usize;
            let children = match prefix {
                MAP => count.saturating_mul(2),
                // Attributes annotate the frame that follows them.
                ATTRIBUTE => count.saturating_mul(2).saturating_add(1),
                _ => count,
            };
            Some((children, header))
        }
        _ => return Err(ParseError::UnknownType(prefix as char)),
    };

    Ok(frame)
}
