//! RESP (Redis Serialization Protocol) codec
//!
//! Client side of the protocol: commands are encoded as arrays of bulk
//! strings, replies are decoded incrementally from a growing read buffer.
//! Based on the RESP3 specification: https://redis.io/docs/reference/protocol-spec/

use bytes::{Buf, BytesMut};
use std::io::{self, Write};
use thiserror::Error;

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum RespError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protocol parsing error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid encoding
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

pub type RespResult<T> = Result<T, RespError>;

/// Largest bulk string accepted from the wire (the Redis limit)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest array length accepted from the wire
pub const MAX_ARRAY_LEN: usize = 1 << 24;

/// Smallest encoding of one element (`_\r\n`)
const MIN_ELEMENT_LEN: usize = 3;

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string: +OK\r\n
    SimpleString(String),
    /// Error: -ERR message\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $6\r\nfoobar\r\n (or $-1\r\n for null)
    BulkString(Option<Vec<u8>>),
    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n (or *-1\r\n for null)
    Array(Vec<RespValue>),
    /// Double: ,3.14\r\n (RESP3)
    Double(f64),
    /// Null: _\r\n (RESP3)
    Null,
}

impl RespValue {
    /// Build a command array from its arguments
    pub fn command<I, S>(args: I) -> RespValue
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RespValue::Array(
            args.into_iter()
                .map(|a| RespValue::BulkString(Some(a.as_ref().as_bytes().to_vec())))
                .collect(),
        )
    }

    /// Encode RESP value to bytes
    pub fn encode(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            RespValue::SimpleString(s) => {
                write!(buf, "+{}\r\n", s)?;
            }
            RespValue::Error(e) => {
                write!(buf, "-{}\r\n", e)?;
            }
            RespValue::Integer(i) => {
                write!(buf, ":{}\r\n", i)?;
            }
            RespValue::BulkString(None) => {
                write!(buf, "$-1\r\n")?;
            }
            RespValue::BulkString(Some(data)) => {
                write!(buf, "${}\r\n", data.len())?;
                buf.extend_from_slice(data);
                write!(buf, "\r\n")?;
            }
            RespValue::Array(items) => {
                write!(buf, "*{}\r\n", items.len())?;
                for item in items {
                    item.encode(buf)?;
                }
            }
            RespValue::Double(d) => {
                if d.is_nan() {
                    write!(buf, ",nan\r\n")?;
                } else if d.is_infinite() {
                    let sign = if *d < 0.0 { "-" } else { "" };
                    write!(buf, ",{}inf\r\n", sign)?;
                } else {
                    write!(buf, ",{}\r\n", d)?;
                }
            }
            RespValue::Null => {
                write!(buf, "_\r\n")?;
            }
        }
        Ok(())
    }

    /// Decode one complete value from the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when more bytes are
    /// needed. Stateless: each call rescans `buf`. Readers that append to
    /// the buffer in chunks should keep a [`RespDecoder`] instead.
    pub fn decode(buf: &mut BytesMut) -> RespResult<Option<RespValue>> {
        RespDecoder::new().decode(buf)
    }

    /// Parse the value starting at `pos`. Returns the value and the offset
    /// just past it.
    fn parse(data: &[u8], pos: usize) -> RespResult<Option<(RespValue, usize)>> {
        let Some((line, next)) = Self::read_line(data, pos) else {
            return Ok(None);
        };
        if line.is_empty() {
            return Err(RespError::Protocol("Empty RESP line".to_string()));
        }
        let body = &line[1..];

        match line[0] {
            b'+' => Ok(Some((RespValue::SimpleString(Self::utf8(body)?), next))),
            b'-' => Ok(Some((RespValue::Error(Self::utf8(body)?), next))),
            b':' => Ok(Some((RespValue::Integer(Self::number(body, "integer")?), next))),
            b',' => {
                let s = Self::utf8(body)?;
                let d = match s.as_str() {
                    "inf" => f64::INFINITY,
                    "nan" => f64::NAN,
                    "-inf" => f64::NEG_INFINITY,
                    other => other
                        .parse::<f64>()
                        .map_err(|e| RespError::Protocol(format!("Invalid double: {}", e)))?,
                };
                Ok(Some((RespValue::Double(d), next)))
            }
            b'_' => {
                if body.is_empty() {
                    Ok(Some((RespValue::Null, next)))
                } else {
                    Err(RespError::Protocol("Invalid null value".to_string()))
                }
            }
            b'$' => {
                let Some(len) = Self::length(body, "bulk string length", MAX_BULK_LEN)? else {
                    return Ok(Some((RespValue::BulkString(None), next)));
                };
                if data.len() - next < len + 2 {
                    return Ok(None);
                }
                if &data[next + len..next + len + 2] != b"\r\n" {
                    return Err(RespError::Protocol(
                        "Missing \\r\\n after bulk string".to_string(),
                    ));
                }
                let payload = data[next..next + len].to_vec();
                Ok(Some((RespValue::BulkString(Some(payload)), next + len + 2)))
            }
            b'*' => {
                let Some(len) = Self::length(body, "array length", MAX_ARRAY_LEN)? else {
                    return Ok(Some((RespValue::Null, next)));
                };
                let mut elements = Vec::with_capacity(len.min((data.len() - next) / MIN_ELEMENT_LEN));
                let mut cursor = next;
                for _ in 0..len {
                    match Self::parse(data, cursor)? {
                        Some((value, after)) => {
                            elements.push(value);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((RespValue::Array(elements), cursor)))
            }
            other => Err(RespError::Protocol(format!(
                "Unknown RESP type: {}",
                other as char
            ))),
        }
    }

    /// Find the CRLF-terminated line starting at `pos`
    fn read_line(data: &[u8], pos: usize) -> Option<(&[u8], usize)> {
        let rest = data.get(pos..)?;
        let end = rest.windows(2).position(|w| w == b"\r\n")?;
        Some((&rest[..end], pos + end + 2))
    }

    fn utf8(bytes: &[u8]) -> RespResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| RespError::InvalidEncoding(e.to_string()))
    }

    fn number(bytes: &[u8], what: &str) -> RespResult<i64> {
        Self::utf8(bytes)?
            .parse::<i64>()
            .map_err(|e| RespError::Protocol(format!("Invalid {}: {}", what, e)))
    }

    /// Parse a length header. Negative means null; above `max` is rejected.
    fn length(bytes: &[u8], what: &str, max: usize) -> RespResult<Option<usize>> {
        let len = Self::number(bytes, what)?;
        if len < 0 {
            return Ok(None);
        }
        match usize::try_from(len) {
            Ok(len) if len <= max => Ok(Some(len)),
            _ => Err(RespError::Protocol(format!(
                "{} {} exceeds limit {}",
                what, len, max
            ))),
        }
    }

    /// Convert to array or error
    pub fn as_array(&self) -> RespResult<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Ok(arr),
            _ => Err(RespError::Protocol("Expected array".to_string())),
        }
    }

    /// Convert to bulk string or error
    pub fn as_bulk_string(&self) -> RespResult<Option<&[u8]>> {
        match self {
            RespValue::BulkString(Some(data)) => Ok(Some(data)),
            RespValue::BulkString(None) => Ok(None),
            _ => Err(RespError::Protocol("Expected bulk string".to_string())),
        }
    }

    /// Convert a bulk or simple string to UTF-8
    pub fn as_string(&self) -> RespResult<Option<String>> {
        match self {
            RespValue::SimpleString(s) => Ok(Some(s.clone())),
            _ => match self.as_bulk_string()? {
                Some(bytes) => Ok(Some(Self::utf8(bytes)?)),
                None => Ok(None),
            },
        }
    }
}

/// Incremental decoder for a buffer that grows between reads.
///
/// Remembers how far the current frame has been scanned and how many
/// elements each open array still expects, so appending a chunk only costs
/// a scan of the new bytes. The value is built once the frame is complete.
#[derive(Debug, Default)]
pub struct RespDecoder {
    pos: usize,
    pending: Vec<usize>,
}

impl RespDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one value from the front of `buf`, or `Ok(None)` when the
    /// frame is still incomplete. `buf` is only consumed on success.
    pub fn decode(&mut self, buf: &mut BytesMut) -> RespResult<Option<RespValue>> {
        let end = match self.scan(&buf[..]) {
            Ok(Some(end)) => end,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        self.reset();
        match RespValue::parse(&buf[..end], 0)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Err(RespError::Protocol("Truncated frame".to_string())),
        }
    }

    /// Forget partial progress, e.g. after the connection was replaced
    pub fn reset(&mut self) {
        self.pos = 0;
        self.pending.clear();
    }

    /// Advance over complete elements. Returns the frame end once the
    /// outermost value is complete.
    fn scan(&mut self, data: &[u8]) -> RespResult<Option<usize>> {
        loop {
            let Some((line, next)) = RespValue::read_line(data, self.pos) else {
                return Ok(None);
            };
            if line.is_empty() {
                return Err(RespError::Protocol("Empty RESP line".to_string()));
            }
            let body = &line[1..];

            let end = match line[0] {
                b'+' | b'-' | b':' | b',' | b'_' => next,
                b'$' => match RespValue::length(body, "bulk string length", MAX_BULK_LEN)? {
                    None => next,
                    Some(len) => {
                        if data.len() - next < len + 2 {
                            return Ok(None);
                        }
                        next + len + 2
                    }
                },
                b'*' => match RespValue::length(body, "array length", MAX_ARRAY_LEN)? {
                    Some(len) if len > 0 => {
                        self.pending.push(len);
                        self.pos = next;
                        continue;
                    }
                    _ => next,
                },
                other => {
                    return Err(RespError::Protocol(format!(
                        "Unknown RESP type: {}",
                        other as char
                    )))
                }
            };
            self.pos = end;

            // one element finished; close every array it completes
            loop {
                match self.pending.last_mut() {
                    None => return Ok(Some(self.pos)),
                    Some(remaining) => {
                        *remaining -= 1;
                        if *remaining > 0 {
                            break;
                        }
                        self.pending.pop();
                    }
                }
            }
        }
    }
}
