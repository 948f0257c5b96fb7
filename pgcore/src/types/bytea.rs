use bytes::Bytes;
use std::{fmt::Write, sync::Arc};

use crate::{client::Session, value::Value};

use super::{Converter, DynConverter, ParseError, ShapeError};

/// First server version with `bytea_output = hex`.
const HEX_OUTPUT_VERSION: u32 = 90000;

/// `bytea`.
///
/// Input accepts both hex (`\x0a0b`) and escape (`a\012b`) format. Output
/// format follows the bound server version.
#[derive(Debug, Clone, Copy)]
pub struct ByteaConverter {
    hex: bool,
}

impl ByteaConverter {
    pub const fn new() -> Self {
        Self { hex: true }
    }

    /// Legacy escape output, for servers older than 9.0.
    pub const fn escape() -> Self {
        Self { hex: false }
    }
}

impl Default for ByteaConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for ByteaConverter {
    fn name(&self) -> &str {
        "bytea"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let bytes = match text.strip_prefix("\\x") {
            Some(hex) => decode_hex(hex).map_err(|at| self.error(text, at + 2, "hex digit"))?,
            None => decode_escape(text).map_err(|at| self.error(text, at, "octal escape or `\\\\`"))?,
        };
        Ok(Value::Bytes(Bytes::from(bytes)))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let Value::Bytes(bytes) = value else {
            return Err(ShapeError::mismatch(self.name(), "bytes", value));
        };
        let mut out = String::with_capacity(bytes.len() * 2 + 2);
        match self.hex {
            true => {
                out.push_str("\\x");
                for b in bytes.iter() {
                    let _ = write!(out, "{b:02x}");
                }
            }
            false => {
                for &b in bytes.iter() {
                    match b {
                        b'\\' => out.push_str("\\\\"),
                        0x20..=0x7e => out.push(b as char),
                        b => {
                            let _ = write!(out, "\\{b:03o}");
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        let hex = session.server_version >= HEX_OUTPUT_VERSION;
        Some(Arc::new(Self { hex }))
    }
}

impl ByteaConverter {
    fn error(&self, text: &str, byte_pos: usize, expected: &'static str) -> ParseError {
        let offset = text[..byte_pos.min(text.len())].chars().count();
        ParseError::new(self.name(), expected, text, offset)
    }
}

/// On error, returns byte position in `hex`.
fn decode_hex(hex: &str) -> Result<Vec<u8>, usize> {
    let bytes = hex.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let hi = hex_digit(bytes[i]).ok_or(i)?;
        let lo = bytes.get(i + 1).copied().and_then(hex_digit).ok_or(i + 1)?;
        out.push(hi << 4 | lo);
        i += 2;
    }
    Ok(out)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_escape(text: &str) -> Result<Vec<u8>, usize> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1..i + 4) {
            Some(&[b'\\', ..]) => {
                out.push(b'\\');
                i += 2;
            }
            Some(&[a @ b'0'..=b'3', b @ b'0'..=b'7', c @ b'0'..=b'7']) => {
                out.push((a - b'0') << 6 | (b - b'0') << 3 | (c - b'0'));
                i += 4;
            }
            _ if bytes.get(i + 1) == Some(&b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            _ => return Err(i + 1),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_and_escape_input() {
        let expected = Value::Bytes(Bytes::from_static(b"\x00a\\\xff"));
        assert_eq!(ByteaConverter::new().parse("\\x0061 5cFF").unwrap(), expected);
        assert_eq!(ByteaConverter::new().parse("\\000a\\\\\\377").unwrap(), expected);
        assert_eq!(ByteaConverter::new().parse("\\x0g").unwrap_err().offset(), 3);
        assert!(ByteaConverter::new().parse("\\9").is_err());
    }

    #[test]
    fn output_follows_server_version() {
        let value = Value::Bytes(Bytes::from_static(b"a\\\x01"));
        let modern = ByteaConverter::new();
        assert_eq!(modern.format(&value).unwrap(), "\\x615c01");

        let legacy = modern.bind(&Session { server_version: 80400, ..Session::default() }).unwrap();
        assert_eq!(legacy.format(&value).unwrap(), "a\\\\\\001");
        assert_eq!(legacy.parse(&legacy.format(&value).unwrap()).unwrap(), value);
    }
}
