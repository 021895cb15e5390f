//! Defines the codec contract used by the framer and the MessagePack implementation.

use crate::error::{Error, Result};
use crate::value::Value;

//--- Codec Trait and Decode Outcome ---

/// A trait that defines how one application value maps to and from bytes.
///
/// Purpose: Keep the wire format out of the framer. The framer only ever asks
/// "is there one complete value at the front of this slice, and how long is it?"
pub trait Codec {
    type Item;

    /// Appends the encoding of `item` to `out`.
    fn encode(&self, item: &Self::Item, out: &mut Vec<u8>) -> Result<()>;

    /// Attempts to decode exactly one value from the front of `buf`.
    ///
    /// Must be pure: the byte count consumed is carried in the returned
    /// outcome, never stored anywhere else.
    fn decode(&self, buf: &[u8]) -> DecodeOutcome<Self::Item>;
}

/// The three-way result of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome<T> {
    /// A full value was decoded from the first `consumed` bytes.
    Complete { value: T, consumed: usize },
    /// The bytes seen so far are a valid prefix; more are needed.
    Incomplete,
    /// No amount of additional bytes can make this position decodable.
    Malformed(Malformed),
}

impl<T> DecodeOutcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, DecodeOutcome::Complete { .. })
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeOutcome::Incomplete)
    }

    /// Converts the outcome into the `Result<Option<..>>` shape used elsewhere
    /// in the crate: `Ok(None)` means more bytes are needed.
    pub fn into_result(self) -> Result<Option<(T, usize)>> {
        match self {
            DecodeOutcome::Complete { value, consumed } => Ok(Some((value, consumed))),
            DecodeOutcome::Incomplete => Ok(None),
            DecodeOutcome::Malformed(m) => Err(m.into()),
        }
    }
}

/// Location and cause of an undecodable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Malformed {
    /// Offset of the offending byte, relative to the start of the decode view.
    pub offset: usize,
    pub reason: &'static str,
}

impl From<Malformed> for Error {
    fn from(m: Malformed) -> Self {
        Error::malformed(m.offset, m.reason)
    }
}

//--- MessagePack ---

/// Nesting limit applied by `MsgPackCodec::new()`.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// MessagePack codec over [`Value`].
///
/// When to use: The default codec for `StreamFramer`. Supports the full type
/// set of the format, including bin and ext families. The never-used marker
/// `0xc1` and strings that are not UTF-8 are reported as malformed.
#[derive(Debug, Clone, Copy)]
pub struct MsgPackCodec {
    max_depth: usize,
}

impl MsgPackCodec {
    /// Creates a new `MsgPackCodec` with the default nesting limit.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a codec that rejects containers nested deeper than `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for MsgPackCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for MsgPackCodec {
    type Item = Value;

    fn encode(&self, item: &Value, out: &mut Vec<u8>) -> Result<()> {
        write_value(out, item)
    }

    fn decode(&self, buf: &[u8]) -> DecodeOutcome<Value> {
        let mut decoder = Decoder {
            buf,
            pos: 0,
            max_depth: self.max_depth,
        };
        match decoder.value(0) {
            Ok(value) => DecodeOutcome::Complete {
                value,
                consumed: decoder.pos,
            },
            Err(Stop::Incomplete) => DecodeOutcome::Incomplete,
            Err(Stop::Malformed(m)) => DecodeOutcome::Malformed(m),
        }
    }
}

/// Packs each value back to back into one buffer.
pub fn pack(values: &[Value]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for value in values {
        write_value(&mut out, value)?;
    }
    Ok(out)
}

/// Decodes the first value in `buf`, returning it with the number of bytes it used.
///
/// Returns `Ok(None)` if `buf` ends before the value does.
pub fn unpack(buf: &[u8]) -> Result<Option<(Value, usize)>> {
    MsgPackCodec::new().decode(buf).into_result()
}

//--- Decoding ---

enum Stop {
    Incomplete,
    Malformed(Malformed),
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl<'a> Decoder<'a> {
    fn malformed(offset: usize, reason: &'static str) -> Stop {
        Stop::Malformed(Malformed { offset, reason })
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], Stop> {
        let end = self.pos.checked_add(n).ok_or(Stop::Incomplete)?;
        let bytes = self.buf.get(self.pos..end).ok_or(Stop::Incomplete)?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], Stop> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> std::result::Result<u8, Stop> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> std::result::Result<u16, Stop> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> std::result::Result<u32, Stop> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> std::result::Result<u64, Stop> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn value(&mut self, depth: usize) -> std::result::Result<Value, Stop> {
        let start = self.pos;
        let marker = self.u8()?;
        let value = match marker {
            0x00..=0x7f => Value::UInt(u64::from(marker)),
            0x80..=0x8f => self.map(start, usize::from(marker & 0x0f), depth)?,
            0x90..=0x9f => self.seq(start, usize::from(marker & 0x0f), depth)?,
            0xa0..=0xbf => self.str(start, usize::from(marker & 0x1f))?,
            0xc0 => Value::Nil,
            0xc1 => return Err(Self::malformed(start, "reserved marker byte 0xc1")),
            0xc2 => Value::Bool(false),
            0xc3 => Value::Bool(true),
            0xc4 => {
                let len = usize::from(self.u8()?);
                Value::Bin(self.take(len)?.to_vec())
            }
            0xc5 => {
                let len = usize::from(self.u16()?);
                Value::Bin(self.take(len)?.to_vec())
            }
            0xc6 => {
                let len = self.u32()? as usize;
                Value::Bin(self.take(len)?.to_vec())
            }
            0xc7 => {
                let len = usize::from(self.u8()?);
                self.ext(len)?
            }
            0xc8 => {
                let len = usize::from(self.u16()?);
                self.ext(len)?
            }
            0xc9 => {
                let len = self.u32()? as usize;
                self.ext(len)?
            }
            0xca => Value::F32(f32::from_bits(self.u32()?)),
            0xcb => Value::F64(f64::from_bits(self.u64()?)),
            0xcc => Value::UInt(u64::from(self.u8()?)),
            0xcd => Value::UInt(u64::from(self.u16()?)),
            0xce => Value::UInt(u64::from(self.u32()?)),
            0xcf => Value::UInt(self.u64()?),
            0xd0 => signed(i64::from(self.u8()? as i8)),
            0xd1 => signed(i64::from(self.u16()? as i16)),
            0xd2 => signed(i64::from(self.u32()? as i32)),
            0xd3 => signed(self.u64()? as i64),
            0xd4 => self.ext(1)?,
            0xd5 => self.ext(2)?,
            0xd6 => self.ext(4)?,
            0xd7 => self.ext(8)?,
            0xd8 => self.ext(16)?,
            0xd9 => {
                let len = usize::from(self.u8()?);
                self.str(start, len)?
            }
            0xda => {
                let len = usize::from(self.u16()?);
                self.str(start, len)?
            }
            0xdb => {
                let len = self.u32()? as usize;
                self.str(start, len)?
            }
            0xdc => {
                let len = usize::from(self.u16()?);
                self.seq(start, len, depth)?
            }
            0xdd => {
                let len = self.u32()? as usize;
                self.seq(start, len, depth)?
            }
            0xde => {
                let len = usize::from(self.u16()?);
                self.map(start, len, depth)?
            }
            0xdf => {
                let len = self.u32()? as usize;
                self.map(start, len, depth)?
            }
            0xe0..=0xff => Value::Int(i64::from(marker as i8)),
        };
        Ok(value)
    }

    fn str(&mut self, start: usize, len: usize) -> std::result::Result<Value, Stop> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(|s| Value::Str(s.to_owned()))
            .map_err(|_| Self::malformed(start, "string is not valid UTF-8"))
    }

    fn ext(&mut self, len: usize) -> std::result::Result<Value, Stop> {
        let ty = self.u8()? as i8;
        Ok(Value::Ext(ty, self.take(len)?.to_vec()))
    }

    fn enter(&self, start: usize, depth: usize) -> std::result::Result<usize, Stop> {
        if depth >= self.max_depth {
            return Err(Self::malformed(start, "nesting exceeds maximum depth"));
        }
        Ok(depth + 1)
    }

    fn seq(&mut self, start: usize, len: usize, depth: usize) -> std::result::Result<Value, Stop> {
        let depth = self.enter(start, depth)?;
        // Every element takes at least one byte, so never reserve past what is buffered.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.value(depth)?);
        }
        Ok(Value::Array(items))
    }

    fn map(&mut self, start: usize, len: usize, depth: usize) -> std::result::Result<Value, Stop> {
        let depth = self.enter(start, depth)?;
        let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
        for _ in 0..len {
            let key = self.value(depth)?;
            let value = self.value(depth)?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}

fn signed(n: i64) -> Value {
    if n < 0 {
        Value::Int(n)
    } else {
        Value::UInt(n as u64)
    }
}

//--- Encoding ---

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Nil => out.push(0xc0),
        Value::Bool(false) => out.push(0xc2),
        Value::Bool(true) => out.push(0xc3),
        Value::UInt(n) => write_uint(out, *n),
        Value::Int(n) if *n >= 0 => write_uint(out, *n as u64),
        Value::Int(n) => write_negative(out, *n),
        Value::F32(f) => {
            out.push(0xca);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::F64(f) => {
            out.push(0xcb);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::Str(s) => {
            let len = wire_len(s.len(), "string")?;
            match len {
                0..=31 => out.push(0xa0 | len as u8),
                32..=0xff => out.extend_from_slice(&[0xd9, len as u8]),
                0x100..=0xffff => {
                    out.push(0xda);
                    out.extend_from_slice(&(len as u16).to_be_bytes());
                }
                _ => {
                    out.push(0xdb);
                    out.extend_from_slice(&len.to_be_bytes());
                }
            }
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bin(bytes) => {
            let len = wire_len(bytes.len(), "binary")?;
            write_sized_header(out, len, [0xc4, 0xc5, 0xc6]);
            out.extend_from_slice(bytes);
        }
        Value::Array(items) => {
            let len = wire_len(items.len(), "array")?;
            if len < 16 {
                out.push(0x90 | len as u8);
            } else {
                write_container_header(out, len, 0xdc, 0xdd);
            }
            for item in items {
                write_value(out, item)?;
            }
        }
        Value::Map(entries) => {
            let len = wire_len(entries.len(), "map")?;
            if len < 16 {
                out.push(0x80 | len as u8);
            } else {
                write_container_header(out, len, 0xde, 0xdf);
            }
            for (k, v) in entries {
                write_value(out, k)?;
                write_value(out, v)?;
            }
        }
        Value::Ext(ty, data) => {
            let len = wire_len(data.len(), "extension")?;
            match len {
                1 => out.push(0xd4),
                2 => out.push(0xd5),
                4 => out.push(0xd6),
                8 => out.push(0xd7),
                16 => out.push(0xd8),
                _ => write_sized_header(out, len, [0xc7, 0xc8, 0xc9]),
            }
            out.push(*ty as u8);
            out.extend_from_slice(data);
        }
    }
    Ok(())
}

fn wire_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::encode(format!("{what} length {len} exceeds 32-bit limit")))
}

/// Writes an 8/16/32-bit length header using the given marker family.
fn write_sized_header(out: &mut Vec<u8>, len: u32, markers: [u8; 3]) {
    if let Ok(n) = u8::try_from(len) {
        out.extend_from_slice(&[markers[0], n]);
    } else if let Ok(n) = u16::try_from(len) {
        out.push(markers[1]);
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        out.push(markers[2]);
        out.extend_from_slice(&len.to_be_bytes());
    }
}

fn write_container_header(out: &mut Vec<u8>, len: u32, marker16: u8, marker32: u8) {
    if let Ok(n) = u16::try_from(len) {
        out.push(marker16);
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        out.push(marker32);
        out.extend_from_slice(&len.to_be_bytes());
    }
}

fn write_uint(out: &mut Vec<u8>, n: u64) {
    if n < 0x80 {
        out.push(n as u8);
    } else if let Ok(n) = u8::try_from(n) {
        out.extend_from_slice(&[0xcc, n]);
    } else if let Ok(n) = u16::try_from(n) {
        out.push(0xcd);
        out.extend_from_slice(&n.to_be_bytes());
    } else if let Ok(n) = u32::try_from(n) {
        out.push(0xce);
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        out.push(0xcf);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

fn write_negative(out: &mut Vec<u8>, n: i64) {
    if n >= -32 {
        out.push(n as i8 as u8);
    } else if let Ok(n) = i8::try_from(n) {
        out.extend_from_slice(&[0xd0, n as u8]);
    } else if let Ok(n) = i16::try_from(n) {
        out.push(0xd1);
        out.extend_from_slice(&n.to_be_bytes());
    } else if let Ok(n) = i32::try_from(n) {
        out.push(0xd2);
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        out.push(0xd3);
        out.extend_from_slice(&n.to_be_bytes());
    }
}
