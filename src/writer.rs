//! A generic, composable writer for `packstream`.

use crate::codec::{Codec, MsgPackCodec};
use crate::error::Result;
use std::io::Write;

/// A writer for streaming encoded values to a byte sink.
///
/// This is the send-only half of a stream: each value is encoded back to back
/// with no extra framing, so any `StreamFramer` reading the other end recovers
/// the same sequence. One scratch buffer is reused across writes.
///
/// The writer provides three levels of API:
/// 1. `write()` - Encode and write a single value
/// 2. `write_all()` - Encode a batch of values into a single write
/// 3. `write_encoded()` - Pass already-encoded bytes through unchanged
pub struct StreamWriter<W: Write, C: Codec = MsgPackCodec> {
    writer: W,
    codec: C,
    scratch: Vec<u8>,
}

impl<W: Write> StreamWriter<W, MsgPackCodec> {
    /// Creates a new `StreamWriter` using the MessagePack codec.
    pub fn new(writer: W) -> Self {
        Self::with_codec(writer, MsgPackCodec::new())
    }
}

impl<W: Write, C: Codec> StreamWriter<W, C> {
    /// Creates a new `StreamWriter` with an explicit codec.
    pub fn with_codec(writer: W, codec: C) -> Self {
        Self {
            writer,
            codec,
            scratch: Vec::new(),
        }
    }

    /// Encodes a value and writes it to the stream.
    pub fn write(&mut self, item: &C::Item) -> Result<()> {
        write_item(&mut self.writer, &self.codec, &mut self.scratch, item)
    }

    /// Encodes every value into one buffer and writes it with a single call.
    ///
    /// If any value fails to encode, nothing is written.
    pub fn write_all<'a, I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a C::Item>,
        C::Item: 'a,
    {
        write_items(&mut self.writer, &self.codec, &mut self.scratch, items)
    }

    /// Writes bytes that are already encoded.
    pub fn write_encoded(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes the writer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub(crate) fn write_item<W: Write, C: Codec>(
    writer: &mut W,
    codec: &C,
    scratch: &mut Vec<u8>,
    item: &C::Item,
) -> Result<()> {
    scratch.clear();
    codec.encode(item, scratch)?;
    writer.write_all(scratch)?;
    Ok(())
}

pub(crate) fn write_items<'a, W, C, I>(
    writer: &mut W,
    codec: &C,
    scratch: &mut Vec<u8>,
    items: I,
) -> Result<()>
where
    W: Write,
    C: Codec,
    C::Item: 'a,
    I: IntoIterator<Item = &'a C::Item>,
{
    scratch.clear();
    for item in items {
        codec.encode(item, scratch)?;
    }
    writer.write_all(scratch)?;
    Ok(())
}
