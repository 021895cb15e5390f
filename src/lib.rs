//! # PackStream
//!
//! Decode a stream of MessagePack values from a byte transport that delivers
//! data in arbitrarily sized chunks.
//!
//! ## Overview
//!
//! Transports such as sockets and pipes do not respect message boundaries: one
//! read may hold half a value, several values, or the tail of one value and the
//! head of the next. `packstream` keeps the undecoded tail in a single buffer,
//! decodes as many complete values as it can from the front after every chunk,
//! and hands them out in stream order.
//!
//! ## Key Features
//!
//! * **Boundary independent**: Any split of the same bytes yields the same values
//! * **Bounded memory**: Only the bytes of the one incomplete value stay buffered
//! * **Pluggable codec**: The `Codec` trait reports Complete/Incomplete/Malformed
//!   with the consumed byte count as part of the result
//! * **Explicit failure policy**: Malformed input either faults the framer or
//!   clears its buffer, chosen per instance
//!
//! ## Quick Start
//!
//! ```rust
//! use packstream::*;
//! use std::io::Cursor;
//!
//! fn main() -> Result<()> {
//!     // Encode a few values back to back
//!     let mut writer = StreamWriter::new(Vec::new());
//!     writer.write(&Value::from("hello"))?;
//!     writer.write(&Value::from(42u32))?;
//!     let bytes = writer.into_inner();
//!
//!     // Read them back through a transport that returns 3 bytes at a time
//!     let config = FramerConfig::default().with_read_size(3);
//!     let mut framer = StreamFramer::with_config(Cursor::new(bytes), MsgPackCodec::new(), config);
//!
//!     let mut values = Vec::new();
//!     framer.process_all(|value| {
//!         values.push(value);
//!         Ok(())
//!     })?;
//!
//!     assert_eq!(values, vec![Value::from("hello"), Value::from(42u32)]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! * **`Codec`**: Encodes one value and decodes one value from the front of a slice
//! * **`Accumulator`**: The contiguous buffer of received-but-undecoded bytes
//! * **`StreamFramer`**: Drives the decode loop per chunk and emits values to a `Subscriber`
//! * **`StreamWriter`**: Send-only helper for producers

pub mod accumulator;
pub mod codec;
pub mod error;
pub mod framer;
pub mod value;
pub mod writer;

// Re-export the main public API for user convenience.
pub use accumulator::Accumulator;
pub use codec::{pack, unpack, Codec, DecodeOutcome, Malformed, MsgPackCodec};
pub use error::{Error, Result};
pub use framer::{
    FramerConfig, FramerState, Handlers, MalformedPolicy, StreamFramer, Subscriber, Values,
};
pub use value::Value;
pub use writer::StreamWriter;
