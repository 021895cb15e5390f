//! Turns a chunked byte transport into a sequence of decoded values.

use crate::accumulator::Accumulator;
use crate::codec::{Codec, DecodeOutcome, MsgPackCodec};
use crate::error::{Error, Result};
use crate::writer::{write_item, write_items};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, trace};

/// Read size used by `pump()` unless configured otherwise.
pub const DEFAULT_READ_SIZE: usize = 8 * 1024;

//--- Subscribers ---

/// Receives the events produced while a chunk is processed.
///
/// Callback timing: `on_message` runs once per decoded value, in stream order,
/// before the call that delivered the completing chunk returns. The framer
/// keeps no reference to the value afterwards.
pub trait Subscriber<T> {
    fn on_message(&mut self, value: T);

    /// Called with malformed-input and buffer-limit errors before they are returned.
    fn on_error(&mut self, _error: &Error) {}
}

/// Collects every decoded value.
impl<T> Subscriber<T> for Vec<T> {
    fn on_message(&mut self, value: T) {
        self.push(value);
    }
}

/// Hands each value to a channel. Values sent after the receiver is gone are dropped.
impl<T> Subscriber<T> for std::sync::mpsc::Sender<T> {
    fn on_message(&mut self, value: T) {
        if self.send(value).is_err() {
            debug!("receiver disconnected, dropping decoded value");
        }
    }
}

/// A subscriber built from closures.
///
/// ```rust
/// # use packstream::{Handlers, StreamFramer, Value};
/// let mut framer = StreamFramer::new(std::io::empty());
/// let mut seen = 0;
/// let mut handlers = Handlers::new(|_v: Value| seen += 1)
///     .on_error(|e| eprintln!("stream error: {e}"));
/// framer.feed(vec![0x01, 0x02], &mut handlers).unwrap();
/// drop(handlers);
/// assert_eq!(seen, 2);
/// ```
pub struct Handlers<M, E = fn(&Error)> {
    message: M,
    error: E,
}

impl<M> Handlers<M> {
    pub fn new(message: M) -> Self {
        Self {
            message,
            error: |_| {},
        }
    }
}

impl<M, E> Handlers<M, E> {
    /// Replaces the error callback.
    pub fn on_error<E2: FnMut(&Error)>(self, error: E2) -> Handlers<M, E2> {
        Handlers {
            message: self.message,
            error,
        }
    }
}

impl<T, M: FnMut(T), E: FnMut(&Error)> Subscriber<T> for Handlers<M, E> {
    fn on_message(&mut self, value: T) {
        (self.message)(value)
    }

    fn on_error(&mut self, error: &Error) {
        (self.error)(error)
    }
}

//--- Configuration ---

/// What happens to a framer after it reports undecodable input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Keep the buffered bytes and refuse every later chunk with `Error::Faulted`.
    #[default]
    Fault,
    /// Drop the buffered bytes and keep accepting chunks.
    Clear,
}

/// Per-instance framer settings.
#[derive(Debug, Clone, Copy)]
pub struct FramerConfig {
    pub malformed: MalformedPolicy,
    /// Cap on undecoded bytes left over after a chunk is drained. `None` is unbounded.
    pub max_buffered: Option<usize>,
    /// Bytes requested from the transport per `pump()`.
    pub read_size: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            malformed: MalformedPolicy::Fault,
            max_buffered: None,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

impl FramerConfig {
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    pub fn with_max_buffered(mut self, limit: usize) -> Self {
        self.max_buffered = Some(limit);
        self
    }

    /// Sets the read size; zero is treated as one.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }
}

//--- Framer ---

/// Lifecycle of a framer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Nothing buffered.
    Idle,
    /// Part of a value is buffered, waiting for more bytes.
    Buffering,
    /// Decoding values out of a freshly extended buffer.
    Draining,
    /// A decode failure was reported under `MalformedPolicy::Fault`.
    Faulted,
}

/// A framer that decodes values out of arbitrarily split byte chunks.
///
/// The framer wraps a transport `T`. Bytes arrive through `feed()` (push style)
/// or, when `T: Read`, through `pump()`/`run()`/`process_all()` (pull style).
/// Each arrival appends to a single buffer, then values are decoded from its
/// front until the codec needs more bytes. Values are handed to the subscriber
/// in stream order before the call returns.
///
/// When `T: Write`, `send()` and friends encode values with the same codec and
/// write them to the transport.
///
/// ```rust
/// # use packstream::{StreamFramer, Value};
/// let mut framer = StreamFramer::new(std::io::empty());
/// let mut values: Vec<Value> = Vec::new();
///
/// // A one-character string split across two chunks.
/// assert_eq!(framer.feed(vec![0xa1], &mut values)?, 0);
/// assert_eq!(framer.feed(vec![0x61], &mut values)?, 1);
/// assert_eq!(values, vec![Value::from("a")]);
/// # Ok::<(), packstream::Error>(())
/// ```
pub struct StreamFramer<T, C: Codec = MsgPackCodec> {
    transport: T,
    codec: C,
    config: FramerConfig,
    accumulator: Accumulator,
    state: FramerState,
    scratch: Vec<u8>,
    read_buf: Vec<u8>,
}

impl<T> StreamFramer<T, MsgPackCodec> {
    /// Creates a new `StreamFramer` using the MessagePack codec and default settings.
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, MsgPackCodec::new())
    }
}

impl<T, C: Codec> StreamFramer<T, C> {
    pub fn with_codec(transport: T, codec: C) -> Self {
        Self::with_config(transport, codec, FramerConfig::default())
    }

    pub fn with_config(transport: T, codec: C, config: FramerConfig) -> Self {
        Self {
            transport,
            codec,
            config,
            accumulator: Accumulator::new(),
            state: FramerState::Idle,
            scratch: Vec::new(),
            read_buf: Vec::new(),
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Number of received bytes not yet attributed to a decoded value.
    pub fn buffered(&self) -> usize {
        self.accumulator.len()
    }

    /// The undecoded bytes, if any.
    pub fn pending(&self) -> Option<&[u8]> {
        self.accumulator.view()
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Processes one chunk arrival and returns how many values it completed.
    ///
    /// # Returns
    /// * `Ok(n)` - `n` values were passed to `subscriber` (possibly zero)
    /// * `Err(Error::Malformed)` - The buffered bytes can never decode
    /// * `Err(Error::BufferLimitExceeded)` - Leftover bytes exceed `max_buffered`
    /// * `Err(Error::Faulted)` - A previous failure faulted this instance
    ///
    /// Values decoded from the chunk before a failure have already been delivered.
    pub fn feed<S>(&mut self, chunk: Vec<u8>, subscriber: &mut S) -> Result<usize>
    where
        S: Subscriber<C::Item> + ?Sized,
    {
        if self.state == FramerState::Faulted {
            return Err(Error::Faulted);
        }
        trace!(
            chunk_len = chunk.len(),
            buffered = self.accumulator.len(),
            "chunk received"
        );
        self.accumulator.append(chunk);
        self.drain(subscriber)
    }

    fn drain<S>(&mut self, subscriber: &mut S) -> Result<usize>
    where
        S: Subscriber<C::Item> + ?Sized,
    {
        let mut emitted = 0;
        while let Some(view) = self.accumulator.view() {
            self.state = FramerState::Draining;
            match self.codec.decode(view) {
                DecodeOutcome::Complete { value, consumed } => {
                    trace!(consumed, "value decoded");
                    subscriber.on_message(value);
                    self.accumulator.trim(consumed);
                    emitted += 1;
                }
                DecodeOutcome::Incomplete => break,
                DecodeOutcome::Malformed(m) => {
                    return Err(self.fail(m.into(), subscriber));
                }
            }
        }
        self.accumulator.compact();

        self.state = if self.accumulator.is_empty() {
            FramerState::Idle
        } else {
            FramerState::Buffering
        };

        if let Some(limit) = self.config.max_buffered {
            let buffered = self.accumulator.len();
            if buffered > limit {
                return Err(self.fail(Error::buffer_limit(buffered, limit), subscriber));
            }
        }

        Ok(emitted)
    }

    fn fail<S>(&mut self, error: Error, subscriber: &mut S) -> Error
    where
        S: Subscriber<C::Item> + ?Sized,
    {
        subscriber.on_error(&error);
        self.accumulator.compact();
        match self.config.malformed {
            MalformedPolicy::Fault => {
                debug!(%error, buffered = self.accumulator.len(), "framer faulted");
                self.state = FramerState::Faulted;
            }
            MalformedPolicy::Clear => {
                debug!(%error, discarded = self.accumulator.len(), "discarding buffered bytes");
                self.accumulator.clear();
                self.state = FramerState::Idle;
            }
        }
        error
    }

    /// Drops buffered bytes and clears a fault.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.state = FramerState::Idle;
    }

    /// Detaches from the transport, discarding any undecoded bytes.
    pub fn into_inner(self) -> T {
        if !self.accumulator.is_empty() {
            debug!(
                discarded = self.accumulator.len(),
                "detaching with undecoded bytes"
            );
        }
        self.transport
    }

    /// Detaches from the transport, failing if a partial value is still buffered.
    pub fn finish(self) -> Result<T> {
        match self.accumulator.len() {
            0 => Ok(self.transport),
            buffered => Err(Error::UnexpectedEof { buffered }),
        }
    }

    /// Sizes the reused read buffer to the configured read size.
    fn prepare_read_buf(&mut self) {
        self.read_buf.resize(self.config.read_size, 0);
    }

    /// Feeds the first `n` bytes of the read buffer as a right-sized chunk.
    fn feed_read<S>(&mut self, n: usize, subscriber: &mut S) -> Result<usize>
    where
        S: Subscriber<C::Item> + ?Sized,
    {
        let chunk = self.read_buf[..n].to_vec();
        self.feed(chunk, subscriber)
    }
}

impl<T: Read, C: Codec> StreamFramer<T, C> {
    /// Reads one chunk from the transport and feeds it.
    ///
    /// Returns `Ok(None)` at end of stream, otherwise the number of values the
    /// chunk completed. Interrupted reads are retried.
    pub fn pump<S>(&mut self, subscriber: &mut S) -> Result<Option<usize>>
    where
        S: Subscriber<C::Item> + ?Sized,
    {
        if self.state == FramerState::Faulted {
            return Err(Error::Faulted);
        }
        self.prepare_read_buf();
        let n = loop {
            match self.transport.read(&mut self.read_buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            trace!(buffered = self.accumulator.len(), "transport reached end of stream");
            return Ok(None);
        }
        self.feed_read(n, subscriber).map(Some)
    }

    /// Pumps until end of stream, returning the total number of values emitted.
    ///
    /// A trailing partial value is left buffered; use `finish()` to treat it as an error.
    pub fn run<S>(&mut self, subscriber: &mut S) -> Result<usize>
    where
        S: Subscriber<C::Item> + ?Sized,
    {
        let mut total = 0;
        while let Some(n) = self.pump(subscriber)? {
            total += n;
        }
        Ok(total)
    }

    /// Processes every value in the stream using a closure.
    ///
    /// Values are handed over one chunk at a time, in order. The closure returns
    /// `Ok(())` to continue or an error to stop; values decoded from the same
    /// chunk after the failing one are dropped.
    pub fn process_all<F>(&mut self, mut processor: F) -> Result<()>
    where
        F: FnMut(C::Item) -> Result<()>,
    {
        let mut batch: Vec<C::Item> = Vec::new();
        loop {
            let pumped = self.pump(&mut batch);
            for value in batch.drain(..) {
                processor(value)?;
            }
            if pumped?.is_none() {
                return Ok(());
            }
        }
    }

    /// Returns an iterator over decoded values.
    ///
    /// This is the pull-style path for callers that need their own control
    /// flow. The iterator ends at end of stream or after yielding one error.
    pub fn values(&mut self) -> Values<'_, T, C> {
        Values {
            framer: self,
            pending: VecDeque::new(),
            error: None,
            done: false,
        }
    }
}

impl<T: Write, C: Codec> StreamFramer<T, C> {
    /// Encodes a value and writes it to the transport.
    pub fn send(&mut self, item: &C::Item) -> Result<()> {
        write_item(&mut self.transport, &self.codec, &mut self.scratch, item)
    }

    /// Encodes each value and writes them with a single transport write.
    pub fn send_all<'a, I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a C::Item>,
        C::Item: 'a,
    {
        write_items(&mut self.transport, &self.codec, &mut self.scratch, items)
    }

    /// Writes already-encoded bytes to the transport unchanged.
    pub fn send_encoded(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.transport.flush()?;
        Ok(())
    }
}

/// An iterator over the values of a framer's transport.
///
/// Yields `Ok(value)` in stream order. A transport or decode error is yielded
/// once, after any values that the same chunk completed before it, and ends
/// the iteration.
pub struct Values<'a, T: Read, C: Codec> {
    framer: &'a mut StreamFramer<T, C>,
    pending: VecDeque<C::Item>,
    error: Option<Error>,
    done: bool,
}

impl<T: Read, C: Codec> Iterator for Values<'_, T, C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return Some(Ok(value));
            }
            if let Some(error) = self.error.take() {
                return Some(Err(error));
            }
            if self.done {
                return None;
            }
            let mut batch: Vec<C::Item> = Vec::new();
            let result = self.framer.pump(&mut batch);
            self.pending.extend(batch);
            match result {
                Ok(Some(_)) => {}
                Ok(None) => self.done = true,
                Err(e) => {
                    self.error = Some(e);
                    self.done = true;
                }
            }
        }
    }
}

#[cfg(feature = "tokio")]
mod async_io {
    use super::*;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    impl<T: AsyncRead + Unpin, C: Codec> StreamFramer<T, C> {
        /// Async counterpart of `pump()`.
        pub async fn pump_async<S>(&mut self, subscriber: &mut S) -> Result<Option<usize>>
        where
            S: Subscriber<C::Item> + ?Sized,
        {
            if self.state == FramerState::Faulted {
                return Err(Error::Faulted);
            }
            self.prepare_read_buf();
            let n = AsyncReadExt::read(&mut self.transport, &mut self.read_buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.feed_read(n, subscriber).map(Some)
        }

        /// Async counterpart of `run()`.
        pub async fn run_async<S>(&mut self, subscriber: &mut S) -> Result<usize>
        where
            S: Subscriber<C::Item> + ?Sized,
        {
            let mut total = 0;
            while let Some(n) = self.pump_async(subscriber).await? {
                total += n;
            }
            Ok(total)
        }
    }

    impl<T: AsyncWrite + Unpin, C: Codec> StreamFramer<T, C> {
        /// Async counterpart of `send()`.
        pub async fn send_async(&mut self, item: &C::Item) -> Result<()> {
            self.scratch.clear();
            self.codec.encode(item, &mut self.scratch)?;
            AsyncWriteExt::write_all(&mut self.transport, &self.scratch).await?;
            Ok(())
        }

        /// Async counterpart of `send_encoded()`.
        pub async fn send_encoded_async(&mut self, bytes: &[u8]) -> Result<()> {
            AsyncWriteExt::write_all(&mut self.transport, bytes).await?;
            Ok(())
        }

        pub async fn flush_async(&mut self) -> Result<()> {
            AsyncWriteExt::flush(&mut self.transport).await?;
            Ok(())
        }
    }
}
