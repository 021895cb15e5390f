//! Holds the unread tail of a byte stream between chunk arrivals.

/// A single contiguous buffer of received-but-undecoded bytes.
///
/// `view()` always starts at the first undecoded byte. `trim()` only advances
/// a read offset, so draining many values from one chunk is linear; `compact()`
/// then moves the tail into an allocation sized to it. When a trim consumes
/// everything the allocation is dropped, so after a drain and compaction the
/// memory held is bounded by the one value that is still incomplete.
#[derive(Debug, Default)]
pub struct Accumulator {
    buf: Option<Vec<u8>>,
    start: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            buf: None,
            start: 0,
        }
    }

    /// Appends a chunk to the end of the buffered bytes.
    ///
    /// With nothing buffered the chunk becomes the buffer as-is (no copy).
    /// Empty chunks are ignored.
    pub fn append(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        match &mut self.buf {
            Some(buf) => buf.extend_from_slice(&chunk),
            None => {
                self.buf = Some(chunk);
                self.start = 0;
            }
        }
    }

    /// Returns the buffered bytes, or `None` if nothing is buffered.
    pub fn view(&self) -> Option<&[u8]> {
        self.buf.as_deref().map(|buf| &buf[self.start..])
    }

    /// Discards the first `consumed` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `consumed` is zero or larger than the buffered length. Both can
    /// only come from a codec that misreports how much it decoded.
    pub fn trim(&mut self, consumed: usize) {
        let len = self.len();
        assert!(
            consumed > 0 && consumed <= len,
            "trim of {consumed} bytes out of range for {len} buffered bytes"
        );
        if consumed == len {
            self.clear();
        } else {
            self.start += consumed;
        }
    }

    /// Moves the undecoded tail to the front of a right-sized allocation.
    ///
    /// A no-op when nothing has been trimmed since the last compaction.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        if let Some(buf) = &mut self.buf {
            *buf = buf[self.start..].to_vec();
        }
        self.start = 0;
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.buf = None;
        self.start = 0;
    }

    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, |buf| buf.len() - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_none()
    }

    /// Capacity of the live allocation; zero once the buffer has been released.
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map_or(0, Vec::capacity)
    }
}
