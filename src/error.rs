use thiserror::Error;

/// Custom error types for the packstream library.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O errors from the wrapped transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The buffered bytes can never form a valid value at this position.
    #[error("Malformed encoding at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    /// Undecoded bytes grew past the configured cap.
    #[error("Buffered {buffered} undecoded bytes, limit is {limit}")]
    BufferLimitExceeded { buffered: usize, limit: usize },

    /// The framer hit malformed input earlier and no longer processes chunks.
    #[error("Stream is faulted after a previous decode failure")]
    Faulted,

    /// A value could not be encoded (e.g., a length beyond the wire format's range).
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// The transport reached end of file with a partial value still buffered.
    #[error("Unexpected end of stream with {buffered} undecoded bytes")]
    UnexpectedEof { buffered: usize },
}

impl Error {
    /// Create a new `Malformed` error at the given offset.
    pub fn malformed(offset: usize, reason: &'static str) -> Self {
        Self::Malformed { offset, reason }
    }

    /// Create a new `Encode` error with a descriptive message.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Create a new `BufferLimitExceeded` error.
    pub fn buffer_limit(buffered: usize, limit: usize) -> Self {
        Self::BufferLimitExceeded { buffered, limit }
    }

    /// Whether this error leaves the framer unable to make progress on its own.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. } | Self::BufferLimitExceeded { .. }
        )
    }
}

/// Result type alias for the library operations.
pub type Result<T> = std::result::Result<T, Error>;
