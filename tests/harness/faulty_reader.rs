use std::io::{Read, Result};

/// A transport that hands out bytes in controlled chunk sizes.
pub struct FaultyReader<R: Read> {
    inner: R,
    mode: FaultMode,
    counter: usize,
}

pub enum FaultMode {
    OneByteChunks,
    /// Chunk sizes taken in order, cycling once exhausted.
    Chunks(Vec<usize>),
    InterruptedEvery(usize),
    BrokenPipeAt(usize),
}

impl<R: Read> FaultyReader<R> {
    pub fn new(inner: R, mode: FaultMode) -> Self {
        Self {
            inner,
            mode,
            counter: 0,
        }
    }
}

impl<R: Read> Read for FaultyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.counter += 1;
        match &self.mode {
            FaultMode::OneByteChunks => {
                let n = buf.len().min(1);
                self.inner.read(&mut buf[..n])
            }
            FaultMode::Chunks(sizes) if !sizes.is_empty() => {
                let size = sizes[(self.counter - 1) % sizes.len()].max(1);
                let n = buf.len().min(size);
                self.inner.read(&mut buf[..n])
            }
            FaultMode::InterruptedEvery(n) if *n != 0 && self.counter % *n == 0 => {
                Err(std::io::Error::from(std::io::ErrorKind::Interrupted))
            }
            FaultMode::BrokenPipeAt(n) if self.counter >= *n => {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            _ => self.inner.read(buf),
        }
    }
}
