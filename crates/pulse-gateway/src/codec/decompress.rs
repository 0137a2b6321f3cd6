//! Transport-stream decompression
//!
//! The gateway's zlib-stream mode runs one zlib context across the whole
//! connection and terminates every logical frame with a sync-flush trailer.
//! Chunks are buffered until the trailer is seen, then the buffered payload
//! is inflated as a continuation of the shared stream.

use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;

/// Four-byte end-of-frame marker (zlib sync-flush trailer)
pub const FRAME_MARKER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Inflate chunk size for the output buffer
const INFLATE_CHUNK: usize = 16 * 1024;

/// Decompression errors
///
/// Any of these means the shared stream context is corrupt; the connection
/// must be torn down and re-opened.
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("inflate error: {0}")]
    Inflate(String),

    #[error("inflate stalled on undecodable input")]
    Stalled,
}

/// Streaming zlib decompressor with frame delimiting
pub struct StreamDecompressor {
    buffer: Vec<u8>,
    inflater: Decompress,
}

impl StreamDecompressor {
    /// Create a decompressor expecting a zlib-wrapped stream
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            inflater: Decompress::new(true),
        }
    }

    /// Number of compressed bytes buffered for an incomplete frame
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append a transport chunk; returns a complete inflated frame when the
    /// end-of-frame marker has arrived
    ///
    /// Payloads may be split at arbitrary chunk boundaries; only the marker
    /// position matters.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>, DecompressError> {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() < FRAME_MARKER.len() || !self.buffer.ends_with(&FRAME_MARKER) {
            return Ok(None);
        }

        let input = std::mem::take(&mut self.buffer);
        let mut output = Vec::with_capacity(INFLATE_CHUNK);
        let mut consumed = 0;

        while consumed < input.len() {
            if output.len() == output.capacity() {
                output.reserve(INFLATE_CHUNK);
            }

            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();

            let status = self
                .inflater
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)
                .map_err(|e| DecompressError::Inflate(e.to_string()))?;

            consumed += usize::try_from(self.inflater.total_in() - before_in)
                .map_err(|e| DecompressError::Inflate(e.to_string()))?;

            if matches!(status, Status::StreamEnd) {
                break;
            }

            let progressed = self.inflater.total_in() > before_in
                || self.inflater.total_out() > before_out;
            if !progressed && output.len() < output.capacity() {
                return Err(DecompressError::Stalled);
            }
        }

        Ok(Some(output))
    }

    /// Discard any partial frame and re-initialize the stream context
    ///
    /// Required after every disconnect: the next connection starts a fresh
    /// zlib stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.inflater.reset(true);
    }
}

impl Default for StreamDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamDecompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecompressor")
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
