//! # Frame Extraction
//!
//! Splits the arbitrarily-chunked inbound byte stream into delimited frames.
//!
//! Bytes read off the serial port arrive in whatever chunks the driver hands
//! over, with no relation to frame boundaries. The extractor accumulates them
//! in a fixed-capacity buffer, emits a [`Frame`] for every complete
//! delimiter-bounded span, and carries any trailing partial frame over to the
//! next `feed` call. Spans of one byte or less are flush-marker noise and are
//! discarded without dispatch.

use tracing::warn;

use super::{Frame, FRAME_DELIMITER, RAW_BUFFER_CAPACITY};

/// Incremental frame scanner over the inbound byte stream.
///
/// The buffer never grows past [`RAW_BUFFER_CAPACITY`]; if an append would
/// overflow it, the buffered bytes are dropped and logged rather than letting
/// a silent or wedged peer consume unbounded memory. One byte of headroom is
/// always kept free.
///
/// # Examples
///
/// ```
/// use rover_bridge::proto::framing::FrameExtractor;
///
/// let mut extractor = FrameExtractor::new();
/// let frames: Vec<_> = extractor.feed(b"I\x2A\x00\r").collect();
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].tag(), b'I');
/// ```
#[derive(Debug)]
pub struct FrameExtractor {
    buf: Vec<u8>,
    /// Bytes at the front of `buf` already scanned past the last delimiter;
    /// compacted away at the start of the next `feed`.
    consumed: usize,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExtractor {
    /// Create an extractor with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(RAW_BUFFER_CAPACITY),
            consumed: 0,
        }
    }

    /// Append newly-read bytes and iterate over the complete frames they
    /// finish.
    ///
    /// The returned frames borrow the internal buffer and are only valid
    /// until the next call. A trailing span with no delimiter stays buffered
    /// for the next call, so a frame split across any number of reads is
    /// reassembled exactly as if it arrived whole.
    pub fn feed(&mut self, bytes: &[u8]) -> FrameBatch<'_> {
        // Compact away everything the previous pass scanned past.
        self.buf.drain(..self.consumed);
        self.consumed = 0;

        let mut bytes = bytes;
        if self.buf.len() + bytes.len() > RAW_BUFFER_CAPACITY - 1 {
            warn!(
                buffered = self.buf.len(),
                incoming = bytes.len(),
                "inbound buffer exhausted, dropping buffered bytes"
            );
            self.buf.clear();
            if bytes.len() > RAW_BUFFER_CAPACITY - 1 {
                // A single read larger than the buffer: keep the newest bytes.
                bytes = &bytes[bytes.len() - (RAW_BUFFER_CAPACITY - 1)..];
            }
        }
        self.buf.extend_from_slice(bytes);

        let mut spans = Vec::new();
        let mut start = 0;
        for (i, &b) in self.buf.iter().enumerate() {
            if b == FRAME_DELIMITER {
                // Spans of length <= 1 are delimiter noise, not frames.
                if i - start > 1 {
                    spans.push((start, i));
                }
                start = i + 1;
            }
        }
        self.consumed = start;

        FrameBatch {
            buf: &self.buf,
            spans: spans.into_iter(),
        }
    }

    /// Number of bytes currently buffered, including any partial frame.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.consumed
    }
}

/// Iterator over the frames completed by one `feed` call.
#[derive(Debug)]
pub struct FrameBatch<'a> {
    buf: &'a [u8],
    spans: std::vec::IntoIter<(usize, usize)>,
}

impl<'a> Iterator for FrameBatch<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, end) = self.spans.next()?;
        Some(Frame::new(&self.buf[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.spans.size_hint()
    }
}

impl ExactSizeIterator for FrameBatch<'_> {}
