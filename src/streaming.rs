//! Stream aggregation and the NDJSON line decoder.
//!
//! [`aggregate`] folds a [`ChunkStream`](crate::backend::ChunkStream) into one
//! [`AggregatedText`]. [`StreamingDecoder`] handles the case where JSON lines
//! are split across TCP chunk boundaries, which is a common issue with
//! Ollama's streaming API.

use crate::error::Result;
use futures::{Stream, StreamExt};
use serde_json::Value;

/// The concatenation of every chunk of one response, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedText {
    pub text: String,
    /// Number of chunks consumed, including empty ones.
    pub chunks: usize,
}

/// Consume `chunks` until it ends and concatenate them.
///
/// `on_chunk` sees every chunk as it arrives. An `Err` item aborts the
/// aggregation and is returned as-is; partial text is discarded, so a stream
/// cut off mid-document is never mistaken for a finished one.
///
/// ```
/// use futures::stream;
/// use script_pipeline::streaming::aggregate;
///
/// # tokio_test::block_on(async {
/// let chunks = stream::iter(vec![Ok("{\"a\"".to_string()), Ok(":1}".to_string())]);
/// let out = aggregate(chunks, |_| {}).await.unwrap();
/// assert_eq!(out.text, "{\"a\":1}");
/// assert_eq!(out.chunks, 2);
/// # });
/// ```
pub async fn aggregate<S, F>(chunks: S, mut on_chunk: F) -> Result<AggregatedText>
where
    S: Stream<Item = Result<String>>,
    F: FnMut(&str),
{
    futures::pin_mut!(chunks);
    let mut out = AggregatedText::default();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        on_chunk(&chunk);
        out.text.push_str(&chunk);
        out.chunks += 1;
    }

    Ok(out)
}

/// Buffered decoder for newline-delimited JSON streams (NDJSON).
///
/// Accumulates raw bytes, splits on newline boundaries, and yields
/// complete JSON lines.
///
/// # Example
///
/// ```
/// use script_pipeline::StreamingDecoder;
///
/// let mut decoder = StreamingDecoder::new();
///
/// let values = decoder.decode(b"{\"response\":");
/// assert!(values.is_empty());
///
/// let values = decoder.decode(b"\"hello\"}\n");
/// assert_eq!(values.len(), 1);
/// assert_eq!(values[0]["response"], "hello");
/// ```
pub struct StreamingDecoder {
    buffer: Vec<u8>,
}

impl StreamingDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed a raw chunk into the decoder and return any complete JSON lines.
    ///
    /// Lines that are not valid JSON are skipped. Bytes are buffered before
    /// UTF-8 decoding so a multi-byte character split across chunks survives.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(val) = serde_json::from_str::<Value>(line) {
                values.push(val);
            }
        }

        values
    }

    /// Parse whatever is left after the stream ended without a trailing newline.
    ///
    /// A truncated trailing line is not repaired: it yields `None`.
    pub fn flush(&mut self) -> Option<Value> {
        let remaining = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&remaining);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        serde_json::from_str::<Value>(text).ok()
    }
}

impl Default for StreamingDecoder {
    fn default() -> Self {
        Self::new()
    }
}
