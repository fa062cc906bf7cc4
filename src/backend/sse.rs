//! Server-sent events framing for the OpenAI-compatible stream.

use serde_json::Value;

/// Splits a byte stream into `data:` payloads.
///
/// Bytes are buffered until a newline, so payloads and multibyte characters
/// may be split anywhere. `event:` and keep-alive lines are skipped and the
/// `[DONE]` sentinel only flips [`is_done`](Self::is_done).
///
/// ```
/// use script_pipeline::backend::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let values = decoder.decode(data);
/// assert_eq!(values.len(), 1);
/// assert!(decoder.is_done());
/// ```
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Whether the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Payloads completed by `chunk`, in order.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.accept_line(&String::from_utf8_lossy(&line), &mut values);
        }
        values
    }

    /// Payloads left in an unterminated final line.
    pub fn flush(&mut self) -> Vec<Value> {
        let remaining = std::mem::take(&mut self.buffer);
        let mut values = Vec::new();
        for line in String::from_utf8_lossy(&remaining).lines() {
            self.accept_line(line, &mut values);
        }
        values
    }

    fn accept_line(&mut self, line: &str, values: &mut Vec<Value>) {
        let line = line.trim();
        if line.is_empty() || line.starts_with("event:") {
            return;
        }
        if let Some(data) = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))
        {
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                return;
            }
            if let Ok(val) = serde_json::from_str::<Value>(data) {
                values.push(val);
            }
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_split_mid_token() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.decode(b"data: {\"cho").is_empty());
        let values = decoder.decode(b"ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["choices"][0]["delta"]["content"], "Hi");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let payload = "data: {\"c\":\"caf\u{e9}\"}\n".as_bytes();
        let cut = payload.len() - 4;
        let mut decoder = SseDecoder::new();
        assert!(decoder.decode(&payload[..cut]).is_empty());
        assert_eq!(decoder.decode(&payload[cut..])[0]["c"], "caf\u{e9}");
    }

    #[test]
    fn test_noise_lines_skipped() {
        let mut decoder = SseDecoder::new();
        let chunk = b"\n\nevent: message\n: keep-alive\ndata:{\"a\":1}\n\ndata: not json\n\ndata: {\"a\":2}\n\n";
        let values = decoder.decode(chunk);
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["a"], 2);
    }

    #[test]
    fn test_done_sentinel() {
        let mut decoder = SseDecoder::new();
        let values = decoder.decode(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(values.len(), 1);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_flush_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.decode(b"data: {\"x\":1}").is_empty());
        assert_eq!(decoder.flush()[0]["x"], 1);
        assert!(decoder.flush().is_empty());
        assert!(!decoder.is_done());
    }
}
