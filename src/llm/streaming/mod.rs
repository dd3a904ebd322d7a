//! Streaming plumbing shared by provider implementations

/// Server-Sent Events (SSE) decoder
///
/// Buffers incoming bytes and extracts complete SSE `data:` payloads.
/// Handles events split across chunks, multiple events in one chunk, and a
/// final event without a trailing newline.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and extract complete `data:` payloads.
    /// Incomplete events stay buffered for the next `push()` or `finish()`.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim().to_string();
            self.buffer = self.buffer[newline_pos + 1..].to_string();

            if line.is_empty() {
                continue;
            }
            if let Some(payload) = line.strip_prefix("data:") {
                payloads.push(payload.trim().to_string());
            }
        }
        payloads
    }

    /// Flush the buffer when the stream ends, extracting a final event
    /// that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        for line in self.buffer.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(payload) = line.strip_prefix("data:") {
                payloads.push(payload.trim().to_string());
            }
        }
        self.buffer.clear();
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_complete_event() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"hello\":\"world\"}\n\n");
        assert_eq!(payloads, vec!["{\"hello\":\"world\"}"]);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"text\":\"hol").is_empty());
        let payloads = decoder.push(b"a\"}\n\n");
        assert_eq!(payloads, vec!["{\"text\":\"hola\"}"]);
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn finish_extracts_event_without_trailing_newline() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"b\":2}").is_empty());
        assert_eq!(decoder.finish(), vec!["{\"b\":2}"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn non_data_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let payloads =
            decoder.push(b": comment\nevent: message\ndata: {\"x\":1}\n\n");
        assert_eq!(payloads, vec!["{\"x\":1}"]);
    }
}
