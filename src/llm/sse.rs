//! Minimal server-sent events line decoder.

/// Buffers raw bytes and yields `data:` payloads one at a time.
///
/// Only single-line `data:` fields are meaningful for chat completions;
/// comments (`: OPENROUTER PROCESSING`) and other fields are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete `data:` payload, if one is buffered.
    pub fn next_data(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = data_payload(&line) {
                return Some(data);
            }
        }
        None
    }

    /// Treat whatever is left as a final line (stream ended without `\n`).
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_pushes() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: {\"a\":");
        assert!(decoder.next_data().is_none());
        decoder.push(b"1}\r\n\r\ndata: [DONE]\n");
        assert_eq!(decoder.next_data().as_deref(), Some("{\"a\":1}"));
        assert_eq!(decoder.next_data().as_deref(), Some("[DONE]"));
        assert!(decoder.next_data().is_none());
    }

    #[test]
    fn test_skips_comments_and_fields() {
        let mut decoder = SseDecoder::new();
        decoder.push(b": OPENROUTER PROCESSING\nevent: message\nid: 1\ndata:x\n");
        assert_eq!(decoder.next_data().as_deref(), Some("x"));
    }

    #[test]
    fn test_multibyte_split() {
        let text = "data: héllo\n".as_bytes();
        let mut decoder = SseDecoder::new();
        decoder.push(&text[..8]);
        decoder.push(&text[8..]);
        assert_eq!(decoder.next_data().as_deref(), Some("héllo"));
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: tail");
        assert!(decoder.next_data().is_none());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert!(decoder.finish().is_none());
    }
}
