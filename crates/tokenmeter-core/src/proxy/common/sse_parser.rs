//! Line framing for upstream SSE bodies.
//!
//! A network read can end anywhere, including in the middle of a `data: `
//! line or a multi-byte character. Bytes are held across reads and only
//! complete lines are handed out.

use bytes::BytesMut;

/// Persistent cross-read line buffer.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: BytesMut,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one read and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_raw = self.buffer.split_to(pos + 1);
            lines.push(decode_line(&line_raw[..pos]));
        }
        lines
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(decode_line(&rest))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Payload of a `data:` line, if any.
///
/// SSE allows a single optional space after the colon.
pub fn data_payload(line: &str) -> Option<&str> {
    let value = line.strip_prefix("data:")?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines_in_one_read() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"event: ping\ndata: {\"a\":1}\n\n");
        assert_eq!(lines, vec!["event: ping", "data: {\"a\":1}", ""]);
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(b"data: {\"usa").is_empty());
        assert!(buf.push(b"ge\":{\"x\"").is_empty());
        let lines = buf.push(b":1}}\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"usage\":{\"x\":1}}"]);
        assert_eq!(buf.finish().as_deref(), Some("data: [DO"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_crlf_and_split_multibyte_char() {
        let mut buf = SseLineBuffer::new();
        let text = "data: héllo\r\n".as_bytes();
        let (first, second) = text.split_at(8);
        assert!(buf.push(first).is_empty());
        assert_eq!(buf.push(second), vec!["data: héllo"]);
    }

    #[test]
    fn test_data_payload() {
        assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data:[DONE]"), Some("[DONE]"));
        assert_eq!(data_payload("event: message_start"), None);
        assert_eq!(data_payload(": keep-alive"), None);
    }
}
