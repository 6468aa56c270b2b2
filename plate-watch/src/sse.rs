//! Incremental Server-Sent Events parser
//!
//! Network chunks do not align with events, so bytes are buffered until a
//! blank line closes a frame. Comment lines (`:heartbeat`) are dropped.

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, `None` means the default `message` type
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    /// Event type with the SSE default applied
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Accumulates chunks and yields complete frames
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every frame it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CRLF line endings collapse to LF
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(frame) = parse_block(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes held back waiting for the end of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut id = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"event: progress\ndata: {\"a\":1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("progress".to_string()),
                data: "{\"a\":1}".to_string(),
                id: None,
            }]
        );
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"event: prog").is_empty());
        assert!(parser.push(b"ress\ndata: {\"current\"").is_empty());
        let frames = parser.push(b":2}\n\nevent: progress\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"current\":2}");
        assert!(parser.pending() > 0);
    }

    #[test]
    fn test_heartbeat_comments_ignored() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b":heartbeat\n\n: keep-alive\n\ndata: x\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type(), "message");
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"id: 7\r\ndata: line one\r\ndata:line two\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "line one\nline two");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_multibyte_split() {
        let mut parser = SseFrameParser::new();
        let text = "data: é\n\n".as_bytes();
        // Split inside the two-byte character
        assert!(parser.push(&text[..7]).is_empty());
        let frames = parser.push(&text[7..]);
        assert_eq!(frames[0].data, "é");
    }
}
