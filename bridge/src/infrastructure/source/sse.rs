/// One dispatched `text/event-stream` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(ev) = self.feed_line(&line) {
                out.push(ev);
            }
        }
        out
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_firebase_put() {
        let mut dec = SseDecoder::new();
        let events = dec.push(b"event: put\ndata: {\"path\":\"/\",\"data\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "put".into(),
                data: "{\"path\":\"/\",\"data\":1}".into(),
            }]
        );
    }

    #[test]
    fn handles_chunk_boundaries_and_crlf() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"event: pat").is_empty());
        assert!(dec.push(b"ch\r\ndata: {\"a\"").is_empty());
        let events = dec.push(b":1}\r\n\r\nevent: keep-alive\r\ndata: null\r\n\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "patch");
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].event, "keep-alive");
    }

    #[test]
    fn joins_multiline_data_and_skips_comments() {
        let mut dec = SseDecoder::new();
        let events = dec.push(b": hello\ndata: a\ndata: b\n\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".into(),
                data: "a\nb".into(),
            }]
        );
    }

    #[test]
    fn split_utf8_sequence_survives() {
        let mut dec = SseDecoder::new();
        let bytes = "data: é\n\n".as_bytes();
        assert!(dec.push(&bytes[..7]).is_empty());
        let events = dec.push(&bytes[7..]);
        assert_eq!(events[0].data, "é");
    }
}
