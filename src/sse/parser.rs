//! Incremental `text/event-stream` decoder.
//!
//! Network chunks are fed as raw bytes; complete events come out. Lines are
//! only decoded once they are complete, so multi-byte UTF-8 sequences split
//! across chunks are reassembled before decoding.

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, `None` means the default `message` type
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    /// Reconnection time the server asked for, in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

#[derive(Debug, Default)]
pub struct EventParser {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    event: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
    in_event: bool,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some((line_end, next)) = self.next_line_break() {
            let line_bytes: Vec<u8> = self.buffer.drain(..next).take(line_end).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let mut flushed = None;
        if !rest.is_empty() {
            // a lone CR held back waiting for a possible LF ends the line
            let line_bytes = rest.strip_suffix(b"\r").unwrap_or(&rest[..]);
            let line = String::from_utf8_lossy(line_bytes);
            flushed = self.process_line(&line);
        }
        flushed.or_else(|| self.dispatch())
    }

    /// Returns (end of line content, start of next line)
    fn next_line_break(&self) -> Option<(usize, usize)> {
        let pos = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r')?;
        if self.buffer[pos] == b'\n' {
            return Some((pos, pos + 1));
        }
        // A trailing CR may be the first half of a CRLF still in flight
        match self.buffer.get(pos + 1) {
            Some(b'\n') => Some((pos, pos + 2)),
            Some(_) => Some((pos, pos + 1)),
            None => None,
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        // Bare JSON lines outside an event: newline-delimited JSON streams
        if !self.in_event && line.trim_start().starts_with('{') {
            return Some(SseEvent::message(line.trim()));
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        self.in_event = true;
        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        self.in_event = false;
        let event = self.event.take();
        let retry = self.retry.take();
        // id persists across events, like EventSource's last event id
        let id = self.id.clone();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseEvent {
            event,
            data,
            id,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(events, vec![SseEvent::message("{\"a\":1}")]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"event: progress\nda").is_empty());
        assert!(parser.feed(b"ta: hello\n").is_empty());
        let events = parser.feed(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "progress");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut parser = EventParser::new();
        let events = parser.feed(b": keep-alive\ndata: one\ndata: two\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = EventParser::new();
        let mut events = parser.feed(b"data: x\r");
        assert!(events.is_empty());
        events = parser.feed(b"\n\r\n");
        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let text = "data: 完整性\n\n".as_bytes();
        let mut parser = EventParser::new();
        assert!(parser.feed(&text[..8]).is_empty());
        let events = parser.feed(&text[8..]);
        assert_eq!(events[0].data, "完整性");
    }

    #[test]
    fn test_newline_delimited_json() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"{\"n\":1}\n{\"n\":2}\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].data, "{\"n\":2}");
    }

    #[test]
    fn test_id_and_retry() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"id: 7\nretry: 1500\ndata: a\n\ndata: b\n\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].retry, Some(1500));
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(events[1].retry, None);
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"\n\nevent: ping\n\n").is_empty());
    }

    #[test]
    fn test_finish_flushes_pending_event() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"data: tail").is_empty());
        assert_eq!(parser.finish(), Some(SseEvent::message("tail")));
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_finish_drops_trailing_carriage_return() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"data: x\r").is_empty());
        assert_eq!(parser.finish(), Some(SseEvent::message("x")));

        let mut parser = EventParser::new();
        assert!(parser.feed(b"data: y\r\r").is_empty());
        assert_eq!(parser.finish(), Some(SseEvent::message("y")));
    }
}
