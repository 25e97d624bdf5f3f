// Incremental text/event-stream decoder
use bytes::BytesMut;

/// Splits an event stream into event payloads.
///
/// Chunks may split lines or frames at any byte. Only `data` fields are
/// kept; comments and other fields are ignored. Lines end in `\n` or `\r\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }

            if line.is_empty() {
                if let Some(data) = self.data.take() {
                    events.push(data);
                }
                continue;
            }
            self.process_line(&String::from_utf8_lossy(&line));
        }

        events
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
    }
}
