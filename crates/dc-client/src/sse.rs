//! Incremental server-sent-event decoding.

use crate::{ServiceError, ServiceResult};

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `message` when the frame had no `event:` line.
    pub event: String,
    pub data: String,
}

/// Bytes a decoder holds without seeing the end of a frame before giving up.
pub const MAX_PENDING: usize = 1 << 20;

/// Splits a byte stream into SSE frames. Chunk boundaries may fall anywhere,
/// including inside a multi-byte character or a CRLF pair. Lines may end in
/// CRLF, LF or a bare CR.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    after_cr: bool,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that fails once more than `limit` bytes are pending.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            after_cr: false,
            limit,
        }
    }

    /// Feed one chunk and return every frame it completed.
    ///
    /// Fails with [`ServiceError::Decode`] when the unfinished frame grows
    /// past the limit; the pending bytes are discarded.
    pub fn push(&mut self, chunk: &[u8]) -> ServiceResult<Vec<SseFrame>> {
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(byte);
                    self.after_cr = false;
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw[..end])) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.limit {
            let pending = self.buffer.len();
            self.buffer.clear();
            return Err(ServiceError::Decode(format!(
                "event stream frame exceeds {} bytes ({pending} pending)",
                self.limit
            )));
        }
        Ok(frames)
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    data.map(|data| SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_across_chunks_are_joined() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: progress\ndata: {\"percent\"").unwrap().is_empty());
        let frames = decoder.push(b": 40}\n\nevent: end\n").unwrap();
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "progress".to_string(),
                data: "{\"percent\": 40}".to_string()
            }]
        );
        assert!(decoder.pending() > 0);
        let frames = decoder.push(b"data: {}\n\n").unwrap();
        assert_eq!(frames[0].event, "end");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .push(b"event: sector_completed\r\ndata: {\"sector\":\"Domestic\"}\r\n\r\n")
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"sector\":\"Domestic\"}");
    }

    #[test]
    fn comments_and_empty_frames_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .push(b": keep-alive\n\nevent: ping\n\ndata: a\ndata: b\n\n")
            .unwrap();
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "message".to_string(),
                data: "a\nb".to_string()
            }]
        );
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let text = "data: Énergie\n\n".as_bytes();
        let (head, tail) = text.split_at(7);
        assert!(decoder.push(head).unwrap().is_empty());
        assert_eq!(decoder.push(tail).unwrap()[0].data, "Énergie");
    }

    #[test]
    fn bare_cr_line_endings_are_accepted() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: end\rdata: {}\r\rdata: x\r\r").unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "end");
        assert_eq!(frames[1].data, "x");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn crlf_split_between_chunks_is_one_line_break() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: a\r").unwrap().is_empty());
        assert!(decoder.push(b"\ndata: b\r").unwrap().is_empty());
        let frames = decoder.push(b"\n\r\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn unterminated_frame_past_the_limit_is_rejected() {
        let mut decoder = SseDecoder::with_limit(16);
        assert!(decoder.push(b"data: 0123456789").unwrap().is_empty());
        let err = decoder.push(b"abcdef").unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
        assert_eq!(decoder.pending(), 0);

        let frames = decoder.push(b"data: ok\n\n").unwrap();
        assert_eq!(frames[0].data, "ok");
    }
}
