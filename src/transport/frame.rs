//! Newline framing and frame parsing for the chat event stream.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::StreamChunk;

const DONE_SENTINEL: &str = "[DONE]";

/// How frames are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FrameMode {
    /// Server-Sent Events: `data: <json>` lines, other SSE fields ignored.
    #[default]
    EventStream,
    /// One JSON payload per line, no prefix.
    Raw,
}

/// Splits a byte stream into complete lines.
///
/// Bytes after the last newline are held until the next `push`, so a frame is
/// never produced from a partial line and multi-byte characters split across
/// reads are reassembled before decoding.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read and return every line it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Flush an unterminated trailing line at end of body.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Result of parsing one line.
#[derive(Debug)]
pub enum Frame {
    Chunk(StreamChunk),
    /// The `[DONE]` sentinel.
    Done,
    /// Blank lines, SSE comments, and SSE fields other than `data`.
    Ignored,
    Malformed {
        payload: String,
        error: serde_json::Error,
    },
}

/// Parse one complete line.
pub fn parse_frame(line: &str, mode: FrameMode) -> Frame {
    if line.trim().is_empty() {
        return Frame::Ignored;
    }

    let payload = match mode {
        FrameMode::Raw => line,
        FrameMode::EventStream => {
            if line.starts_with(':') {
                return Frame::Ignored;
            }
            if let Some(data) = line.strip_prefix("data:") {
                data.strip_prefix(' ').unwrap_or(data)
            } else if is_sse_field(line) {
                return Frame::Ignored;
            } else {
                line
            }
        }
    };

    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }
    if payload.is_empty() {
        return Frame::Ignored;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => Frame::Chunk(chunk),
        Err(error) => Frame::Malformed {
            payload: payload.to_string(),
            error,
        },
    }
}

fn is_sse_field(line: &str) -> bool {
    ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_lines_wait_for_the_next_read() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"id\":\"m1\",").is_empty());
        assert_eq!(decoder.pending_len(), "data: {\"id\":\"m1\",".len());

        let lines = decoder.push(b"\"delta\":\"Hi\"}\ndata: [DO");
        assert_eq!(lines, vec![r#"data: {"id":"m1","delta":"Hi"}"#.to_string()]);

        let lines = decoder.push(b"NE]\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn one_read_may_hold_several_lines() {
        let mut decoder = FrameDecoder::new();
        let lines = decoder.push(b"a\r\n\nb\nc");
        assert_eq!(lines, vec!["a".to_string(), String::new(), "b".to_string()]);
        assert_eq!(decoder.finish(), Some("c".to_string()));
    }

    #[test]
    fn multibyte_characters_survive_split_reads() {
        let mut decoder = FrameDecoder::new();
        let bytes = "é\n".as_bytes();
        assert!(decoder.push(&bytes[..1]).is_empty());
        assert_eq!(decoder.push(&bytes[1..]), vec!["é".to_string()]);
    }

    #[test]
    fn event_stream_prefix_is_optional() {
        for line in [
            r#"data: {"id":"m1","delta":"x"}"#,
            r#"data:{"id":"m1","delta":"x"}"#,
            r#"{"id":"m1","delta":"x"}"#,
        ] {
            match parse_frame(line, FrameMode::EventStream) {
                Frame::Chunk(chunk) => assert_eq!(chunk, StreamChunk::delta("m1", "x")),
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    #[test]
    fn sentinel_is_recognised_with_or_without_prefix() {
        assert!(matches!(parse_frame("data: [DONE]", FrameMode::EventStream), Frame::Done));
        assert!(matches!(parse_frame("[DONE]", FrameMode::EventStream), Frame::Done));
        assert!(matches!(parse_frame("[DONE]", FrameMode::Raw), Frame::Done));
    }

    #[test]
    fn sse_bookkeeping_lines_are_ignored() {
        for line in ["", "   ", ": keep-alive", "event: message", "id: 7", "retry: 1000"] {
            assert!(matches!(parse_frame(line, FrameMode::EventStream), Frame::Ignored));
        }
    }

    #[test]
    fn raw_mode_does_not_strip_prefixes() {
        assert!(matches!(
            parse_frame(r#"data: {"id":"m1","delta":"x"}"#, FrameMode::Raw),
            Frame::Malformed { .. }
        ));
        assert!(matches!(
            parse_frame(r#"{"id":"m1","delta":"x"}"#, FrameMode::Raw),
            Frame::Chunk(_)
        ));
    }

    #[test]
    fn malformed_json_keeps_its_payload() {
        match parse_frame("data: {not json", FrameMode::EventStream) {
            Frame::Malformed { payload, .. } => assert_eq!(payload, "{not json"),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn frame_mode_parses_from_config_strings() {
        assert_eq!("raw".parse::<FrameMode>().unwrap(), FrameMode::Raw);
        assert_eq!("event_stream".parse::<FrameMode>().unwrap(), FrameMode::EventStream);
    }
}
