//! Turns a response body into stream events.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ThinkstreamError;
use crate::transport::{parse_frame, status_to_error, stream_headers, Frame, FrameDecoder, FrameMode};
use crate::types::StreamSummary;

use super::events::StreamEvent;

/// Longest payload excerpt written to the log for a dropped frame.
const LOG_EXCERPT_CHARS: usize = 80;

enum Read<B> {
    Bytes(B),
    End,
    Failed(ThinkstreamError),
    Cancelled,
}

/// Decode a body byte stream into events.
///
/// Malformed frames are logged and skipped. An abort observed while waiting
/// for bytes yields `Cancelled`, never `Failed`.
pub fn decode_body<S, B, E>(
    body: S,
    mode: FrameMode,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ThinkstreamError> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        let mut summary = StreamSummary::default();
        let mut body = std::pin::pin!(body);

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => Read::Cancelled,
                item = body.next() => match item {
                    Some(Ok(bytes)) => Read::Bytes(bytes),
                    Some(Err(e)) => Read::Failed(e.into()),
                    None => Read::End,
                },
            };

            let (lines, at_end) = match read {
                Read::Bytes(bytes) => (decoder.push(bytes.as_ref()), false),
                Read::End => (decoder.finish().into_iter().collect(), true),
                Read::Cancelled => {
                    debug!(chunks = summary.chunks, "stream cancelled");
                    yield StreamEvent::Cancelled;
                    return;
                }
                Read::Failed(error) => {
                    if cancel.is_cancelled() {
                        yield StreamEvent::Cancelled;
                    } else {
                        warn!(error = %error, "stream read failed");
                        yield StreamEvent::Failed(error);
                    }
                    return;
                }
            };

            for line in lines {
                match parse_frame(&line, mode) {
                    Frame::Ignored => {}
                    Frame::Done => {
                        debug!(chunks = summary.chunks, "stream finished with sentinel");
                        yield StreamEvent::Completed(summary);
                        return;
                    }
                    Frame::Malformed { payload, error } => {
                        summary.dropped_frames += 1;
                        warn!(
                            error = %error,
                            payload = %excerpt(&payload),
                            "dropping malformed frame"
                        );
                    }
                    Frame::Chunk(chunk) => {
                        if cancel.is_cancelled() {
                            yield StreamEvent::Cancelled;
                            return;
                        }
                        summary.chunks += 1;
                        let done = chunk.done;
                        let failure = chunk.error.clone();
                        yield StreamEvent::Chunk(chunk);
                        if let Some(message) = failure {
                            warn!(error = %message, "stream reported an error");
                            yield StreamEvent::Failed(ThinkstreamError::Stream(message));
                            return;
                        }
                        if done {
                            yield StreamEvent::Completed(summary);
                            return;
                        }
                    }
                }
            }

            if at_end {
                debug!(chunks = summary.chunks, "stream body ended");
                yield StreamEvent::Completed(summary);
                return;
            }
        }
    }
}

/// Issue the POST and decode its body.
pub(crate) fn open_stream(
    client: reqwest::Client,
    endpoint: String,
    payload: serde_json::Value,
    api_key: Option<String>,
    mode: FrameMode,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    async_stream::stream! {
        let send = client
            .post(&endpoint)
            .headers(stream_headers(api_key.as_deref()))
            .json(&payload)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = send => Some(result),
        };

        let response = match response {
            None => {
                debug!(endpoint = %endpoint, "stream cancelled before response");
                yield StreamEvent::Cancelled;
                return;
            }
            Some(Err(error)) => {
                warn!(endpoint = %endpoint, error = %error, "stream request failed");
                yield StreamEvent::Failed(error.into());
                return;
            }
            Some(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = %endpoint, status = status.as_u16(), "stream request rejected");
            yield StreamEvent::Failed(status_to_error(status.as_u16(), &body));
            return;
        }

        let mut events = std::pin::pin!(decode_body(response.bytes_stream(), mode, cancel));
        while let Some(event) = events.next().await {
            yield event;
        }
    }
}

fn excerpt(payload: &str) -> String {
    if payload.chars().count() <= LOG_EXCERPT_CHARS {
        return payload.to_string();
    }
    let mut out: String = payload.chars().take(LOG_EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}
