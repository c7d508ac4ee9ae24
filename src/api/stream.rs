//! Chat streaming client.
//!
//! The chat endpoint answers with an event-stream body:
//!
//! ```text
//! event: start
//! data: {}
//!
//! data: {"token": "He"}
//!
//! data: {"token": "llo"}
//!
//! event: end
//! data: {}
//! ```
//!
//! Chunks arrive with arbitrary boundaries, so bytes are buffered in a
//! [`FrameDecoder`] until a full line is available. Each line is then
//! classified as a [`Frame`]. Tokens are forwarded in arrival order over a
//! channel; `event: end` stops consumption immediately.

use std::ops::ControlFlow;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;

use crate::api::error::{ChatError, FrameError};
use crate::api::types::{ChatRequest, ErrorBody, TokenEvent};

/// Events forwarded to the consumer of a chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// The backend accepted the request and the body is being read.
    Opened,
    /// One token to append to the in-flight turn.
    Token(String),
}

/// How a successful stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The body ran out without an end marker.
    Exhausted,
    /// `event: end` was received; remaining bytes were discarded.
    EndMarker,
}

/// One logical line of the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `data: ` followed by the raw payload.
    Data(String),
    /// `event: end`
    End,
    /// Any other `event: ` line.
    Event(String),
    /// Blank lines, comments and anything else.
    Other,
}

impl Frame {
    pub fn classify(line: &str) -> Frame {
        if let Some(payload) = line.strip_prefix("data: ") {
            Frame::Data(payload.to_string())
        } else if line.starts_with("event: end") {
            Frame::End
        } else if let Some(name) = line.strip_prefix("event: ") {
            Frame::Event(name.trim().to_string())
        } else {
            Frame::Other
        }
    }
}

/// Reassembles lines from arbitrarily sized byte chunks.
///
/// Splitting happens on the raw bytes: `\n` never occurs inside a multi-byte
/// UTF-8 sequence, so a character cut in half by a chunk boundary is simply
/// held back until the rest of its line arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, FrameError>> {
        // Buffered bytes hold no newline, so only the new chunk is scanned.
        let scanned = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        for (offset, _) in chunk.iter().enumerate().filter(|&(_, &b)| b == b'\n') {
            let end = scanned + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<Result<String, FrameError>> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    /// Number of buffered bytes not yet forming a full line.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, FrameError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| FrameError::Decode(e.to_string()))
}

/// Extracts the token from a `data: ` payload.
pub fn token_from_payload(payload: &str) -> Result<String, FrameError> {
    let event: TokenEvent =
        serde_json::from_str(payload).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    match event.token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(FrameError::MissingToken(event.message)),
    }
}

/// Picks the user-facing message out of a non-2xx chat response body.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) => message,
        Ok(_) => "Unknown error".to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => "Unknown error".to_string(),
    }
}

/// Per-request counters, logged when the stream terminates.
#[derive(Debug, Default)]
struct StreamStats {
    tokens: usize,
    bytes: usize,
    skipped: usize,
    last_event: Option<String>,
}

/// Issues chat requests and turns the event-stream body into [`StreamChunk`]s.
pub struct StreamingChatClient {
    client: reqwest::Client,
    url: String,
}

impl StreamingChatClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `request` and forwards tokens to `sender` in the order received.
    ///
    /// Returns once the body is exhausted or an `event: end` frame is seen.
    /// In the latter case the response is dropped, which cancels the read.
    pub async fn stream(
        &self,
        request: &ChatRequest,
        sender: Sender<StreamChunk>,
    ) -> Result<StreamEnd, ChatError> {
        info!(
            "Chat request: url={}, turns={}, file_refs={}",
            self.url,
            request.conversation.len(),
            request.file_refs.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        debug!("Chat response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Chat API error: {} - {}", status, body);
            return Err(ChatError::Request {
                status,
                message: error_message(&body),
            });
        }

        sender
            .send(StreamChunk::Opened)
            .await
            .map_err(|_| ChatError::ChannelClosed)?;

        let mut body = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut stats = StreamStats::default();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                warn!("Chat stream transport error: {}", e);
                ChatError::Transport(e.to_string())
            })?;
            debug!("Raw chunk received: {} bytes", chunk.len());

            for line in decoder.push(&chunk) {
                if dispatch_line(line, &sender, &mut stats).await?.is_break() {
                    info!(
                        "Stream ended by marker: {} tokens, {} bytes, {} skipped, {} bytes discarded",
                        stats.tokens,
                        stats.bytes,
                        stats.skipped,
                        decoder.buffered()
                    );
                    return Ok(StreamEnd::EndMarker);
                }
            }
        }

        if let Some(line) = decoder.finish()
            && dispatch_line(line, &sender, &mut stats).await?.is_break()
        {
            return Ok(StreamEnd::EndMarker);
        }

        info!(
            "Stream exhausted: {} tokens, {} bytes, {} skipped",
            stats.tokens, stats.bytes, stats.skipped
        );
        Ok(StreamEnd::Exhausted)
    }
}

/// Handles one decoded line. `Break` means the end marker was reached.
async fn dispatch_line(
    line: Result<String, FrameError>,
    sender: &Sender<StreamChunk>,
    stats: &mut StreamStats,
) -> Result<ControlFlow<()>, ChatError> {
    let line = match line {
        Ok(line) => line,
        Err(e) => {
            warn!("Skipping undecodable line: {}", e);
            stats.skipped += 1;
            return Ok(ControlFlow::Continue(()));
        }
    };

    if !line.is_empty() {
        debug!("SSE line: {}", line);
    }

    match Frame::classify(&line) {
        Frame::Data(payload) => match token_from_payload(&payload) {
            Ok(token) => {
                stats.tokens += 1;
                stats.bytes += token.len();
                if sender.send(StreamChunk::Token(token)).await.is_err() {
                    warn!("Token send failed: receiver dropped");
                    return Err(ChatError::ChannelClosed);
                }
            }
            Err(FrameError::MissingToken(Some(message)))
                if stats.last_event.as_deref() == Some("error") =>
            {
                warn!("Backend reported a streaming error: {}", message);
                stats.skipped += 1;
            }
            Err(FrameError::MissingToken(_)) => {
                debug!("Data frame without token for event {:?}", stats.last_event);
            }
            Err(e) => {
                warn!("Skipping malformed frame: {} ({})", e, payload);
                stats.skipped += 1;
            }
        },
        Frame::End => return Ok(ControlFlow::Break(())),
        Frame::Event(name) => {
            debug!("SSE event type: {}", name);
            stats.last_event = Some(name);
            return Ok(ControlFlow::Continue(()));
        }
        Frame::Other => {}
    }

    stats.last_event = None;
    Ok(ControlFlow::Continue(()))
}
