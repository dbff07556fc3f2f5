//! Server-sent events transport for the inbox stream.
//!
//! SYSTEM CONTEXT
//! ==============
//! `event_channel` opens one stream through an [`EventSource`]. The HTTP
//! implementation reads the response body chunk by chunk and feeds an
//! [`SseDecoder`], which yields one [`SseEvent`] per blank-line-delimited
//! block. Tests substitute a scripted source behind the same trait.
//!
//! ERROR HANDLING
//! ==============
//! A failed open, a failed body read, and a clean end of body all surface to
//! the channel as transport failures; the channel decides whether to retry.

#[cfg(test)]
#[path = "sse_test.rs"]
mod sse_test;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;
use reqwest::Url;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};

/// Stream of decoded events for one open connection.
pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, TransportError>>>>;

/// Failure opening or reading the event stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("event stream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("event stream returned HTTP {0}")]
    Status(u16),
    #[error("event stream closed by server")]
    Closed,
}

/// A parsed server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    /// The `data:` lines joined with `\n`.
    pub data: String,
    /// The `id:` field, if present.
    pub id: Option<String>,
}

impl SseEvent {
    /// Parse one event block.
    ///
    /// Returns `None` for blocks without data (keep-alive comments, bare
    /// `retry:` lines), which are not dispatched.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut event = None;
        let mut data_parts: Vec<&str> = Vec::new();
        let mut id = None;

        for line in raw.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => data_parts.push(value),
                "event" => event = Some(value.to_owned()),
                "id" => id = Some(value.to_owned()),
                _ => {}
            }
        }

        if data_parts.is_empty() {
            return None;
        }

        Some(Self { event, data: data_parts.join("\n"), id })
    }
}

/// Incremental decoder turning raw body bytes into events.
///
/// Buffers bytes rather than text so a UTF-8 sequence split across two
/// network chunks is reassembled before decoding. `\r\n` and bare `\r` line
/// endings are rewritten to `\n` on the way in, so a block always ends at the
/// first `\n\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a block end.
    scanned: usize,
    /// Previous chunk ended in `\r`; a leading `\n` completes that line ending.
    trailing_cr: bool,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.reserve(chunk.len());
        for &byte in chunk {
            match byte {
                b'\n' if self.trailing_cr => self.trailing_cr = false,
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.trailing_cr = true;
                }
                _ => {
                    self.buffer.push(byte);
                    self.trailing_cr = false;
                }
            }
        }
    }

    /// Pop the next complete event, skipping data-less blocks.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            // Back up one byte: the delimiter may straddle the scanned prefix.
            let from = self.scanned.saturating_sub(1);
            let Some(end) = find(&self.buffer[from..], b"\n\n").map(|pos| from + pos) else {
                self.scanned = self.buffer.len();
                return None;
            };
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(event) = SseEvent::parse(&text) {
                return Some(event);
            }
        }
    }

    /// Bytes received but not yet part of a complete block.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Something that can open the server's push-event stream.
///
/// A successful `open` is the transport-level "open" signal.
#[async_trait(?Send)]
pub trait EventSource {
    /// Open a stream at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the connection cannot be established.
    async fn open(&self, url: &Url) -> Result<SseStream, TransportError>;
}

/// [`EventSource`] backed by a streaming `reqwest` GET.
#[derive(Clone, Debug)]
pub struct HttpEventSource {
    client: reqwest::Client,
}

impl HttpEventSource {
    /// Build a source whose connections give up after `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be built.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }
}

struct SseBody {
    response: reqwest::Response,
    decoder: SseDecoder,
}

#[async_trait(?Send)]
impl EventSource for HttpEventSource {
    async fn open(&self, url: &Url) -> Result<SseStream, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = SseBody { response, decoder: SseDecoder::new() };
        let stream = futures_util::stream::unfold(Some(body), |state| async move {
            let mut body = state?;
            loop {
                if let Some(event) = body.decoder.next_event() {
                    return Some((Ok(event), Some(body)));
                }
                match body.response.chunk().await {
                    Ok(Some(bytes)) => body.decoder.push(&bytes),
                    Ok(None) => return Some((Err(TransportError::Closed), None)),
                    Err(e) => return Some((Err(TransportError::Http(e)), None)),
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
