//! Streaming chat-completion transport (`POST {base_url}/chat/completions`).
//!
//! Sends the conversation with `"stream": true` and reads the response body
//! as a server-sent-event stream, decoding `data: {...}` frames into
//! incremental content deltas. All wire types are private to this module —
//! callers only see [`TransportEvent`]s.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::llm::{emit, EventFeed, ProviderError, TransportEvent, TransportFault};
use crate::transcript::Message;

/// Terminal frame payload ending the stream.
const DONE_FRAME: &str = "[DONE]";

// ── Public transport ─────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/chat/completions` with
/// streaming responses. Constructed once at startup, then cheaply cloned.
#[derive(Debug, Clone)]
pub struct StreamingTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl StreamingTransport {
    /// Build a transport from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local servers. When present it is
    /// sent as `Authorization: Bearer <key>` on every request.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Run one exchange: send the conversation, then pump decoded deltas
    /// into `feed` until the stream ends, faults, or `cancel` fires.
    pub async fn exchange(
        &self,
        conversation: Uuid,
        messages: Vec<Message>,
        cancel: CancellationToken,
        feed: EventFeed,
    ) {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest { messages, stream: true };

        debug!(%url, turns = payload.messages.len(), "sending chat completion request");

        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                error!(%url, error = %e, "chat completion request failed (transport)");
                let fault = if e.is_timeout() { TransportFault::Timeout } else { TransportFault::Send };
                emit(&feed, conversation, TransportEvent::Fault { fault, detail: e.to_string() }).await;
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "chat completion request rejected");
            let detail = if body.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {body}")
            };
            emit(
                &feed,
                conversation,
                TransportEvent::Fault { fault: TransportFault::Send, detail },
            )
            .await;
            return;
        }

        emit(&feed, conversation, TransportEvent::Opened).await;

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(%conversation, "exchange cancelled");
                    return;
                }

                chunk = stream.next() => match chunk {
                    None => break,
                    Some(Err(e)) => {
                        error!(error = %e, "stream read failed");
                        let fault = if e.is_timeout() { TransportFault::Timeout } else { TransportFault::Receive };
                        emit(&feed, conversation, TransportEvent::Fault { fault, detail: e.to_string() }).await;
                        return;
                    }
                    Some(Ok(bytes)) => {
                        let out = decoder.push(&bytes);
                        if !out.text.is_empty() {
                            emit(&feed, conversation, TransportEvent::Chunk(out.text)).await;
                        }
                        if out.done {
                            emit(&feed, conversation, TransportEvent::Done).await;
                            return;
                        }
                    }
                }
            }
        }

        // Body ended without a terminal frame — treat it as completion.
        emit(&feed, conversation, TransportEvent::Done).await;
    }
}

// ── Private wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

// ── SSE decoding ─────────────────────────────────────────────────────────────

/// Decoded output of one network read unit: all content deltas concatenated,
/// plus whether the terminal frame was seen.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct SseOutput {
    pub text: String,
    pub done: bool,
}

/// Incremental `data:` frame decoder. Bytes may arrive split at arbitrary
/// boundaries; incomplete lines stay buffered until their newline shows up.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> SseOutput {
        self.buf.extend_from_slice(bytes);

        let mut out = SseOutput::default();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end();

            let Some(data) = line.strip_prefix("data:") else { continue };
            let data = data.trim_start();
            if data.is_empty() {
                continue;
            }
            if data == DONE_FRAME {
                out.done = true;
                continue;
            }

            match serde_json::from_str::<StreamFrame>(data) {
                Ok(frame) => {
                    if let Some(content) = frame
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                    {
                        out.text.push_str(&content);
                    }
                }
                // Malformed frames are dropped; the stream keeps going.
                Err(e) => warn!(error = %e, raw = %data, "malformed stream frame — skipping"),
            }
        }
        out
    }
}
