//! Long-poll transport (`POST /system`, `POST /send`, `GET /receive`).
//!
//! The wire format predates the marker-line transcript: bodies are plain
//! text, the dialog is rendered as `Name: content` paragraphs, and the
//! server signals completion by answering a `/receive` poll with a literal
//! sentinel body.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use crate::llm::{emit, EventFeed, ProviderError, TransportEvent, TransportFault};
use crate::transcript::{self, Message, Role};

/// Poll body that ends the exchange.
pub const END_SENTINEL: &str = "==Done==";

// ── Public transport ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PollingTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    user_name: String,
}

impl PollingTransport {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_seconds: u64,
        user_name: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            user_name,
        })
    }

    /// Dialog-style marker opening the assistant turn.
    pub fn assistant_marker(&self) -> String {
        "\n\nAICom: ".to_string()
    }

    /// Dialog-style marker opening the next user turn.
    pub fn user_marker(&self) -> String {
        format!("\n\n{}: ", self.user_name)
    }

    /// Run one exchange: push the system prompt and rendered dialog, then
    /// poll `/receive` until the sentinel, a fault, or cancellation.
    pub async fn exchange(
        &self,
        conversation: Uuid,
        messages: Vec<Message>,
        cancel: CancellationToken,
        feed: EventFeed,
    ) {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let dialog = transcript::render_plain(&messages, &self.user_name);

        if let Err((fault, detail)) = self.post_text("/system", system).await {
            emit(&feed, conversation, TransportEvent::Fault { fault, detail }).await;
            return;
        }
        if let Err((fault, detail)) = self.post_text("/send", dialog).await {
            emit(&feed, conversation, TransportEvent::Fault { fault, detail }).await;
            return;
        }

        emit(&feed, conversation, TransportEvent::Opened).await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(%conversation, "exchange cancelled");
                    return;
                }

                received = self.receive_once() => match received {
                    Ok(body) if body == END_SENTINEL => {
                        emit(&feed, conversation, TransportEvent::Done).await;
                        return;
                    }
                    Ok(body) => {
                        if !body.is_empty() {
                            emit(&feed, conversation, TransportEvent::Chunk(body)).await;
                        }
                    }
                    Err((fault, detail)) => {
                        emit(&feed, conversation, TransportEvent::Fault { fault, detail }).await;
                        return;
                    }
                }
            }
        }
    }

    async fn post_text(&self, path: &str, body: String) -> Result<(), (TransportFault, String)> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, bytes = body.len(), "posting plain-text body");

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(%url, error = %e, "post failed (transport)");
            let fault = if e.is_timeout() { TransportFault::Timeout } else { TransportFault::Send };
            (fault, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(%url, %status, "post rejected");
            return Err((TransportFault::Send, format!("HTTP {status}")));
        }
        Ok(())
    }

    /// One long-poll unit of work against `/receive`.
    async fn receive_once(&self) -> Result<String, (TransportFault, String)> {
        let url = format!("{}/receive", self.base_url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let fault = if e.is_timeout() { TransportFault::Timeout } else { TransportFault::Receive };
            (fault, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err((TransportFault::Receive, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| (TransportFault::Receive, e.to_string()))
    }
}
