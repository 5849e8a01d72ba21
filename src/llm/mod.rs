//! Completion transport abstraction.
//!
//! `Transport` is an enum over concrete transport implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Transport instances are shared immutable capabilities — clone them freely
//! (`reqwest::Client` is an `Arc` internally). Enum dispatch avoids `dyn`
//! trait objects and the `async-trait` dependency.
//!
//! An exchange runs as its own spawned task holding a `CancellationToken`,
//! feeding [`ConversationEvent`]s to the session. Events are tagged with the
//! conversation id they belong to; the session drops events whose id no
//! longer matches the active conversation.

pub mod providers;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::transcript::{Message, ASSISTANT_MARKER, USER_MARKER};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
    #[error("transport request failed: {0}")]
    Request(String),
}

// ── Events ───────────────────────────────────────────────────────────────────

/// Which phase of the exchange failed. Maps 1:1 onto the session's error
/// sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    Send,
    Receive,
    Timeout,
}

/// One unit of transport output.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The request was accepted; reading may begin.
    Opened,
    /// A decoded increment of assistant text.
    Chunk(String),
    /// The exchange finished normally.
    Done,
    /// The exchange failed at the given site.
    Fault { fault: TransportFault, detail: String },
}

/// A [`TransportEvent`] tagged with the conversation it belongs to.
#[derive(Debug, Clone)]
pub struct ConversationEvent {
    pub conversation: Uuid,
    pub event: TransportEvent,
}

/// Channel the exchange task feeds and the session drains.
pub type EventFeed = mpsc::Sender<ConversationEvent>;

pub(crate) async fn emit(feed: &EventFeed, conversation: Uuid, event: TransportEvent) {
    // A dropped receiver means the session is gone; nothing left to tell.
    let _ = feed.send(ConversationEvent { conversation, event }).await;
}

// ── Transport enum ───────────────────────────────────────────────────────────

/// All available transport backends.
///
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum Transport {
    Streaming(providers::streaming::StreamingTransport),
    Polling(providers::polling::PollingTransport),
    Scripted(providers::scripted::ScriptedTransport),
}

impl Transport {
    /// Marker appended when the assistant turn opens.
    pub fn assistant_marker(&self) -> String {
        match self {
            Transport::Streaming(_) | Transport::Scripted(_) => {
                format!("\n\n{ASSISTANT_MARKER}\n")
            }
            Transport::Polling(p) => p.assistant_marker(),
        }
    }

    /// Marker appended after the exchange completes, opening the next user
    /// turn.
    pub fn user_marker(&self) -> String {
        match self {
            Transport::Streaming(_) | Transport::Scripted(_) => {
                format!("\n\n{USER_MARKER}\n")
            }
            Transport::Polling(p) => p.user_marker(),
        }
    }

    /// Run one exchange as a cancellable task.
    ///
    /// The task sends `Opened` (or a `Fault`) first, then `Chunk`s, then
    /// `Done`. Cancelling the token stops it without a closing event — the
    /// session has already moved on by then.
    pub fn spawn_exchange(
        &self,
        conversation: Uuid,
        messages: Vec<Message>,
        cancel: CancellationToken,
        feed: EventFeed,
    ) -> JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move {
            match transport {
                Transport::Streaming(t) => t.exchange(conversation, messages, cancel, feed).await,
                Transport::Polling(t) => t.exchange(conversation, messages, cancel, feed).await,
                Transport::Scripted(t) => t.exchange(conversation, messages, cancel, feed).await,
            }
        })
    }
}
