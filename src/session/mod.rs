//! Companion session — the one conversation in flight.
//!
//! Owns the [`GenerationState`], the bound editor handle, and the feed of
//! transport events. There is exactly one session per process and at most
//! one conversation active at a time; everything here runs on a single
//! cooperative task (see `service.rs` for the run-loop).
//!
//! # Module layout
//!
//! - **mod** — state enum, commands/events, bind toggle, request dispatch.
//! - **service** — run-loop and the tick-driven insertion machinery.

mod service;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::editor::{EditorHandle, Position};
use crate::llm::{ConversationEvent, Transport};
use crate::transcript::{self, USER_MARKER};

// ── GenerationState ──────────────────────────────────────────────────────────

/// Where the session is in the request/stream cycle. Error states are
/// terminal for the conversation: reaching one detaches the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Stop,
    Query,
    Read,
    Paused,
    SendError,
    ReceiveError,
    TimeoutError,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Stop => "stop",
            GenerationState::Query => "query",
            GenerationState::Read => "read",
            GenerationState::Paused => "paused",
            GenerationState::SendError => "send-error",
            GenerationState::ReceiveError => "receive-error",
            GenerationState::TimeoutError => "timeout-error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            GenerationState::SendError | GenerationState::ReceiveError | GenerationState::TimeoutError
        )
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Commands & events ────────────────────────────────────────────────────────

/// Requests from a comms channel to the session.
pub enum Command {
    /// Bind the conversation to `editor`, or unbind when already bound to
    /// the same handle.
    Toggle { editor: EditorHandle },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Toggle { .. } => f.debug_struct("Toggle").finish_non_exhaustive(),
        }
    }
}

/// Notifications from the session to whichever channel is rendering it.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A user-visible notice.
    Notice(String),
    /// Text inserted into the bound editor (echo for the terminal).
    Inserted(String),
    /// State or token-count change — the status-bar feed.
    StateChanged { state: GenerationState, tokens: u64 },
}

// ── Companion ────────────────────────────────────────────────────────────────

pub struct Companion {
    transport: Transport,
    system_prompt: String,
    token_speed: Duration,
    state: GenerationState,
    editor: Option<EditorHandle>,
    /// Identity of the active conversation; feed events carrying any other
    /// id are stale and dropped.
    conversation: Option<Uuid>,
    /// Cancels the in-flight exchange task.
    cancel: Option<CancellationToken>,
    /// Flooding guard — set while one read unit is being applied.
    flooding: bool,
    tokens: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    feed_tx: mpsc::Sender<ConversationEvent>,
    feed_rx: mpsc::Receiver<ConversationEvent>,
}

impl Companion {
    pub fn new(
        transport: Transport,
        chat: &ChatConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (feed_tx, feed_rx) = mpsc::channel(64);
        Self {
            transport,
            system_prompt: chat.system_prompt.clone(),
            token_speed: Duration::from_millis(chat.token_speed_ms.max(1)),
            state: GenerationState::Stop,
            editor: None,
            conversation: None,
            cancel: None,
            flooding: false,
            tokens: 0,
            events,
            feed_tx,
            feed_rx,
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn is_bound(&self) -> bool {
        self.editor.is_some()
    }

    // ── Bind toggle ──────────────────────────────────────────────────────────

    /// The bind action. Binding the editor already bound closes the
    /// conversation and opens the next user turn; anything else starts a
    /// fresh conversation on `editor`.
    pub async fn toggle(&mut self, editor: EditorHandle) {
        let already_bound = self
            .editor
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, &editor));

        if already_bound {
            self.set_state(GenerationState::Paused);
            let marker = self.transport.user_marker();
            self.append(&marker).await;
            self.set_state(GenerationState::Stop);
            self.notice("AICom unset");
        } else {
            // Rebinding mid-conversation abandons the old exchange.
            if let Some(cancel) = self.cancel.take() {
                cancel.cancel();
            }
            self.set_state(GenerationState::Query);
            self.editor = Some(editor);
            self.notice("AICom set");
            self.send_request().await;
        }
    }

    // ── Request dispatch ─────────────────────────────────────────────────────

    /// Rebuild the conversation from the buffer and start an exchange.
    ///
    /// Blocks until the transport's opening verdict (`Opened` or a fault)
    /// has been applied — mirroring a request whose headers must arrive
    /// before reading starts.
    async fn send_request(&mut self) {
        let Some(editor) = self.editor.clone() else { return };

        let (text, fallback_origin) = {
            let mut ed = editor.lock().await;
            if let Some((start, end)) = ed.selection() {
                let text = ed.text_in(start, end);
                // Continue inserting after the selection.
                ed.set_cursor(end);
                (text, None)
            } else {
                let origin = Position::default();
                let cursor = ed.cursor();
                (ed.text_in(origin, cursor), Some(origin))
            }
        };

        let parsed = transcript::parse(&text, &self.system_prompt);
        if parsed.fallback_user {
            if let Some(origin) = fallback_origin {
                editor
                    .lock()
                    .await
                    .replace_range(&format!("{USER_MARKER}\n"), origin);
            }
        }
        debug!(
            turns = parsed.messages.len(),
            params = ?parsed.params,
            fallback = parsed.fallback_user,
            "transcript parsed"
        );

        let conversation = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.conversation = Some(conversation);
        self.cancel = Some(cancel.clone());
        self.transport
            .spawn_exchange(conversation, parsed.messages, cancel, self.feed_tx.clone());

        // Wait for the opening verdict, skipping leftovers from abandoned
        // conversations.
        loop {
            match self.feed_rx.recv().await {
                Some(ev) if Some(ev.conversation) == self.conversation => {
                    self.on_feed_event(ev).await;
                    break;
                }
                Some(ev) => {
                    debug!(conversation = %ev.conversation, "dropping stale transport event");
                }
                None => {
                    self.set_state(GenerationState::SendError);
                    break;
                }
            }
        }
    }

    // ── State & plumbing ─────────────────────────────────────────────────────

    pub(crate) fn set_state(&mut self, next: GenerationState) {
        self.state = next;
        if next.is_error() {
            self.detach();
            self.notice("AI conversation unset on error");
        } else if next == GenerationState::Stop {
            self.detach();
        } else if next == GenerationState::Read {
            self.flooding = false;
        }
        debug!(state = %self.state, "generation state");
        let _ = self.events.send(SessionEvent::StateChanged {
            state: self.state,
            tokens: self.tokens,
        });
    }

    /// Drop the editor binding and cancel any in-flight exchange.
    fn detach(&mut self) {
        self.editor = None;
        self.conversation = None;
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    async fn append(&mut self, text: &str) {
        let Some(editor) = self.editor.clone() else { return };
        editor.lock().await.append_at_cursor(text);
        let _ = self.events.send(SessionEvent::Inserted(text.to_string()));
    }

    fn notice(&self, msg: &str) {
        info!(notice = %msg);
        let _ = self.events.send(SessionEvent::Notice(msg.to_string()));
    }
}
