//! Pipe channel — one-shot transcript completion over stdin/stdout.
//!
//! Reads the whole transcript from stdin, binds the conversation once, and
//! echoes streamed insertions to stdout until the session returns to `stop`
//! (success) or lands in an error state (non-zero exit). Fits shell usage:
//!
//! ```text
//! aicom < chat.md >> chat.md
//! ```

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::editor::{EditorHandle, MemoryBuffer};
use crate::error::AppError;
use crate::runtime::{Component, ComponentFuture};
use crate::session::{Command, SessionEvent};

// ── PipeChannel ──────────────────────────────────────────────────────────────

pub struct PipeChannel {
    channel_id: String,
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl PipeChannel {
    pub fn new(
        channel_id: impl Into<String>,
        commands: mpsc::Sender<Command>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self { channel_id: channel_id.into(), commands, events }
    }
}

impl Component for PipeChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pipe(self.channel_id, self.commands, self.events, shutdown))
    }
}

// ── run_pipe ─────────────────────────────────────────────────────────────────

async fn run_pipe(
    channel_id: String,
    commands: mpsc::Sender<Command>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    if text.trim().is_empty() {
        return Err(AppError::Comms("empty input — nothing to complete".into()));
    }

    info!(%channel_id, bytes = text.len(), "pipe channel read transcript");

    let editor: EditorHandle = Arc::new(Mutex::new(MemoryBuffer::from_text(&text)));
    commands
        .send(Command::Toggle { editor })
        .await
        .map_err(|e| AppError::Comms(format!("session unavailable: {e}")))?;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("pipe channel shutting down");
                break;
            }

            event = events.recv() => match event {
                None => break,
                Some(SessionEvent::Inserted(chunk)) => {
                    print!("{chunk}");
                    use std::io::Write as _;
                    let _ = std::io::stdout().flush();
                }
                Some(SessionEvent::Notice(msg)) => eprintln!("[aicom] {msg}"),
                Some(SessionEvent::StateChanged { state, .. }) => {
                    if state.is_error() {
                        return Err(AppError::Comms(format!(
                            "conversation ended in error state: {state}"
                        )));
                    }
                    if state == crate::session::GenerationState::Stop {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
