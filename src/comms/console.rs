//! Console channel — a line-based conversation surface over stdin/stdout.
//!
//! Typed lines accumulate into an in-memory buffer at the cursor, exactly
//! as they would in a real editing surface; `/go` toggles the conversation
//! binding, and streamed insertions are echoed to the terminal as they land
//! in the buffer. Runs until the `shutdown` token is cancelled (Ctrl-C) or
//! stdin is closed.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::editor::{Editor, EditorHandle, MemoryBuffer};
use crate::error::AppError;
use crate::runtime::{Component, ComponentFuture};
use crate::session::{Command, GenerationState, SessionEvent};

// ── ConsoleChannel ───────────────────────────────────────────────────────────

pub struct ConsoleChannel {
    channel_id: String,
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ConsoleChannel {
    pub fn new(
        channel_id: impl Into<String>,
        commands: mpsc::Sender<Command>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self { channel_id: channel_id.into(), commands, events }
    }
}

impl Component for ConsoleChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_console(self.channel_id, self.commands, self.events, shutdown))
    }
}

// ── run_console ──────────────────────────────────────────────────────────────

async fn run_console(
    channel_id: String,
    commands: mpsc::Sender<Command>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "console channel started");
    println!("─────────────────────────────────");
    println!(" AICom console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");
    println!(" Type transcript lines; /go binds or unbinds the conversation.");

    // The console's buffer is the "document" the conversation binds to.
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new()));

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut status = (GenerationState::Stop, 0u64);

    prompt();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\n[console] shutdown signal received — closing channel");
                info!("console channel shutting down");
                break;
            }

            Some(event) = events.recv() => render(event, &mut status),

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        if !handle_line(&input, &buffer, &commands, &status).await {
                            break;
                        }
                        prompt();
                    }
                }
            }
        }
    }

    Ok(())
}

fn prompt() {
    print!("> ");
    use std::io::Write as _;
    let _ = std::io::stdout().flush();
}

fn render(event: SessionEvent, status: &mut (GenerationState, u64)) {
    match event {
        SessionEvent::Inserted(text) => {
            print!("{text}");
            use std::io::Write as _;
            let _ = std::io::stdout().flush();
        }
        SessionEvent::Notice(msg) => println!("\n[aicom] {msg}"),
        SessionEvent::StateChanged { state, tokens } => *status = (state, tokens),
    }
}

/// Handle one typed line; returns `false` when the channel should exit.
async fn handle_line(
    input: &str,
    buffer: &Arc<Mutex<MemoryBuffer>>,
    commands: &mpsc::Sender<Command>,
    status: &(GenerationState, u64),
) -> bool {
    match input.trim_end() {
        "/go" => {
            let editor: EditorHandle = buffer.clone();
            if let Err(e) = commands.send(Command::Toggle { editor }).await {
                warn!("command send error: {e}, console exiting");
                return false;
            }
        }
        "/status" => {
            let (state, tokens) = status;
            if *tokens > 0 {
                println!("AICom: {state} {tokens}");
            } else {
                println!("AICom: {state}");
            }
        }
        "/show" => println!("{}", buffer.lock().await.text()),
        "/quit" => return false,
        "/help" => {
            println!(" /go      bind or unbind the conversation");
            println!(" /status  show generation state and token count");
            println!(" /show    dump the buffer");
            println!(" /quit    exit");
            println!(" Anything else is appended to the buffer at the cursor.");
        }
        _ => {
            // Blank lines matter: they are what lets the next marker line
            // open a block.
            debug!(line = %input, "console appending line");
            buffer.lock().await.append_at_cursor(&format!("{input}\n"));
        }
    }
    true
}
