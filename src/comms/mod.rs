//! Comms — the user-facing surfaces of the companion.
//!
//! Each channel implements [`Component`] and is spawned as an independent
//! task by [`start`]. Exactly one channel runs per process:
//!
//! - **console** (interactive) — a line-based console owning an in-memory
//!   buffer; typed lines build the transcript, `/go` toggles the binding.
//! - **pipe** (non-interactive) — reads the whole transcript from stdin,
//!   binds once, streams the reply to stdout and exits.
//!
//! Channels talk to the session through its command sender and render its
//! event feed; they never touch the generation state directly.

pub mod console;
pub mod pipe;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::runtime::{spawn_components, Component, RuntimeHandle};
use crate::session::{Command, SessionEvent};

/// Spawn the configured channel and return a [`RuntimeHandle`].
///
/// Synchronous — returns as soon as the task is spawned; the caller decides
/// when to await it.
pub fn start(
    interactive: bool,
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: CancellationToken,
) -> RuntimeHandle {
    let mut components: Vec<Box<dyn Component>> = Vec::new();

    if interactive {
        info!("loading console channel");
        components.push(Box::new(console::ConsoleChannel::new("console0", commands, events)));
    } else {
        info!("loading pipe channel");
        components.push(Box::new(pipe::PipeChannel::new("pipe0", commands, events)));
    }

    spawn_components(components, shutdown)
}
