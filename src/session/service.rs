//! Session run-loop and the tick-driven insertion machinery.
//!
//! A fixed-interval tick (the `token_speed` setting) drives insertion while
//! a conversation is being read: each tick performs at most one unit of work
//! behind the flooding guard — drain one transport event, apply it at the
//! cursor, release the guard. The transport task itself just fills the feed;
//! all buffer writes happen here, on the session task.

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::llm::{ConversationEvent, TransportEvent, TransportFault};

use super::{Command, Companion, GenerationState, SessionEvent};

impl Companion {
    /// Drive the session until `shutdown` fires. Commands arrive from the
    /// active comms channel; the tick only does work while reading.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(self.token_speed);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_ms = self.token_speed.as_millis() as u64, "companion session running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("companion session shutting down");
                    break;
                }

                Some(cmd) = commands.recv() => match cmd {
                    Command::Toggle { editor } => self.toggle(editor).await,
                },

                _ = tick.tick() => self.flood_once().await,
            }
        }
    }

    /// One guarded read unit: drain at most one feed event and apply it.
    pub async fn flood_once(&mut self) {
        if self.flooding || self.editor.is_none() || self.state != GenerationState::Read {
            return;
        }
        self.flooding = true;
        if let Ok(ev) = self.feed_rx.try_recv() {
            self.on_feed_event(ev).await;
        }
        self.flooding = false;
    }

    /// Apply one transport event to the session.
    pub(super) async fn on_feed_event(&mut self, ev: ConversationEvent) {
        if Some(ev.conversation) != self.conversation {
            debug!(conversation = %ev.conversation, "dropping stale transport event");
            return;
        }

        match ev.event {
            TransportEvent::Opened => {
                let marker = self.transport.assistant_marker();
                self.append(&marker).await;
                self.set_state(GenerationState::Read);
            }
            TransportEvent::Chunk(text) => {
                if !text.is_empty() {
                    self.append(&text).await;
                    self.tokens += 1;
                    let _ = self.events.send(SessionEvent::StateChanged {
                        state: self.state,
                        tokens: self.tokens,
                    });
                }
            }
            TransportEvent::Done => {
                let marker = self.transport.user_marker();
                self.append(&marker).await;
                self.set_state(GenerationState::Stop);
            }
            TransportEvent::Fault { fault, detail } => {
                let next = match fault {
                    TransportFault::Send => GenerationState::SendError,
                    TransportFault::Receive => GenerationState::ReceiveError,
                    TransportFault::Timeout => GenerationState::TimeoutError,
                };
                self.set_state(next);
                let label = match fault {
                    TransportFault::Send => "AICom query error",
                    TransportFault::Receive => "AI conversation receive error",
                    TransportFault::Timeout => "AI conversation timeout",
                };
                self.notice(&format!("{label}: {detail}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::{mpsc, Mutex};
    use uuid::Uuid;

    use crate::config::ChatConfig;
    use crate::editor::{EditorHandle, MemoryBuffer};
    use crate::llm::providers::scripted::ScriptedTransport;
    use crate::llm::{ConversationEvent, Transport, TransportEvent};

    use super::super::{Companion, GenerationState, SessionEvent};

    fn chat() -> ChatConfig {
        ChatConfig {
            system_prompt: "You are the AI assistant.".into(),
            user_name: "User".into(),
            token_speed_ms: 100,
            top_k: 30,
            top_p: 0.9,
            temperature: 0.2,
            repeat_penalty: 1.1,
        }
    }

    fn companion(script: Vec<TransportEvent>) -> (Companion, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Transport::Scripted(ScriptedTransport::new(script));
        (Companion::new(transport, &chat(), tx), rx)
    }

    fn buffer(text: &str) -> (Arc<Mutex<MemoryBuffer>>, EditorHandle) {
        let buf = Arc::new(Mutex::new(MemoryBuffer::from_text(text)));
        let handle: EditorHandle = buf.clone();
        (buf, handle)
    }

    async fn drain(companion: &mut Companion) {
        for _ in 0..100 {
            companion.flood_once().await;
            if companion.state() != GenerationState::Read {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn stale_events_are_dropped() {
        let (mut companion, _events) =
            companion(vec![TransportEvent::Opened, TransportEvent::Chunk("live".into())]);
        let (buf, handle) = buffer("==User==\nhi\n");
        companion.toggle(handle).await;
        assert_eq!(companion.state(), GenerationState::Read);

        // An event from some other conversation must not touch the buffer.
        let stale = ConversationEvent {
            conversation: Uuid::new_v4(),
            event: TransportEvent::Chunk("STALE".into()),
        };
        companion.on_feed_event(stale).await;
        assert!(!buf.lock().await.text().contains("STALE"));
        assert_eq!(companion.tokens(), 0);
    }

    #[tokio::test]
    async fn fault_detaches_and_names_the_site() {
        let (mut companion, mut events) = companion(vec![TransportEvent::Fault {
            fault: crate::llm::TransportFault::Receive,
            detail: "connection reset".into(),
        }]);
        let (_buf, handle) = buffer("==User==\nhi\n");
        companion.toggle(handle).await;

        assert_eq!(companion.state(), GenerationState::ReceiveError);
        assert!(!companion.is_bound());

        let mut notices = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if let SessionEvent::Notice(msg) = ev {
                notices.push(msg);
            }
        }
        assert!(notices.iter().any(|n| n.contains("unset on error")));
        assert!(notices.iter().any(|n| n.contains("connection reset")));
    }

    #[tokio::test]
    async fn unbind_mid_read_cancels_and_opens_user_turn() {
        // Script never completes — the conversation stays in `read`.
        let (mut companion, _events) = companion(vec![
            TransportEvent::Opened,
            TransportEvent::Chunk("partial".into()),
        ]);
        let (buf, handle) = buffer("==User==\nhi\n");
        companion.toggle(handle.clone()).await;

        // Let the chunk land.
        for _ in 0..100 {
            companion.flood_once().await;
            if companion.tokens() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(companion.tokens(), 1);

        companion.toggle(handle).await;
        assert_eq!(companion.state(), GenerationState::Stop);
        assert!(!companion.is_bound());
        assert!(buf.lock().await.text().ends_with("\n\n==User==\n"));
    }

    #[tokio::test]
    async fn drained_conversation_counts_tokens_per_chunk() {
        let (mut companion, _events) = companion(vec![
            TransportEvent::Opened,
            TransportEvent::Chunk("Hi".into()),
            TransportEvent::Chunk(" there".into()),
            TransportEvent::Done,
        ]);
        let (_buf, handle) = buffer("==User==\nhi\n");
        companion.toggle(handle).await;
        drain(&mut companion).await;

        assert_eq!(companion.state(), GenerationState::Stop);
        assert_eq!(companion.tokens(), 2);
    }
}
