//! Scripted transport — replays a canned event sequence.
//!
//! Exercises the full bind/stream/insert round-trip without a network or an
//! API key. Selectable from config (`transport = "scripted"`) and used
//! heavily by the test suite with custom scripts.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::llm::{emit, EventFeed, TransportEvent};
use crate::transcript::Message;

#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Vec<TransportEvent>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<TransportEvent>) -> Self {
        Self { script: Arc::new(script) }
    }

    /// The single-reply script behind the `scripted` config selector.
    pub fn canned() -> Self {
        Self::new(vec![
            TransportEvent::Opened,
            TransportEvent::Chunk("(scripted reply)".to_string()),
            TransportEvent::Done,
        ])
    }

    pub async fn exchange(
        &self,
        conversation: Uuid,
        _messages: Vec<Message>,
        cancel: CancellationToken,
        feed: EventFeed,
    ) {
        for event in self.script.iter() {
            if cancel.is_cancelled() {
                return;
            }
            emit(&feed, conversation, event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn replays_the_script_in_order() {
        let t = ScriptedTransport::canned();
        let (tx, mut rx) = mpsc::channel(8);
        let id = Uuid::new_v4();
        t.exchange(id, vec![], CancellationToken::new(), tx).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.conversation, id);
        assert_eq!(first.event, TransportEvent::Opened);
        assert!(matches!(rx.recv().await.unwrap().event, TransportEvent::Chunk(_)));
        assert_eq!(rx.recv().await.unwrap().event, TransportEvent::Done);
    }

    #[tokio::test]
    async fn cancelled_exchange_stops_replaying() {
        let t = ScriptedTransport::canned();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        t.exchange(Uuid::new_v4(), vec![], cancel, tx).await;
        assert!(rx.recv().await.is_none());
    }
}
