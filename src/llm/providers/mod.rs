//! Transport implementations.
//!
//! `build(ai, chat)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod polling;
pub mod scripted;
pub mod streaming;

use crate::config::{AiConfig, ChatConfig};
use crate::llm::{ProviderError, Transport};

/// Construct a [`Transport`] from config.
///
/// The `scripted` transport needs no network and replays a canned reply —
/// useful for trying the companion without a server.
pub fn build(ai: &AiConfig, chat: &ChatConfig) -> Result<Transport, ProviderError> {
    match ai.transport.as_str() {
        "stream" => {
            let t = streaming::StreamingTransport::new(
                ai.base_url.clone(),
                ai.api_key.clone(),
                ai.timeout_seconds,
            )?;
            Ok(Transport::Streaming(t))
        }
        "poll" => {
            let t = polling::PollingTransport::new(
                ai.base_url.clone(),
                ai.api_key.clone(),
                ai.timeout_seconds,
                chat.user_name.clone(),
            )?;
            Ok(Transport::Polling(t))
        }
        "scripted" => Ok(Transport::Scripted(scripted::ScriptedTransport::canned())),
        other => Err(ProviderError::UnknownTransport(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai(transport: &str) -> AiConfig {
        AiConfig {
            base_url: "http://127.0.0.1:8081/v1".into(),
            transport: transport.into(),
            timeout_seconds: 1,
            api_key: None,
        }
    }

    fn chat() -> ChatConfig {
        ChatConfig {
            system_prompt: "sys".into(),
            user_name: "User".into(),
            token_speed_ms: 100,
            top_k: 30,
            top_p: 0.9,
            temperature: 0.2,
            repeat_penalty: 1.1,
        }
    }

    #[test]
    fn builds_each_known_transport() {
        assert!(matches!(build(&ai("stream"), &chat()), Ok(Transport::Streaming(_))));
        assert!(matches!(build(&ai("poll"), &chat()), Ok(Transport::Polling(_))));
        assert!(matches!(build(&ai("scripted"), &chat()), Ok(Transport::Scripted(_))));
    }

    #[test]
    fn unknown_transport_errors() {
        let err = build(&ai("telepathy"), &chat()).unwrap_err();
        assert!(err.to_string().contains("telepathy"));
    }
}
