//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the rest of the crate
//! consumes. Raw TOML deserialization types live in `raw.rs`.

// ── AI endpoint ──────────────────────────────────────────────────────────────

/// Remote completion service configuration.
/// Populated from `[ai]` in the TOML.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Service base URL; request paths are appended to it.
    pub base_url: String,
    /// Which transport is active (`"stream"`, `"poll"`, `"scripted"`).
    pub transport: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Bearer token. `AICOM_API_KEY` env wins over the TOML value.
    pub api_key: Option<String>,
}

// ── Chat settings ────────────────────────────────────────────────────────────

/// The per-conversation settings blob.
/// Populated from `[chat]` in the TOML.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Injected as the system message when the transcript declares none.
    pub system_prompt: String,
    /// How the user person is written into the dialog.
    pub user_name: String,
    /// Insertion tick interval in milliseconds.
    pub token_speed_ms: u64,
    /// Sampling parameters, surfaced in the startup summary.
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub repeat_penalty: f32,
}

// ── Config (root) ────────────────────────────────────────────────────────────

/// Fully-resolved companion configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub ai: AiConfig,
    pub chat: ChatConfig,
}
