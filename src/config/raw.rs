//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape — serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub companion: RawCompanion,
    #[serde(default)]
    pub ai: RawAi,
    #[serde(default)]
    pub chat: RawChat,
}

#[derive(Deserialize)]
pub(super) struct RawCompanion {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RawCompanion {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

// ── AI endpoint ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawAi {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for RawAi {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            transport: default_transport(),
            timeout_seconds: default_timeout_seconds(),
            api_key: None,
        }
    }
}

// ── Chat settings ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawChat {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_token_speed")]
    pub token_speed: u64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            user_name: default_user_name(),
            token_speed: default_token_speed(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            temperature: default_temperature(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub(super) fn default_transport() -> String {
    "stream".to_string()
}

pub(super) fn default_timeout_seconds() -> u64 {
    120
}

pub(super) fn default_system_prompt() -> String {
    "You are the AI assistant. You talk with people and helps them.".to_string()
}

pub(super) fn default_user_name() -> String {
    "User".to_string()
}

pub(super) fn default_token_speed() -> u64 {
    100
}

pub(super) fn default_top_k() -> u32 {
    30
}

pub(super) fn default_top_p() -> f32 {
    0.9
}

pub(super) fn default_temperature() -> f32 {
    0.2
}

pub(super) fn default_repeat_penalty() -> f32 {
    1.1
}
