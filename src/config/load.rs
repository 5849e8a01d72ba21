//! Loading logic: TOML file → resolved [`Config`], with env-var overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. If no path is given and `config/default.toml` does not
/// exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let log_level_override = env::var("AICOM_LOG_LEVEL").ok();
    let api_key_override = env::var("AICOM_API_KEY").ok();

    if let Some(path) = config_path {
        return load_from(
            &expand_home(path),
            log_level_override.as_deref(),
            api_key_override,
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, log_level_override.as_deref(), api_key_override)
    } else {
        Ok(resolve(
            RawConfig::default(),
            log_level_override.as_deref(),
            api_key_override,
        ))
    }
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    api_key_override: Option<String>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("config error in {}: {e}", path.display())))?;

    Ok(resolve(parsed, log_level_override, api_key_override))
}

fn resolve(
    parsed: RawConfig,
    log_level_override: Option<&str>,
    api_key_override: Option<String>,
) -> Config {
    let log_level = log_level_override
        .map(str::to_string)
        .unwrap_or(parsed.companion.log_level);

    let api_key = api_key_override
        .or(parsed.ai.api_key)
        .filter(|k| !k.is_empty());

    Config {
        log_level,
        ai: AiConfig {
            base_url: parsed.ai.base_url,
            transport: parsed.ai.transport,
            timeout_seconds: parsed.ai.timeout_seconds,
            api_key,
        },
        chat: ChatConfig {
            system_prompt: parsed.chat.system_prompt,
            user_name: parsed.chat.user_name,
            // A zero interval would spin the insertion tick.
            token_speed_ms: parsed.chat.token_speed.max(1),
            top_k: parsed.chat.top_k,
            top_p: parsed.chat.top_p,
            temperature: parsed.chat.temperature,
            repeat_penalty: parsed.chat.repeat_penalty,
        },
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
