//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the `-f` path), then applies `AICOM_LOG_LEVEL` and `AICOM_API_KEY`
//! env overrides. Falls back to built-in defaults when no file exists, so
//! the binary runs out of the box against a local OpenAI-compatible server.
//!
//! # Module layout
//!
//! - **types** — Resolved configuration structs the rest of the crate
//!   consumes (`Config`, `AiConfig`, `ChatConfig`).
//! - **raw** — Raw TOML deserialization types mirroring the file shape,
//!   with serde defaults; kept private.
//! - **load** — Loading logic: `load`, `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;
