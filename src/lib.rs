//! AICom — buffer-transcript chat companion.
//!
//! Turns a text buffer into a chat transcript with a remote completion
//! service: parses marker-delimited buffer content into a role-tagged
//! conversation, issues the request, and streams the reply back into the
//! buffer chunk-by-chunk behind a small generation-state machine.
//!
//! # Crate layout
//!
//! - [`transcript`] — marker-line parser and message types
//! - [`editor`] — host editor seam and the in-memory buffer
//! - [`llm`] — completion transports (streaming, long-poll, scripted)
//! - [`session`] — generation state machine and insertion loop
//! - [`comms`] — console and pipe channels
//! - [`config`], [`logger`], [`error`], [`runtime`] — ambient plumbing

pub mod comms;
pub mod config;
pub mod editor;
pub mod error;
pub mod llm;
pub mod logger;
pub mod runtime;
pub mod session;
pub mod transcript;
