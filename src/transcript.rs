//! Transcript parsing — marker-delimited buffer text → role-tagged messages.
//!
//! A conversation lives in the buffer as blocks opened by literal marker
//! lines (`==System==`, `==User==`, `==AICom==`, `==Params==`). A marker only
//! opens a block when the previous line was blank (or at the very start of
//! the input); anywhere else the line is ordinary content. The message list
//! is immutable and rebuilt from the buffer on every request.

use serde::Serialize;

/// Marker opening a params block.
pub const PARAMS_MARKER: &str = "==Params==";
/// Marker opening a system block.
pub const SYSTEM_MARKER: &str = "==System==";
/// Marker opening a user block.
pub const USER_MARKER: &str = "==User==";
/// Marker opening an assistant block.
pub const ASSISTANT_MARKER: &str = "==AICom==";

// ── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of the conversation as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

// ── Parse result ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTranscript {
    /// Ordered conversation. The first message is always the system message:
    /// either an explicit `==System==` block or the configured default.
    pub messages: Vec<Message>,
    /// Params block content: `Value::String` when text was present, an empty
    /// object when the block was blank, `None` when no block appeared.
    // TODO: a blank ==Params== block should probably be dropped instead of
    // normalized to an empty object — needs a decision on what existing
    // transcripts expect.
    pub params: Option<serde_json::Value>,
    /// True when no marker block was found and the whole input became a
    /// single user message.
    pub fallback_user: bool,
}

// ── Parser ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum BlockKind {
    None,
    Params,
    Message,
}

/// Parse buffer text (start or selection up to the cursor) into a transcript.
///
/// `default_system` is unshifted as the system message when the text declares
/// no `==System==` block.
pub fn parse(text: &str, default_system: &str) -> ParsedTranscript {
    let mut messages: Vec<Message> = Vec::new();
    let mut params = String::new();
    let mut params_seen = false;
    let mut message = String::new();
    let mut role: Option<Role> = None;
    let mut block = BlockKind::None;
    let mut system_used = false;
    // Only a blank-preceded line can open a block; the input start counts.
    let mut at_boundary = true;

    for line in text.split('\n') {
        let mut opened = false;
        if at_boundary {
            match line {
                PARAMS_MARKER => {
                    block = BlockKind::Params;
                    params.clear();
                    params_seen = true;
                    opened = true;
                }
                SYSTEM_MARKER | USER_MARKER | ASSISTANT_MARKER => {
                    if let Some(r) = role {
                        if !message.is_empty() {
                            messages.push(Message::new(r, message.trim_end()));
                        }
                    }
                    role = Some(match line {
                        SYSTEM_MARKER => {
                            system_used = true;
                            Role::System
                        }
                        USER_MARKER => Role::User,
                        _ => Role::Assistant,
                    });
                    block = BlockKind::Message;
                    message.clear();
                    opened = true;
                }
                _ => {}
            }
        }

        if !opened {
            match block {
                BlockKind::Params => {
                    if !params.is_empty() {
                        params.push('\n');
                    }
                    params.push_str(line);
                }
                BlockKind::Message => {
                    if !message.is_empty() {
                        message.push('\n');
                    }
                    message.push_str(line);
                }
                BlockKind::None => {}
            }
        }

        at_boundary = line.is_empty();
    }

    if let Some(r) = role {
        if !message.is_empty() {
            messages.push(Message::new(r, message.trim_end()));
        }
    }

    let mut fallback_user = false;
    if messages.is_empty() {
        messages.push(Message::new(Role::User, text));
        fallback_user = true;
    }

    if !system_used {
        messages.insert(0, Message::new(Role::System, default_system));
    }

    let params = if params_seen {
        let trimmed = params.trim_end();
        if trimmed.is_empty() {
            Some(serde_json::Value::Object(serde_json::Map::new()))
        } else {
            Some(serde_json::Value::String(trimmed.to_string()))
        }
    } else {
        None
    };

    ParsedTranscript { messages, params, fallback_user }
}

// ── Plain-text rendering ─────────────────────────────────────────────────────

/// Render the non-system turns as a plain-text dialog (`Name: content`
/// paragraphs), the shape the polling transport posts to `/send`.
pub fn render_plain(messages: &[Message], user_name: &str) -> String {
    let mut turns = Vec::new();
    for m in messages {
        match m.role {
            Role::System => continue,
            Role::User => turns.push(format!("{user_name}: {}", m.content)),
            Role::Assistant => turns.push(format!("AICom: {}", m.content)),
        }
    }
    turns.join("\n\n")
}
