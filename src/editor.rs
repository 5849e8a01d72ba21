//! Host editor seam.
//!
//! The companion consumes a host editor — it never owns one. [`Editor`] is
//! the narrow surface it needs: cursor, selection, range read, range write.
//! [`MemoryBuffer`] is the in-process implementation backing the bundled
//! console and pipe channels and the test suite.

use std::sync::Arc;

use tokio::sync::Mutex;

// ── Position ─────────────────────────────────────────────────────────────────

/// A line/character coordinate in the buffer. `ch` counts characters, not
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

// ── Editor trait ─────────────────────────────────────────────────────────────

/// The host-owned editing surface, as seen by the companion.
pub trait Editor: Send {
    fn cursor(&self) -> Position;

    fn set_cursor(&mut self, pos: Position);

    /// Normalized selection range (`start <= end`), if anything is selected.
    fn selection(&self) -> Option<(Position, Position)>;

    /// Text between two positions (clamped to the buffer).
    fn text_in(&self, from: Position, to: Position) -> String;

    /// Insert `text` at `at`. The cursor keeps pointing at the same content,
    /// shifting when the insertion lands before it.
    fn replace_range(&mut self, text: &str, at: Position);

    /// Insert at the cursor and advance it past the insertion.
    fn append_at_cursor(&mut self, text: &str);
}

/// Shared handle to the editor bound to the active conversation. Held by the
/// session only between bind and stop/error/unbind.
pub type EditorHandle = Arc<Mutex<dyn Editor>>;

// ── MemoryBuffer ─────────────────────────────────────────────────────────────

/// A plain in-memory [`Editor`].
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    text: String,
    cursor: Position,
    selection: Option<(Position, Position)>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer holding `text` with the cursor at the end.
    pub fn from_text(text: &str) -> Self {
        let mut buf = Self { text: text.to_string(), ..Self::default() };
        buf.cursor = buf.pos_at(buf.text.len());
        buf
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Mark a selection; the range is normalized so start <= end.
    pub fn set_selection(&mut self, a: Position, b: Position) {
        self.selection = if a <= b { Some((a, b)) } else { Some((b, a)) };
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Byte offset of a position, clamped to the buffer.
    fn offset_of(&self, pos: Position) -> usize {
        let mut offset = 0usize;
        for (idx, line) in self.text.split('\n').enumerate() {
            if idx == pos.line {
                let within: usize = line.chars().take(pos.ch).map(char::len_utf8).sum();
                return offset + within;
            }
            offset += line.len() + 1;
        }
        self.text.len()
    }

    /// Position at a byte offset (must sit on a char boundary).
    fn pos_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let before = &self.text[..offset];
        match before.rsplit_once('\n') {
            Some((head, tail)) => Position::new(head.matches('\n').count() + 1, tail.chars().count()),
            None => Position::new(0, before.chars().count()),
        }
    }
}

impl Editor for MemoryBuffer {
    fn cursor(&self) -> Position {
        self.cursor
    }

    fn set_cursor(&mut self, pos: Position) {
        // Clamp through the offset round-trip so the cursor always lands on
        // real text.
        self.cursor = self.pos_at(self.offset_of(pos));
    }

    fn selection(&self) -> Option<(Position, Position)> {
        self.selection
    }

    fn text_in(&self, from: Position, to: Position) -> String {
        let a = self.offset_of(from);
        let b = self.offset_of(to);
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.text[a..b].to_string()
    }

    fn replace_range(&mut self, text: &str, at: Position) {
        let at = self.offset_of(at);
        let cursor_offset = self.offset_of(self.cursor);
        self.text.insert_str(at, text);
        if cursor_offset >= at {
            self.cursor = self.pos_at(cursor_offset + text.len());
        }
    }

    fn append_at_cursor(&mut self, text: &str) {
        let at = self.offset_of(self.cursor);
        self.text.insert_str(at, text);
        self.cursor = self.pos_at(at + text.len());
    }
}
