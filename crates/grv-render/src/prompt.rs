//! Process-wide prompt state (spec.md §4.8). The line editor itself is a
//! collaborator out of this component's scope (spec.md's line-editor
//! boundary); `LineEditor` here is the minimal buffer/cursor model GRV
//! needs to drive it, plus the `History` file this crate does own (a
//! thinly-documented ambient-stack addition: reading/appending a
//! readline-style history file is data plumbing, not editing logic).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Command,
    Search,
    ReverseSearch,
    Filter,
}

/// Minimal single-line buffer with a byte-offset insertion point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEditor {
    text: String,
    point: usize,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn point(&self) -> usize {
        self.point
    }

    pub fn insert(&mut self, c: char) {
        self.text.insert(self.point, c);
        self.point += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if self.point == 0 {
            return;
        }
        let mut prev = self.point - 1;
        while !self.text.is_char_boundary(prev) {
            prev -= 1;
        }
        self.text.drain(prev..self.point);
        self.point = prev;
    }

    pub fn move_left(&mut self) {
        if self.point == 0 {
            return;
        }
        let mut prev = self.point - 1;
        while !self.text.is_char_boundary(prev) {
            prev -= 1;
        }
        self.point = prev;
    }

    pub fn move_right(&mut self) {
        if self.point >= self.text.len() {
            return;
        }
        let mut next = self.point + 1;
        while next < self.text.len() && !self.text.is_char_boundary(next) {
            next += 1;
        }
        self.point = next;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.point = self.text.len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.point = 0;
    }
}

struct PromptInner {
    active: Option<PromptKind>,
    editor: LineEditor,
}

/// Global prompt state guarded by a mutex (spec.md §4.8: "process-wide
/// because the line editor is a singleton collaborator").
pub struct Prompt {
    inner: Mutex<PromptInner>,
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PromptInner {
                active: None,
                editor: LineEditor::new(),
            }),
        }
    }

    pub fn activate(&self, kind: PromptKind) {
        let mut inner = self.inner.lock().unwrap();
        inner.active = Some(kind);
        inner.editor.clear();
    }

    pub fn active_kind(&self) -> Option<PromptKind> {
        self.inner.lock().unwrap().active
    }

    pub fn feed_char(&self, c: char) {
        self.inner.lock().unwrap().editor.insert(c);
    }

    pub fn backspace(&self) {
        self.inner.lock().unwrap().editor.backspace();
    }

    /// `(text, point)` read during render (spec.md §4.8).
    pub fn render_state(&self) -> (String, usize) {
        let inner = self.inner.lock().unwrap();
        (inner.editor.text().to_string(), inner.editor.point())
    }

    /// Confirm the current buffer, clearing the prompt and returning the
    /// text for the caller to dispatch as a new action.
    pub fn confirm(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let kind = inner.active.take()?;
        let _ = kind;
        let text = inner.editor.text().to_string();
        inner.editor.clear();
        Some(text)
    }

    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.active = None;
        inner.editor.clear();
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new()
    }
}

/// Newline-separated, readline-compatible command history file (spec.md
/// §6). Entries are appended as they are confirmed and loaded once at
/// startup.
pub struct History {
    path: Option<PathBuf>,
    entries: Vec<String>,
}

impl History {
    pub fn load(path: Option<PathBuf>) -> Self {
        let entries = match &path {
            Some(p) => read_history_file(p),
            None => Vec::new(),
        };
        Self { path, entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// `recall(n)`: the nth-from-most-recent entry, `0` being the last one
    /// appended.
    pub fn recall(&self, n: usize) -> Option<&str> {
        self.entries.iter().rev().nth(n).map(String::as_str)
    }

    pub fn append(&mut self, line: &str) -> std::io::Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        self.entries.push(line.to_string());
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

fn read_history_file(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!(target: "render", error = %e, path = %path.display(), "failed to read history file");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_editor_insert_and_backspace_track_the_point() {
        let mut editor = LineEditor::new();
        editor.insert('a');
        editor.insert('b');
        assert_eq!(editor.text(), "ab");
        assert_eq!(editor.point(), 2);
        editor.backspace();
        assert_eq!(editor.text(), "a");
        assert_eq!(editor.point(), 1);
    }

    #[test]
    fn prompt_confirm_returns_text_and_clears_state() {
        let prompt = Prompt::new();
        prompt.activate(PromptKind::Command);
        prompt.feed_char(':');
        prompt.feed_char('q');
        let confirmed = prompt.confirm().unwrap();
        assert_eq!(confirmed, ":q");
        assert!(prompt.active_kind().is_none());
        assert_eq!(prompt.render_state().0, "");
    }

    #[test]
    fn history_append_persists_and_recalls_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let mut history = History::load(Some(path.clone()));
        history.append("first").unwrap();
        history.append("second").unwrap();
        assert_eq!(history.recall(0), Some("second"));
        assert_eq!(history.recall(1), Some("first"));

        let reloaded = History::load(Some(path));
        assert_eq!(reloaded.entries(), &["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn history_load_of_missing_file_is_empty_not_an_error() {
        let history = History::load(Some(PathBuf::from("/nonexistent/path/history")));
        assert!(history.entries().is_empty());
    }
}
