//! Status bar, help bar, and error overlay (spec.md §4.6, §4.8, §7). None
//! of these are navigable views in the key-dispatch sense; the root
//! composes them around the active view's window.

use grv_render::{Attrs, Prompt, PromptKind, Theme, ThemeComponentId, Window};

pub struct StatusBar {
    repo_path: String,
    message: String,
}

impl StatusBar {
    pub fn new(repo_path: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            message: String::new(),
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Render the repo path and contextual status, or (while a prompt is
    /// active) the prompt's live `(text, point)` state (spec.md §4.8).
    pub fn render(&self, window: &mut Window, row: u16, theme: &Theme, prompt: &Prompt) {
        let _ = theme;
        window.clear_row(row);
        if let Some(kind) = prompt.active_kind() {
            let (text, _point) = prompt.render_state();
            let prefix = prompt_prefix(kind);
            window
                .line(row)
                .write(&format!("{prefix}{text}"), ThemeComponentId::StatusBarNormal, Attrs::empty(), 4);
            return;
        }
        let status = format!("{}  {}", self.repo_path, self.message);
        window.line(row).write(&status, ThemeComponentId::StatusBarNormal, Attrs::empty(), 4);
    }
}

fn prompt_prefix(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::Command => ":",
        PromptKind::Search => "/",
        PromptKind::ReverseSearch => "?",
        PromptKind::Filter => "filter: ",
    }
}

/// Per-view key-binding hints, plus the hints common to every view
/// (spec.md §6).
pub struct HelpBar;

impl HelpBar {
    const COMMON: &'static [(&'static str, &'static str)] = &[
        ("Up/Down, k/j", "move"),
        ("gg/G", "first/last"),
        ("<Tab>", "next view"),
        ("f", "full-screen"),
        ("<Return>", "select"),
        (":", "command"),
        ("/", "search"),
        ("?", "reverse search"),
    ];

    pub fn hints_for(view_id: &str) -> Vec<(&'static str, &'static str)> {
        let mut hints = Self::COMMON.to_vec();
        if view_id == "RefView" {
            hints.push(("<Space>", "expand/collapse"));
        }
        hints
    }

    pub fn render(window: &mut Window, row: u16, theme: &Theme, view_id: &str) {
        let _ = theme;
        window.clear_row(row);
        let text = Self::hints_for(view_id)
            .iter()
            .map(|(key, desc)| format!("{key}:{desc}"))
            .collect::<Vec<_>>()
            .join("  ");
        window.line(row).write(&text, ThemeComponentId::HelpBarNormal, Attrs::empty(), 4);
    }
}

/// Collected pending errors (spec.md §7); shown only while non-empty, sized
/// to at most `rows - min_active_rows` with a truncated-count fallback.
pub struct ErrorOverlay {
    errors: Vec<String>,
}

impl ErrorOverlay {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn set_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fit as many error lines as `available_rows` allows; if that's not
    /// enough to show them all, the last visible row reports the count of
    /// lines left out.
    pub fn render(&self, window: &mut Window, available_rows: u16, theme: &Theme) {
        let _ = theme;
        if self.errors.is_empty() || available_rows == 0 {
            return;
        }
        let rows = available_rows.min(window.rows) as usize;
        if self.errors.len() <= rows {
            for (i, err) in self.errors.iter().enumerate() {
                window.clear_row(i as u16);
                window.line(i as u16).write(err, ThemeComponentId::ErrorViewErrors, Attrs::empty(), 4);
            }
        } else {
            let shown = rows.saturating_sub(1);
            for (i, err) in self.errors.iter().take(shown).enumerate() {
                window.clear_row(i as u16);
                window.line(i as u16).write(err, ThemeComponentId::ErrorViewErrors, Attrs::empty(), 4);
            }
            let omitted = self.errors.len() - shown;
            window.clear_row(shown as u16);
            window.line(shown as u16).write(
                &format!("... and {omitted} more"),
                ThemeComponentId::ErrorViewErrors,
                Attrs::empty(),
                4,
            );
        }
    }
}

impl Default for ErrorOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_bar_advertises_common_hints_plus_ref_view_extras() {
        let hints = HelpBar::hints_for("RefView");
        assert!(hints.iter().any(|(k, _)| *k == "<Space>"));
        let base = HelpBar::hints_for("CommitView");
        assert!(!base.iter().any(|(k, _)| *k == "<Space>"));
    }

    #[test]
    fn overlay_reports_truncated_count_when_it_does_not_fit() {
        let mut overlay = ErrorOverlay::new();
        overlay.set_errors(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let mut window = Window::new(2, 40);
        let theme = Theme::default_theme();
        overlay.render(&mut window, 2, &theme);
        assert_eq!(window.row_text(0).trim_end(), "a");
        assert!(window.row_text(1).trim_end().starts_with("... and 3 more"));
    }

    #[test]
    fn overlay_shows_every_line_when_it_fits() {
        let mut overlay = ErrorOverlay::new();
        overlay.set_errors(vec!["only one".into()]);
        let mut window = Window::new(3, 40);
        let theme = Theme::default_theme();
        overlay.render(&mut window, 3, &theme);
        assert_eq!(window.row_text(0).trim_end(), "only one");
    }
}
