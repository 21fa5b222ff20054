//! DiffView (spec.md §4.6): a synthetic metadata header followed by the
//! stats block and the unified patch body, each line classified into a
//! `DiffLineType` for theming.

use grv_render::{Attrs, Theme, ThemeComponentId, Window};
use grv_repo::DataError;

use crate::pos::ViewPos;
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineType {
    Normal,
    GitDiffHeader,
    ExtendedHeader,
    UnifiedDiffHeader,
    HunkStart,
    Added,
    Removed,
    StatsFile,
    Summary,
    CommitterAuthorMetadata,
}

impl DiffLineType {
    fn component(self) -> ThemeComponentId {
        match self {
            DiffLineType::Normal => ThemeComponentId::Default,
            DiffLineType::GitDiffHeader => ThemeComponentId::DiffViewHeader,
            DiffLineType::ExtendedHeader => ThemeComponentId::DiffViewHeader,
            DiffLineType::UnifiedDiffHeader => ThemeComponentId::DiffViewHeader,
            DiffLineType::HunkStart => ThemeComponentId::DiffViewHunkHeader,
            DiffLineType::Added => ThemeComponentId::DiffViewAddedLine,
            DiffLineType::Removed => ThemeComponentId::DiffViewRemovedLine,
            DiffLineType::StatsFile => ThemeComponentId::DiffViewStatsFile,
            DiffLineType::Summary => ThemeComponentId::DiffViewHeader,
            DiffLineType::CommitterAuthorMetadata => ThemeComponentId::DiffViewHeader,
        }
    }
}

/// One rendered line: text plus, for a hunk-start line, the column at
/// which the post-`@@` portion begins (that tail themes as hunk-header
/// even though the leading `@@ ... @@` markers classify the whole line).
#[derive(Debug, Clone)]
struct DiffLine {
    text: String,
    kind: DiffLineType,
    hunk_split: Option<usize>,
}

pub struct DiffView {
    lines: Vec<DiffLine>,
    error: Option<String>,
    pos: ViewPos,
    active: bool,
}

impl DiffView {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            error: None,
            pos: ViewPos::new(),
            active: false,
        }
    }

    /// Build the synthetic header, stats block, and classified patch body
    /// for a newly selected commit (spec.md §4.6).
    pub fn set_commit(&mut self, header: DiffHeader, stats: &[u8], patch: &[u8]) {
        self.error = None;
        self.pos = ViewPos::new();
        let mut lines = Vec::new();
        lines.push(text_line(format!("Author:          {} <{}>", header.author_name, header.author_email), DiffLineType::CommitterAuthorMetadata));
        lines.push(text_line(format!("AuthorDate:      {}", header.author_date), DiffLineType::CommitterAuthorMetadata));
        lines.push(text_line(format!("Committer:       {} <{}>", header.committer_name, header.committer_email), DiffLineType::CommitterAuthorMetadata));
        lines.push(text_line(format!("CommitterDate:   {}", header.committer_date), DiffLineType::CommitterAuthorMetadata));
        lines.push(text_line(String::new(), DiffLineType::Normal));
        lines.push(text_line(header.summary, DiffLineType::Summary));
        lines.push(text_line(String::new(), DiffLineType::Normal));
        for raw in String::from_utf8_lossy(stats).lines() {
            lines.push(text_line(raw.to_string(), DiffLineType::StatsFile));
        }
        for raw in String::from_utf8_lossy(patch).lines() {
            lines.push(classify_patch_line(raw));
        }
        self.lines = lines;
    }

    pub fn set_error(&mut self, err: &DataError) {
        self.lines.clear();
        self.error = Some(err.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.error.is_none()
    }
}

pub struct DiffHeader {
    pub author_name: String,
    pub author_email: String,
    pub author_date: String,
    pub committer_name: String,
    pub committer_email: String,
    pub committer_date: String,
    pub summary: String,
}

fn text_line(text: String, kind: DiffLineType) -> DiffLine {
    DiffLine { text, kind, hunk_split: None }
}

/// Classify one line of a unified patch (spec.md §4.6).
fn classify_patch_line(raw: &str) -> DiffLine {
    if let Some(rest) = raw.strip_prefix("diff --git") {
        let _ = rest;
        return text_line(raw.to_string(), DiffLineType::GitDiffHeader);
    }
    if raw.starts_with("index ") {
        return text_line(raw.to_string(), DiffLineType::ExtendedHeader);
    }
    if raw.starts_with("--- ") || raw.starts_with("+++ ") {
        return text_line(raw.to_string(), DiffLineType::UnifiedDiffHeader);
    }
    if let Some(rest) = raw.strip_prefix("@@") {
        if let Some(second) = rest.find("@@") {
            let split = 2 + second + 2;
            return DiffLine {
                text: raw.to_string(),
                kind: DiffLineType::HunkStart,
                hunk_split: Some(split.min(raw.len())),
            };
        }
        return text_line(raw.to_string(), DiffLineType::HunkStart);
    }
    if raw.starts_with('+') {
        return text_line(raw.to_string(), DiffLineType::Added);
    }
    if raw.starts_with('-') {
        return text_line(raw.to_string(), DiffLineType::Removed);
    }
    text_line(raw.to_string(), DiffLineType::Normal)
}

impl Default for DiffView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for DiffView {
    fn view_id(&self) -> &'static str {
        "DiffView"
    }

    fn render(&mut self, window: &mut Window, theme: &Theme) {
        let _ = theme;
        if let Some(err) = &self.error {
            window.clear_row(0);
            window.line(0).write(err, ThemeComponentId::ErrorViewErrors, Attrs::empty(), 4);
            for row in 1..window.rows {
                window.clear_row(row);
            }
            return;
        }
        self.pos.determine_view_start_row(window.rows as usize, self.lines.len());
        for screen_row in 0..window.rows {
            window.clear_row(screen_row);
            let doc_row = self.pos.view_start_row + screen_row as usize;
            let Some(line) = self.lines.get(doc_row) else {
                continue;
            };
            let attrs = if doc_row == self.pos.active_row && self.active {
                Attrs::REVERSE
            } else {
                Attrs::empty()
            };
            match (line.kind, line.hunk_split) {
                (DiffLineType::HunkStart, Some(split)) if split <= line.text.len() => {
                    let (head, tail) = line.text.split_at(split);
                    let mut builder = window.line(screen_row).write(head, ThemeComponentId::Default, attrs, 4);
                    let col = builder.col();
                    builder = builder.at(col).write(tail, ThemeComponentId::DiffViewHunkHeader, attrs, 4);
                    let _ = builder;
                }
                _ => {
                    window.line(screen_row).write(&line.text, line.kind.component(), attrs, 4);
                }
            }
        }
    }

    fn handle_key(&mut self, keystring: &str) -> bool {
        match keystring {
            "j" | "<Down>" => {
                self.pos.move_active(1, self.lines.len());
                true
            }
            "k" | "<Up>" => {
                self.pos.move_active(-1, self.lines.len());
                true
            }
            _ => false,
        }
    }

    fn handle_action(&mut self, action: &grv_events::Action) -> bool {
        use grv_events::Action;
        match action {
            Action::NextLine => {
                self.pos.move_active(1, self.lines.len());
                true
            }
            Action::PrevLine => {
                self.pos.move_active(-1, self.lines.len());
                true
            }
            _ => false,
        }
    }

    fn on_active_change(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> DiffHeader {
        DiffHeader {
            author_name: "A".into(),
            author_email: "a@example.com".into(),
            author_date: "2020-01-01".into(),
            committer_name: "A".into(),
            committer_email: "a@example.com".into(),
            committer_date: "2020-01-01".into(),
            summary: "a summary".into(),
        }
    }

    #[test]
    fn header_lines_precede_stats_and_patch_body() {
        let mut view = DiffView::new();
        view.set_commit(header(), b" 1 file changed\n", b"diff --git a b\n");
        assert!(view.lines[0].text.starts_with("Author:"));
        assert_eq!(view.lines[5].text, "a summary");
        assert_eq!(view.lines[7].kind, DiffLineType::StatsFile);
        assert_eq!(view.lines[8].kind, DiffLineType::GitDiffHeader);
    }

    #[test]
    fn hunk_start_is_split_after_the_closing_markers() {
        let line = classify_patch_line("@@ -1,3 +1,4 @@ fn main() {");
        assert_eq!(line.kind, DiffLineType::HunkStart);
        let split = line.hunk_split.unwrap();
        assert_eq!(&line.text[split..], " fn main() {");
    }

    #[test]
    fn added_and_removed_lines_classify_by_leading_sigil() {
        assert_eq!(classify_patch_line("+new line").kind, DiffLineType::Added);
        assert_eq!(classify_patch_line("-old line").kind, DiffLineType::Removed);
        assert_eq!(classify_patch_line(" context").kind, DiffLineType::Normal);
    }

    #[test]
    fn index_and_unified_headers_classify_distinctly() {
        assert_eq!(classify_patch_line("index abc123..def456 100644").kind, DiffLineType::ExtendedHeader);
        assert_eq!(classify_patch_line("--- a/file.rs").kind, DiffLineType::UnifiedDiffHeader);
        assert_eq!(classify_patch_line("+++ b/file.rs").kind, DiffLineType::UnifiedDiffHeader);
    }
}
