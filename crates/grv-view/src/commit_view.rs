//! CommitView (spec.md §4.6): a table of {date, author, decorations,
//! summary} per commit reachable from the active reference. Selecting a
//! row emits `OnCommitSelect`.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use grv_events::Action;
use grv_git::{Commit, ObjectId};
use grv_query::{build_filter, FieldType, FieldTypeDescriptor, FieldValue, FieldValueProvider, QueryError};
use grv_render::{Attrs, Theme, ThemeComponentId, Window};
use grv_repo::{CommitSetState, RefEntry};

use crate::pos::ViewPos;
use crate::view::View;

/// Maps the commit-row field names named in spec.md §4.3 ("AuthorDate",
/// "AuthorName", "ParentCount", ...) to their filter types.
struct CommitFieldDescriptor;

impl FieldTypeDescriptor for CommitFieldDescriptor {
    fn field_type(&self, name: &str) -> FieldType {
        match name {
            "AuthorName" | "AuthorEmail" | "CommitterName" | "CommitterEmail" | "Summary" | "Oid" => FieldType::String,
            "AuthorDate" | "CommitterDate" => FieldType::Date,
            "ParentCount" => FieldType::Number,
            _ => FieldType::Invalid,
        }
    }
}

struct CommitFieldProvider;

impl FieldValueProvider<Commit> for CommitFieldProvider {
    fn field_value(&self, record: &Commit, name: &str) -> FieldValue {
        match name {
            "AuthorName" => FieldValue::String(record.author.name.clone()),
            "AuthorEmail" => FieldValue::String(record.author.email.clone()),
            "CommitterName" => FieldValue::String(record.committer.name.clone()),
            "CommitterEmail" => FieldValue::String(record.committer.email.clone()),
            "Summary" => FieldValue::String(record.summary.clone()),
            "Oid" => FieldValue::String(record.id.to_string()),
            "AuthorDate" => FieldValue::Date(record.author.when),
            "CommitterDate" => FieldValue::Date(record.committer.when),
            "ParentCount" => FieldValue::Number(record.parent_count as f64),
            _ => FieldValue::Invalid,
        }
    }
}

pub struct CommitView {
    active_ref: Option<ObjectId>,
    commits: Vec<Commit>,
    decorations: Vec<Vec<RefEntry>>,
    state: CommitSetState,
    filter: Option<Box<dyn Fn(&Commit) -> bool + Send + Sync>>,
    pos: ViewPos,
    active: bool,
    pending: Vec<Action>,
}

impl CommitView {
    pub fn new() -> Self {
        Self {
            active_ref: None,
            commits: Vec::new(),
            decorations: Vec::new(),
            state: CommitSetState { loading: false, count: 0 },
            filter: None,
            pos: ViewPos::new(),
            active: false,
            pending: Vec::new(),
        }
    }

    /// Install a freshly loaded (or cached) commit page for `oid`, resetting
    /// the selection to the top row (spec.md §5: ref-select serialisation).
    pub fn set_active_reference(&mut self, oid: ObjectId, commits: Vec<Commit>, decorations: Vec<Vec<RefEntry>>, state: CommitSetState) {
        self.active_ref = Some(oid);
        self.commits = commits;
        self.decorations = decorations;
        self.state = state;
        self.pos = ViewPos::new();
        self.emit_select();
    }

    pub fn update_loaded(&mut self, commits: Vec<Commit>, decorations: Vec<Vec<RefEntry>>, state: CommitSetState) {
        self.commits = commits;
        self.decorations = decorations;
        self.state = state;
    }

    /// Compile `query` with the commit field descriptor (spec.md §4.3) and
    /// keep only commits it admits; the ref-row pipeline is identical but
    /// lives in `RefView` since its descriptor/provider differ.
    pub fn apply_filter(&mut self, query: &str) -> Result<(), Vec<QueryError>> {
        let predicate = build_filter::<Commit>(query, &CommitFieldDescriptor, Arc::new(CommitFieldProvider))?;
        self.filter = Some(predicate);
        self.pos.active_row = 0;
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    fn visible_indices(&self) -> Vec<usize> {
        match &self.filter {
            Some(pred) => (0..self.commits.len()).filter(|&i| pred(&self.commits[i])).collect(),
            None => (0..self.commits.len()).collect(),
        }
    }

    fn emit_select(&mut self) {
        let visible = self.visible_indices();
        if let Some(&idx) = visible.get(self.pos.active_row) {
            if let Some(commit) = self.commits.get(idx) {
                self.pending.push(Action::OnCommitSelect { oid: commit.id.to_string() });
            }
        }
    }

    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending)
    }

    fn decorations_text(&self, index: usize) -> String {
        let Some(entries) = self.decorations.get(index) else {
            return String::new();
        };
        if entries.is_empty() {
            return String::new();
        }
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        format!("({})", names.join(", "))
    }

    /// Footer text: progress while loading, "Commit N of M" once complete
    /// (spec.md §4.6); "of M" counts only the rows the active filter admits.
    pub fn footer_text(&self) -> String {
        if self.state.loading {
            format!("Loading... ({} so far)", self.state.count)
        } else {
            format!("Commit {} of {}", self.pos.active_row + 1, self.visible_indices().len())
        }
    }
}

impl Default for CommitView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for CommitView {
    fn view_id(&self) -> &'static str {
        "CommitView"
    }

    fn render(&mut self, window: &mut Window, theme: &Theme) {
        let _ = theme;
        let visible = self.visible_indices();
        self.pos.determine_view_start_row(window.rows as usize, visible.len());
        for screen_row in 0..window.rows {
            window.clear_row(screen_row);
            let doc_row = self.pos.view_start_row + screen_row as usize;
            let Some(&commit_idx) = visible.get(doc_row) else {
                continue;
            };
            let Some(commit) = self.commits.get(commit_idx) else {
                continue;
            };
            let attrs = if doc_row == self.pos.active_row && self.active {
                Attrs::REVERSE
            } else {
                Attrs::empty()
            };
            let date = local_date(commit.author.when);
            let mut line = window.line(screen_row);
            line = line.write(&date, ThemeComponentId::CommitViewDate, attrs, 4);
            line = line.at(line.col() + 1).write(&commit.author.name, ThemeComponentId::CommitViewAuthor, attrs, 4);
            let decorations = self.decorations_text(commit_idx);
            line = if decorations.is_empty() {
                line
            } else {
                let col = line.col() + 1;
                line.at(col).write(&decorations, ThemeComponentId::CommitViewRef, attrs, 4)
            };
            let col = line.col() + 1;
            line.at(col).write(&commit.summary, ThemeComponentId::CommitViewSummary, attrs, 4);
        }
    }

    fn handle_key(&mut self, keystring: &str) -> bool {
        let total = self.visible_indices().len();
        match keystring {
            "j" | "<Down>" => {
                self.pos.move_active(1, total);
                self.emit_select();
                true
            }
            "k" | "<Up>" => {
                self.pos.move_active(-1, total);
                self.emit_select();
                true
            }
            "g" => {
                self.pos.active_row = 0;
                self.emit_select();
                true
            }
            "G" => {
                self.pos.active_row = total.saturating_sub(1);
                self.emit_select();
                true
            }
            _ => false,
        }
    }

    fn handle_action(&mut self, action: &Action) -> bool {
        let total = self.visible_indices().len();
        match action {
            Action::NextLine => {
                self.pos.move_active(1, total);
                self.emit_select();
                true
            }
            Action::PrevLine => {
                self.pos.move_active(-1, total);
                self.emit_select();
                true
            }
            Action::FirstLine => {
                self.pos.active_row = 0;
                self.emit_select();
                true
            }
            Action::LastLine => {
                self.pos.active_row = total.saturating_sub(1);
                self.emit_select();
                true
            }
            _ => false,
        }
    }

    fn on_active_change(&mut self, active: bool) {
        self.active = active;
    }
}

/// `YYYY-MM-DD` rendering of a Unix timestamp in the local timezone,
/// matching `grv_query::typer::parse_date`'s local interpretation of date
/// literals so a filter like `AuthorDate = "2017-07-16"` lines up with what
/// the column actually shows (spec.md §4.3).
fn local_date(seconds: i64) -> String {
    let utc = DateTime::<Utc>::from_timestamp(seconds, 0).unwrap_or_default();
    utc.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grv_git::Signature;

    fn commit(id: &str, when: i64, summary: &str) -> Commit {
        Commit {
            id: ObjectId::from(id),
            author: Signature { name: "A".into(), email: "a@example.com".into(), when },
            committer: Signature { name: "A".into(), email: "a@example.com".into(), when },
            summary: summary.to_string(),
            parent_count: 0,
            parents: Vec::new(),
        }
    }

    #[test]
    fn footer_reports_progress_while_loading_and_position_once_loaded() {
        let mut view = CommitView::new();
        view.set_active_reference(
            ObjectId::from("head"),
            vec![commit("a", 0, "first")],
            vec![Vec::new()],
            CommitSetState { loading: true, count: 1 },
        );
        assert_eq!(view.footer_text(), "Loading... (1 so far)");
        view.update_loaded(
            vec![commit("a", 0, "first"), commit("b", 1, "second")],
            vec![Vec::new(), Vec::new()],
            CommitSetState { loading: false, count: 2 },
        );
        assert_eq!(view.footer_text(), "Commit 1 of 2");
    }

    #[test]
    fn selecting_a_reference_emits_on_commit_select_for_the_top_row() {
        let mut view = CommitView::new();
        view.set_active_reference(
            ObjectId::from("head"),
            vec![commit("a", 0, "first"), commit("b", 1, "second")],
            vec![Vec::new(), Vec::new()],
            CommitSetState { loading: false, count: 2 },
        );
        let actions = view.take_pending_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0], Action::OnCommitSelect { oid: "a".to_string() });
    }

    #[test]
    fn moving_down_emits_on_commit_select_for_the_new_row() {
        let mut view = CommitView::new();
        view.set_active_reference(
            ObjectId::from("head"),
            vec![commit("a", 0, "first"), commit("b", 1, "second")],
            vec![Vec::new(), Vec::new()],
            CommitSetState { loading: false, count: 2 },
        );
        view.take_pending_actions();
        view.handle_key("j");
        let actions = view.take_pending_actions();
        assert_eq!(actions[0], Action::OnCommitSelect { oid: "b".to_string() });
    }

    #[test]
    fn date_formatting_matches_iso_calendar_date_in_the_local_zone() {
        // 2017-07-16 00:00:00 UTC; compare against an independently
        // computed local rendering so this test holds in any timezone.
        let instant = 1_500_163_200;
        let expected = DateTime::<Utc>::from_timestamp(instant, 0)
            .unwrap()
            .with_timezone(&Local)
            .format("%Y-%m-%d")
            .to_string();
        assert_eq!(local_date(instant), expected);
    }

    #[test]
    fn applying_a_filter_skips_non_matching_commits_during_motion() {
        let mut view = CommitView::new();
        view.set_active_reference(
            ObjectId::from("head"),
            vec![commit("a", 0, "Fix bug"), commit("b", 1, "Added feature"), commit("c", 2, "Added docs")],
            vec![Vec::new(), Vec::new(), Vec::new()],
            CommitSetState { loading: false, count: 3 },
        );
        view.take_pending_actions();
        view.apply_filter("Summary GLOB \"Added*\"").unwrap();
        assert_eq!(view.footer_text(), "Commit 1 of 2");
        view.take_pending_actions();
        view.handle_key("j");
        let actions = view.take_pending_actions();
        assert_eq!(actions[0], Action::OnCommitSelect { oid: "c".to_string() });
    }

    #[test]
    fn invalid_filter_query_reports_errors_and_leaves_the_view_unfiltered() {
        let mut view = CommitView::new();
        view.set_active_reference(
            ObjectId::from("head"),
            vec![commit("a", 0, "Fix bug")],
            vec![Vec::new()],
            CommitSetState { loading: false, count: 1 },
        );
        let result = view.apply_filter("ParentCount REGEXP \"^[0-9]+$\"");
        assert!(result.is_err());
        assert_eq!(view.footer_text(), "Commit 1 of 1");
    }
}
