//! Root view (spec.md §4.6): owns the single active child ("History",
//! itself composing RefView/CommitView/DiffView), the status bar, help
//! bar, and error overlay. Implements the `OnRefSelect` -> `OnCommitSelect`
//! serial listener chain (spec.md §5): a ref change cancels no in-flight
//! load for a *different* target (loads are additive and cached per-oid),
//! installs/finds the CommitSet for the new target, then notifies the
//! DiffView with the commit at the current row, with no interleaving.

use std::sync::Arc;

use grv_events::{Action, ErrorMessage};
use grv_git::{ObjectId, RepoBackend};
use grv_render::{Prompt, Theme, Window};
use grv_repo::RepositoryData;

use crate::commit_view::CommitView;
use crate::diff_view::{DiffHeader, DiffView};
use crate::ref_view::RefView;
use crate::status_bar::{ErrorOverlay, HelpBar, StatusBar};
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Ref column on the left, commit/diff stacked on the right.
    Default,
    /// Ref, commit, and diff side by side.
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Ref,
    Commit,
    Diff,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Ref => Focus::Commit,
            Focus::Commit => Focus::Diff,
            Focus::Diff => Focus::Ref,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Ref => Focus::Diff,
            Focus::Commit => Focus::Ref,
            Focus::Diff => Focus::Commit,
        }
    }
}

/// Redraw request sink handed to background loaders; the concrete
/// implementation (an `mpsc` send to `display_ch`) lives with the binary's
/// channel wiring.
pub type RedrawNotifier = Arc<dyn Fn() + Send + Sync>;

pub struct Root<B: RepoBackend + 'static> {
    repo: Arc<RepositoryData<B>>,
    redraw: RedrawNotifier,
    prompt: Arc<Prompt>,
    ref_view: RefView,
    commit_view: CommitView,
    diff_view: DiffView,
    status_bar: StatusBar,
    help_bar_visible: bool,
    error_overlay: ErrorOverlay,
    layout: LayoutMode,
    focus: Focus,
    active_ref: Option<ObjectId>,
}

impl<B: RepoBackend + 'static> Root<B> {
    pub fn new(repo: Arc<RepositoryData<B>>, repo_path: impl Into<String>, redraw: RedrawNotifier, prompt: Arc<Prompt>) -> Self {
        Self {
            repo,
            redraw,
            prompt,
            ref_view: RefView::new(),
            commit_view: CommitView::new(),
            diff_view: DiffView::new(),
            status_bar: StatusBar::new(repo_path),
            help_bar_visible: true,
            error_overlay: ErrorOverlay::new(),
            layout: LayoutMode::Default,
            focus: Focus::Ref,
            active_ref: None,
        }
    }

    /// The view a raw key-string should be resolved against first in the
    /// per-view keymap trie chain (spec.md §4.5).
    pub fn focused_view_id(&self) -> &'static str {
        match self.focus {
            Focus::Ref => self.ref_view.view_id(),
            Focus::Commit => self.commit_view.view_id(),
            Focus::Diff => self.diff_view.view_id(),
        }
    }

    pub fn report_error(&mut self, message: &ErrorMessage) {
        self.error_overlay.push_error(format!("{:?}: {}", message.source, message.message));
    }

    pub fn initialise(&mut self) {
        let repo = Arc::clone(&self.repo);
        let redraw = Arc::clone(&self.redraw);
        let r1 = Arc::clone(&redraw);
        repo.load_branches(move || r1());
        let r2 = Arc::clone(&redraw);
        self.repo.load_tags(move || r2());
    }

    /// Pull whatever branch/tag state has landed since the last call; cheap
    /// enough to call on every redraw tick.
    pub fn refresh_ref_data(&mut self) {
        if let Some(branches) = self.repo.branches() {
            self.ref_view.set_branches(branches);
        }
        if let Some(tags) = self.repo.tags() {
            self.ref_view.set_tags(tags);
        }
    }

    fn on_ref_select(&mut self, oid: ObjectId) {
        self.active_ref = Some(oid.clone());
        let repo = Arc::clone(&self.repo);
        let redraw = Arc::clone(&self.redraw);
        let on_ready = {
            let redraw = Arc::clone(&redraw);
            move || redraw()
        };
        let on_redraw = move || redraw();
        repo.load_commits(oid.clone(), on_ready, on_redraw);
        self.refresh_commit_view(&oid);
    }

    fn refresh_commit_view(&mut self, oid: &ObjectId) {
        let state = self.repo.commit_set_state(oid).unwrap_or(grv_repo::CommitSetState { loading: true, count: 0 });
        let commits = self.repo.commits(oid, 0, state.count).unwrap_or_default();
        let decorations = commits.iter().map(|c| self.repo.refs_for_commit(&c.id)).collect();
        self.commit_view.set_active_reference(oid.clone(), commits, decorations, state);
        for action in self.commit_view.take_pending_actions() {
            self.on_commit_select(&action);
        }
    }

    fn on_commit_select(&mut self, action: &Action) {
        let Action::OnCommitSelect { oid } = action else {
            return;
        };
        let target = ObjectId::from(oid.clone());
        // Look the commit up by scanning the loaded page; small pages make
        // this cheap and avoids a second index-lookup API on RepositoryData.
        let Some(active_ref) = self.active_ref.clone() else {
            return;
        };
        let state = self.repo.commit_set_state(&active_ref).unwrap_or(grv_repo::CommitSetState { loading: false, count: 0 });
        let commits = self.repo.commits(&active_ref, 0, state.count).unwrap_or_default();
        let Some(commit) = commits.iter().find(|c| c.id == target) else {
            return;
        };
        match self.repo.diff(commit) {
            Ok(diff) => {
                let header = DiffHeader {
                    author_name: commit.author.name.clone(),
                    author_email: commit.author.email.clone(),
                    author_date: commit.author.when.to_string(),
                    committer_name: commit.committer.name.clone(),
                    committer_email: commit.committer.email.clone(),
                    committer_date: commit.committer.when.to_string(),
                    summary: commit.summary.clone(),
                };
                self.diff_view.set_commit(header, &diff.stats, &diff.patch);
            }
            Err(e) => self.diff_view.set_error(&e),
        }
    }

}

impl<B: RepoBackend + 'static> View for Root<B> {
    fn view_id(&self) -> &'static str {
        "Root"
    }

    fn initialise(&mut self) {
        Root::initialise(self);
    }

    fn render(&mut self, window: &mut Window, theme: &Theme) {
        self.refresh_ref_data();
        if window.rows < 3 {
            return;
        }
        let help_row = window.rows - 1;
        let status_row = window.rows - 2;
        let body_rows = status_row;

        match self.layout {
            LayoutMode::Default => {
                let ref_cols = (window.cols / 3).max(10);
                let mut ref_window = Window::new(body_rows, ref_cols);
                self.ref_view.on_active_change(self.focus == Focus::Ref);
                self.ref_view.render(&mut ref_window, theme);
                window.blit(&ref_window, 0, 0);

                let right_cols = window.cols.saturating_sub(ref_cols);
                let commit_rows = body_rows / 2;
                let mut commit_window = Window::new(commit_rows, right_cols);
                self.commit_view.on_active_change(self.focus == Focus::Commit);
                self.commit_view.render(&mut commit_window, theme);
                window.blit(&commit_window, 0, ref_cols);

                let diff_rows = body_rows - commit_rows;
                let mut diff_window = Window::new(diff_rows, right_cols);
                self.diff_view.on_active_change(self.focus == Focus::Diff);
                self.diff_view.render(&mut diff_window, theme);
                window.blit(&diff_window, commit_rows, ref_cols);
            }
            LayoutMode::Column => {
                let col = window.cols / 3;
                let mut ref_window = Window::new(body_rows, col);
                self.ref_view.on_active_change(self.focus == Focus::Ref);
                self.ref_view.render(&mut ref_window, theme);
                window.blit(&ref_window, 0, 0);

                let mut commit_window = Window::new(body_rows, col);
                self.commit_view.on_active_change(self.focus == Focus::Commit);
                self.commit_view.render(&mut commit_window, theme);
                window.blit(&commit_window, 0, col);

                let diff_cols = window.cols - 2 * col;
                let mut diff_window = Window::new(body_rows, diff_cols);
                self.diff_view.on_active_change(self.focus == Focus::Diff);
                self.diff_view.render(&mut diff_window, theme);
                window.blit(&diff_window, 0, 2 * col);
            }
        }

        if !self.error_overlay.is_empty() {
            let min_active_rows = 3;
            let available = body_rows.saturating_sub(min_active_rows);
            let mut overlay_window = Window::new(available, window.cols);
            self.error_overlay.render(&mut overlay_window, available, theme);
            window.blit(&overlay_window, 0, 0);
        }

        let focused_id = match self.focus {
            Focus::Ref => self.ref_view.view_id(),
            Focus::Commit => self.commit_view.view_id(),
            Focus::Diff => self.diff_view.view_id(),
        };
        self.status_bar.render(window, status_row, theme, &self.prompt);
        if self.help_bar_visible {
            HelpBar::render(window, help_row, theme, focused_id);
        }
    }

    fn handle_key(&mut self, keystring: &str) -> bool {
        if keystring == "<Tab>" {
            self.focus = self.focus.next();
            return true;
        }
        let handled = match self.focus {
            Focus::Ref => self.ref_view.handle_key(keystring),
            Focus::Commit => self.commit_view.handle_key(keystring),
            Focus::Diff => self.diff_view.handle_key(keystring),
        };
        self.drain_child_actions();
        handled
    }

    fn handle_action(&mut self, action: &Action) -> bool {
        match action {
            Action::NextView => {
                self.focus = self.focus.next();
                true
            }
            Action::PrevView => {
                self.focus = self.focus.prev();
                true
            }
            Action::ToggleViewLayout => {
                self.layout = match self.layout {
                    LayoutMode::Default => LayoutMode::Column,
                    LayoutMode::Column => LayoutMode::Default,
                };
                true
            }
            Action::AddFilter { query } => {
                // ConfigError from the query parser surfaces via the status
                // bar and the filter is left uninstalled (spec.md §7).
                if let Err(errors) = self.commit_view.apply_filter(query) {
                    let message = errors.first().map(|e| e.message.clone()).unwrap_or_default();
                    self.status_bar.set_status(format!("filter error: {message}"));
                }
                true
            }
            Action::RemoveFilter => {
                self.commit_view.clear_filter();
                true
            }
            Action::ShowStatus { message } => {
                self.status_bar.set_status(message.clone());
                true
            }
            other => {
                let handled = match self.focus {
                    Focus::Ref => self.ref_view.handle_action(other),
                    Focus::Commit => self.commit_view.handle_action(other),
                    Focus::Diff => self.diff_view.handle_action(other),
                };
                self.drain_child_actions();
                handled
            }
        }
    }
}

impl<B: RepoBackend + 'static> Root<B> {
    fn drain_child_actions(&mut self) {
        for action in self.ref_view.take_pending_actions() {
            if let Action::OnRefSelect { oid, .. } = &action {
                self.on_ref_select(ObjectId::from(oid.clone()));
            }
        }
        for action in self.commit_view.take_pending_actions() {
            self.on_commit_select(&action);
        }
    }
}
