//! RefView (spec.md §4.6): a list of {LocalBranches, RemoteBranches, Tags}
//! groups, each expandable, with `[+]`/`[-]` markers and selectable
//! reference rows. Selecting a reference emits `OnRefSelect`.

use grv_events::Action;
use grv_git::ObjectId;
use grv_render::{Attrs, Theme, ThemeComponentId, Window};
use grv_repo::BranchSet;

use crate::pos::ViewPos;
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    LocalBranches,
    RemoteBranches,
    Tags,
}

impl GroupKind {
    fn label(self) -> &'static str {
        match self {
            GroupKind::LocalBranches => "Local Branches",
            GroupKind::RemoteBranches => "Remote Branches",
            GroupKind::Tags => "Tags",
        }
    }
}

#[derive(Debug, Clone)]
struct RefRow {
    name: String,
    oid: ObjectId,
}

#[derive(Debug, Clone)]
struct Group {
    kind: GroupKind,
    expanded: bool,
    rows: Vec<RefRow>,
    loading: bool,
}

/// A row as presented in the flattened list; group headers and padding
/// are not selectable (spec.md §4.6: "skipped by up/down motions").
#[derive(Debug, Clone, PartialEq, Eq)]
enum Row {
    Header(GroupKind),
    Loading,
    Ref { index_in_group: usize },
}

pub struct RefView {
    groups: Vec<Group>,
    pos: ViewPos,
    active: bool,
    pending: Vec<Action>,
}

impl RefView {
    pub fn new() -> Self {
        Self {
            groups: vec![
                Group {
                    kind: GroupKind::LocalBranches,
                    expanded: true,
                    rows: Vec::new(),
                    loading: true,
                },
                Group {
                    kind: GroupKind::RemoteBranches,
                    expanded: true,
                    rows: Vec::new(),
                    loading: true,
                },
                Group {
                    kind: GroupKind::Tags,
                    expanded: true,
                    rows: Vec::new(),
                    loading: true,
                },
            ],
            pos: ViewPos::new(),
            active: false,
            pending: Vec::new(),
        }
    }

    pub fn set_branches(&mut self, branches: BranchSet) {
        self.groups[0].rows = branches
            .local
            .into_iter()
            .map(|r| RefRow { name: r.name, oid: r.target })
            .collect();
        self.groups[0].loading = false;
        self.groups[1].rows = branches
            .remote
            .into_iter()
            .map(|r| RefRow { name: r.name, oid: r.target })
            .collect();
        self.groups[1].loading = false;
    }

    pub fn set_tags(&mut self, tags: Vec<grv_git::Reference>) {
        self.groups[2].rows = tags
            .into_iter()
            .map(|r| RefRow { name: r.name, oid: r.target })
            .collect();
        self.groups[2].loading = false;
    }

    fn flatten(&self) -> Vec<Row> {
        let mut out = Vec::new();
        for group in &self.groups {
            out.push(Row::Header(group.kind));
            if !group.expanded {
                continue;
            }
            if group.loading {
                out.push(Row::Loading);
                continue;
            }
            for i in 0..group.rows.len() {
                out.push(Row::Ref { index_in_group: i });
            }
        }
        out
    }

    fn group_index_for_row(&self, rows: &[Row], row: usize) -> usize {
        let mut group_idx = 0;
        for (i, r) in rows.iter().enumerate() {
            if let Row::Header(_) = r {
                if i <= row {
                    group_idx = group_idx_of(self, r);
                }
            }
            if i == row {
                break;
            }
        }
        group_idx
    }

    fn move_selection(&mut self, delta: isize) {
        let rows = self.flatten();
        if rows.is_empty() {
            return;
        }
        let mut row = self.pos.active_row as isize;
        let len = rows.len() as isize;
        let step = delta.signum();
        if step == 0 {
            return;
        }
        loop {
            row += step;
            if row < 0 || row >= len {
                break;
            }
            if matches!(rows[row as usize], Row::Ref { .. }) {
                self.pos.active_row = row as usize;
                return;
            }
        }
    }

    fn toggle_current_group(&mut self) {
        let rows = self.flatten();
        if let Some(Row::Header(kind)) = rows.get(self.pos.active_row) {
            let kind = *kind;
            if let Some(group) = self.groups.iter_mut().find(|g| g.kind == kind) {
                group.expanded = !group.expanded;
            }
        }
    }

    fn select_current(&mut self) {
        let rows = self.flatten();
        let Some(Row::Ref { index_in_group }) = rows.get(self.pos.active_row).cloned() else {
            return;
        };
        let group_idx = self.group_index_for_row(&rows, self.pos.active_row);
        if let Some(group) = self.groups.get(group_idx) {
            if let Some(r) = group.rows.get(index_in_group) {
                self.pending.push(Action::OnRefSelect {
                    name: r.name.clone(),
                    oid: r.oid.to_string(),
                });
            }
        }
    }

    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending)
    }
}

fn group_idx_of(view: &RefView, row: &Row) -> usize {
    if let Row::Header(kind) = row {
        view.groups.iter().position(|g| g.kind == *kind).unwrap_or(0)
    } else {
        0
    }
}

impl Default for RefView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for RefView {
    fn view_id(&self) -> &'static str {
        "RefView"
    }

    fn render(&mut self, window: &mut Window, theme: &Theme) {
        let rows = self.flatten();
        self.pos.determine_view_start_row(window.rows as usize, rows.len());
        for screen_row in 0..window.rows {
            let doc_row = self.pos.view_start_row + screen_row as usize;
            window.clear_row(screen_row);
            let Some(row) = rows.get(doc_row) else {
                continue;
            };
            match row {
                Row::Header(kind) => {
                    let group = self.groups.iter().find(|g| g.kind == *kind).unwrap();
                    let marker = if group.expanded { "[-]" } else { "[+]" };
                    window
                        .line(screen_row)
                        .write(
                            &format!("{marker} {}", kind.label()),
                            ThemeComponentId::Default,
                            Attrs::BOLD,
                            4,
                        );
                }
                Row::Loading => {
                    window
                        .line(screen_row)
                        .at(2)
                        .write("Loading...", ThemeComponentId::Default, Attrs::DIM, 4);
                }
                Row::Ref { .. } => {
                    let group_idx = self.group_index_for_row(&rows, doc_row);
                    if let (Some(group), Row::Ref { index_in_group }) = (self.groups.get(group_idx), row) {
                        if let Some(r) = group.rows.get(*index_in_group) {
                            let component = match group.kind {
                                GroupKind::LocalBranches => ThemeComponentId::RefViewLocalBranch,
                                GroupKind::RemoteBranches => ThemeComponentId::RefViewRemoteBranch,
                                GroupKind::Tags => ThemeComponentId::RefViewTag,
                            };
                            let attrs = if doc_row == self.pos.active_row && self.active {
                                Attrs::REVERSE
                            } else {
                                Attrs::empty()
                            };
                            window
                                .line(screen_row)
                                .at(2)
                                .write(&r.name, component, attrs, 4);
                        }
                    }
                }
            }
        }
    }

    fn handle_key(&mut self, keystring: &str) -> bool {
        match keystring {
            "j" | "<Down>" => {
                self.move_selection(1);
                true
            }
            "k" | "<Up>" => {
                self.move_selection(-1);
                true
            }
            "<Return>" => {
                self.select_current();
                true
            }
            "<Space>" => {
                self.toggle_current_group();
                true
            }
            _ => false,
        }
    }

    fn handle_action(&mut self, action: &Action) -> bool {
        match action {
            Action::NextLine => {
                self.move_selection(1);
                true
            }
            Action::PrevLine => {
                self.move_selection(-1);
                true
            }
            Action::Select => {
                self.select_current();
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
    use grv_git::{Reference, ReferenceKind};

    fn sample() -> RefView {
        let mut view = RefView::new();
        view.set_branches(BranchSet {
            local: vec![
                Reference {
                    kind: ReferenceKind::LocalBranch,
                    name: "main".into(),
                    target: ObjectId::from("aaa"),
                },
                Reference {
                    kind: ReferenceKind::LocalBranch,
                    name: "dev".into(),
                    target: ObjectId::from("bbb"),
                },
            ],
            remote: Vec::new(),
        });
        view.set_tags(Vec::new());
        view
    }

    #[test]
    fn up_down_motions_skip_group_headers() {
        let mut view = sample();
        assert_eq!(view.pos.active_row, 0);
        view.move_selection(1);
        // row 0 is the LocalBranches header; the first selectable row is index 1.
        assert_eq!(view.pos.active_row, 1);
        view.move_selection(1);
        assert_eq!(view.pos.active_row, 2);
    }

    #[test]
    fn selecting_a_reference_emits_on_ref_select() {
        let mut view = sample();
        view.move_selection(1);
        view.select_current();
        let actions = view.take_pending_actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::OnRefSelect { name, oid } => {
                assert_eq!(name, "main");
                assert_eq!(oid, "aaa");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn collapsing_a_group_hides_its_rows() {
        let mut view = sample();
        view.toggle_current_group();
        let rows = view.flatten();
        assert_eq!(rows.len(), 3); // three group headers, no Ref rows underneath any of them
        assert!(!rows.iter().any(|r| matches!(r, Row::Ref { .. })));
    }
}
