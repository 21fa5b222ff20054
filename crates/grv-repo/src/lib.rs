//! Data plane (spec.md §4.2): owns the interning cache, head/branch/tag
//! state, per-reference commit sets, and the reverse ref index. Background
//! loads run on blocking tasks (the adapter is synchronous git2) and signal
//! completion through a caller-supplied callback plus the shared display
//! channel's redraw-coalescing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use grv_git::{AdapterError, CancelToken, Commit, ObjectId, Reference, ReferenceKind, RepoBackend};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("no commit set loaded for {0}")]
    NotLoaded(ObjectId),
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Reverse-ref index entry: which reference(s) point (directly) at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub kind: ReferenceKind,
    pub name: String,
}

#[derive(Default)]
struct RefsIndex {
    by_commit: HashMap<ObjectId, Vec<RefEntry>>,
}

impl RefsIndex {
    fn add(&mut self, commit: ObjectId, entry: RefEntry) {
        let list = self.by_commit.entry(commit).or_default();
        if !list.iter().any(|e| e.kind == entry.kind && e.name == entry.name) {
            list.push(entry);
        }
    }
}

struct CommitSet {
    commits: RwLock<Vec<Commit>>,
    loading: AtomicBool,
    cancel: CancelToken,
}

impl CommitSet {
    fn new() -> Self {
        Self {
            commits: RwLock::new(Vec::new()),
            loading: AtomicBool::new(true),
            cancel: CancelToken::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSetState {
    pub loading: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSet {
    pub local: Vec<Reference>,
    pub remote: Vec<Reference>,
}

/// Owns repository state. `B` is the adapter backend, generic so tests can
/// plug in a fake; production code uses `grv_git::Git2Backend`.
pub struct RepositoryData<B: RepoBackend + 'static> {
    backend: Arc<B>,
    head: RwLock<Option<(ObjectId, Option<String>)>>,
    branches: RwLock<Option<BranchSet>>,
    branches_loading: AtomicBool,
    tags: RwLock<Option<Vec<Reference>>>,
    tags_loading: AtomicBool,
    commit_sets: RwLock<HashMap<ObjectId, Arc<CommitSet>>>,
    refs_index: RwLock<RefsIndex>,
}

impl<B: RepoBackend + 'static> RepositoryData<B> {
    pub fn new(backend: B) -> Arc<Self> {
        Arc::new(Self {
            backend: Arc::new(backend),
            head: RwLock::new(None),
            branches: RwLock::new(None),
            branches_loading: AtomicBool::new(false),
            tags: RwLock::new(None),
            tags_loading: AtomicBool::new(false),
            commit_sets: RwLock::new(HashMap::new()),
            refs_index: RwLock::new(RefsIndex::default()),
        })
    }

    pub fn load_head(&self) -> Result<(ObjectId, Option<String>), DataError> {
        let head = self.backend.head()?;
        *self.head.write().unwrap() = Some(head.clone());
        Ok(head)
    }

    pub fn cached_head(&self) -> Option<(ObjectId, Option<String>)> {
        self.head.read().unwrap().clone()
    }

    /// Idempotent: a load already in flight is a no-op (spec.md §4.2).
    pub fn load_branches<F>(self: &Arc<Self>, on_ready: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .branches_loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = {
                let this = Arc::clone(&this);
                tokio::task::spawn_blocking(move || this.backend.load_branches()).await
            };
            match result {
                Ok(Ok(refs)) => this.install_branches(refs),
                Ok(Err(e)) => tracing::warn!(target: "repo", error = %e, "load_branches failed"),
                Err(join_err) => {
                    tracing::warn!(target: "repo", error = %join_err, "load_branches task panicked")
                }
            }
            this.branches_loading.store(false, Ordering::Release);
            on_ready();
        });
    }

    fn install_branches(&self, mut refs: Vec<Reference>) {
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        let mut local = Vec::new();
        let mut remote = Vec::new();
        for r in refs {
            match r.kind {
                ReferenceKind::LocalBranch => local.push(r),
                ReferenceKind::RemoteBranch => remote.push(r),
                _ => {}
            }
        }
        local.sort_by(|a, b| a.name.cmp(&b.name));
        remote.sort_by(|a, b| a.name.cmp(&b.name));

        let mut index = self.refs_index.write().unwrap();
        for r in local.iter().chain(remote.iter()) {
            index.add(
                r.target.clone(),
                RefEntry {
                    kind: r.kind,
                    name: r.name.clone(),
                },
            );
        }
        drop(index);

        *self.branches.write().unwrap() = Some(BranchSet { local, remote });
    }

    pub fn branches(&self) -> Option<BranchSet> {
        self.branches.read().unwrap().clone()
    }

    pub fn load_tags<F>(self: &Arc<Self>, on_ready: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .tags_loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = {
                let this = Arc::clone(&this);
                tokio::task::spawn_blocking(move || this.backend.load_tags()).await
            };
            match result {
                Ok(Ok(mut refs)) => {
                    refs.sort_by(|a, b| a.name.cmp(&b.name));
                    let mut index = this.refs_index.write().unwrap();
                    for r in &refs {
                        index.add(
                            r.target.clone(),
                            RefEntry {
                                kind: r.kind,
                                name: r.name.clone(),
                            },
                        );
                    }
                    drop(index);
                    *this.tags.write().unwrap() = Some(refs);
                }
                Ok(Err(e)) => tracing::warn!(target: "repo", error = %e, "load_tags failed"),
                Err(join_err) => {
                    tracing::warn!(target: "repo", error = %join_err, "load_tags task panicked")
                }
            }
            this.tags_loading.store(false, Ordering::Release);
            on_ready();
        });
    }

    pub fn tags(&self) -> Option<Vec<Reference>> {
        self.tags.read().unwrap().clone()
    }

    /// Idempotent: an existing (or in-flight) set for `oid` is left alone.
    pub fn load_commits<F, R>(self: &Arc<Self>, oid: ObjectId, on_ready: F, on_redraw: R)
    where
        F: FnOnce() + Send + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        {
            let mut sets = self.commit_sets.write().unwrap();
            if sets.contains_key(&oid) {
                return;
            }
            sets.insert(oid.clone(), Arc::new(CommitSet::new()));
        }

        let this = Arc::clone(self);
        let cancel = {
            let sets = this.commit_sets.read().unwrap();
            sets.get(&oid).unwrap().cancel.clone()
        };
        let ticker_handle = spawn_loading_ticker(Arc::new(on_redraw));

        tokio::spawn(async move {
            let this2 = Arc::clone(&this);
            let target = oid.clone();
            let cancel2 = cancel.clone();
            let result = tokio::task::spawn_blocking(move || {
                let mut out = Vec::new();
                let mut err = None;
                match this2.backend.commits(target.clone(), cancel2.clone()) {
                    Ok(iter) => {
                        for item in iter {
                            match item {
                                Ok(commit) => {
                                    let set = {
                                        let sets = this2.commit_sets.read().unwrap();
                                        sets.get(&target).cloned()
                                    };
                                    if let Some(set) = set {
                                        set.commits.write().unwrap().push(commit.clone());
                                    }
                                    out.push(commit);
                                }
                                Err(e) => {
                                    err = Some(e);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => err = Some(e),
                }
                err
            })
            .await;

            if let Ok(Some(e)) = &result {
                tracing::warn!(target: "repo", error = %e, "load_commits reported an error; keeping loaded prefix");
            }
            if let Err(join_err) = &result {
                tracing::warn!(target: "repo", error = %join_err, "load_commits task panicked");
            }

            ticker_handle.stop();

            if let Some(set) = this.commit_sets.read().unwrap().get(&oid) {
                set.loading.store(false, Ordering::Release);
            }
            on_ready();
        });
    }

    /// Cooperatively cancel an in-flight commit load, e.g. on shutdown.
    /// Has no effect if no set exists or the load already finished
    /// (spec.md §4.2: "adapter cancellation (exit) is non-fatal").
    pub fn cancel_commit_load(&self, oid: &ObjectId) {
        if let Some(set) = self.commit_sets.read().unwrap().get(oid) {
            set.cancel.cancel();
        }
    }

    pub fn commit_set_state(&self, oid: &ObjectId) -> Option<CommitSetState> {
        let sets = self.commit_sets.read().unwrap();
        sets.get(oid).map(|s| CommitSetState {
            loading: s.loading.load(Ordering::Acquire),
            count: s.commits.read().unwrap().len(),
        })
    }

    /// Up to `count` commits from the snapshot starting at `start`. The
    /// snapshot length is re-read on each call since a loader may still be
    /// appending (spec.md §4.2).
    pub fn commits(
        &self,
        oid: &ObjectId,
        start: usize,
        count: usize,
    ) -> Result<Vec<Commit>, DataError> {
        let sets = self.commit_sets.read().unwrap();
        let set = sets.get(oid).ok_or_else(|| DataError::NotLoaded(oid.clone()))?;
        let commits = set.commits.read().unwrap();
        if start >= commits.len() {
            return Ok(Vec::new());
        }
        let end = (start + count).min(commits.len());
        Ok(commits[start..end].to_vec())
    }

    pub fn commit_by_index(&self, oid: &ObjectId, index: usize) -> Result<Commit, DataError> {
        let sets = self.commit_sets.read().unwrap();
        let set = sets.get(oid).ok_or_else(|| DataError::NotLoaded(oid.clone()))?;
        let commits = set.commits.read().unwrap();
        commits.get(index).cloned().ok_or(DataError::OutOfRange {
            index,
            len: commits.len(),
        })
    }

    pub fn refs_for_commit(&self, commit: &ObjectId) -> Vec<RefEntry> {
        self.refs_index
            .read()
            .unwrap()
            .by_commit
            .get(commit)
            .cloned()
            .unwrap_or_default()
    }

    pub fn diff(&self, commit: &Commit) -> Result<grv_git::Diff, DataError> {
        Ok(self.backend.diff(commit)?)
    }
}

struct TickerHandle {
    stop: Arc<AtomicBool>,
}

impl TickerHandle {
    fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Repaints every 500ms while a commit-set load is in flight, plus one
/// final repaint once `stop()` is observed (spec.md §4.2).
fn spawn_loading_ticker<R>(on_redraw: Arc<R>) -> TickerHandle
where
    R: Fn() + Send + Sync + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let handle = TickerHandle {
        stop: Arc::clone(&stop),
    };
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        interval.tick().await;
        loop {
            interval.tick().await;
            if stop.load(Ordering::Acquire) {
                on_redraw();
                break;
            }
            on_redraw();
        }
    });
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use grv_git::{CancelToken as Cancel, Signature};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    struct FakeBackend {
        commits: Vec<Commit>,
        branches: Vec<Reference>,
        tags: Vec<Reference>,
    }

    fn fake_commit(id: &str, when: i64) -> Commit {
        Commit {
            id: ObjectId::from(id),
            author: Signature {
                name: "Test".into(),
                email: "test@example.com".into(),
                when,
            },
            committer: Signature {
                name: "Test".into(),
                email: "test@example.com".into(),
                when,
            },
            summary: format!("commit {id}"),
            parent_count: 0,
            parents: Vec::new(),
        }
    }

    impl RepoBackend for FakeBackend {
        fn head(&self) -> Result<(ObjectId, Option<String>), AdapterError> {
            Ok((ObjectId::from("head"), Some("main".to_string())))
        }
        fn load_branches(&self) -> Result<Vec<Reference>, AdapterError> {
            Ok(self.branches.clone())
        }
        fn load_tags(&self) -> Result<Vec<Reference>, AdapterError> {
            Ok(self.tags.clone())
        }
        fn commits<'a>(
            &'a self,
            _from: ObjectId,
            cancel: Cancel,
        ) -> Result<Box<dyn Iterator<Item = Result<Commit, AdapterError>> + 'a>, AdapterError>
        {
            let items = self.commits.clone();
            Ok(Box::new(items.into_iter().map(Ok).take_while(move |_| {
                !cancel.is_cancelled()
            })))
        }
        fn commit(&self, id: &ObjectId) -> Result<Commit, AdapterError> {
            self.commits
                .iter()
                .find(|c| &c.id == id)
                .cloned()
                .ok_or_else(|| AdapterError::NotFound(id.to_string()))
        }
        fn diff(&self, commit: &Commit) -> Result<grv_git::Diff, AdapterError> {
            Ok(grv_git::Diff {
                commit: commit.id.clone(),
                patch: Vec::new(),
                stats: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn load_commits_is_idempotent_and_populates_set() {
        let backend = FakeBackend {
            commits: vec![fake_commit("a", 2), fake_commit("b", 1)],
            branches: Vec::new(),
            tags: Vec::new(),
        };
        let data = RepositoryData::new(backend);
        let ready_count = Arc::new(AtomicUsize::new(0));

        let rc = Arc::clone(&ready_count);
        data.load_commits(ObjectId::from("head"), move || {
            rc.fetch_add(1, Ordering::SeqCst);
        }, || {});
        // second call before the first completes must be a no-op
        data.load_commits(ObjectId::from("head"), || {}, || {});

        for _ in 0..50 {
            if ready_count.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        assert_eq!(ready_count.load(Ordering::SeqCst), 1);

        let state = data.commit_set_state(&ObjectId::from("head")).unwrap();
        assert!(!state.loading);
        assert_eq!(state.count, 2);

        let page = data.commits(&ObjectId::from("head"), 0, 10).unwrap();
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn load_branches_populates_reverse_ref_index() {
        let backend = FakeBackend {
            commits: Vec::new(),
            branches: vec![Reference {
                kind: ReferenceKind::LocalBranch,
                name: "main".to_string(),
                target: ObjectId::from("head"),
            }],
            tags: Vec::new(),
        };
        let data = RepositoryData::new(backend);
        let done = Arc::new(AtomicBool::new(false));
        let d = Arc::clone(&done);
        data.load_branches(move || d.store(true, Ordering::SeqCst));

        for _ in 0..50 {
            if done.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        assert!(done.load(Ordering::SeqCst));

        let refs = data.refs_for_commit(&ObjectId::from("head"));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "main");
    }

    #[test]
    fn commit_by_index_out_of_range_is_an_error() {
        let backend = FakeBackend {
            commits: Vec::new(),
            branches: Vec::new(),
            tags: Vec::new(),
        };
        let data = RepositoryData::new(backend);
        data.commit_sets
            .write()
            .unwrap()
            .insert(ObjectId::from("head"), Arc::new(CommitSet::new()));
        let err = data.commit_by_index(&ObjectId::from("head"), 3).unwrap_err();
        assert!(matches!(err, DataError::OutOfRange { .. }));
    }
}
