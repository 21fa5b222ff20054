//! Object-store adapter (spec.md §4.1): a thin, blocking collaborator over
//! `git2` supplying reference, commit and diff primitives. The data plane
//! (`grv-repo`) consumes the `RepoBackend` trait; it never touches `git2`
//! directly.

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use thiserror::Error;

/// The 40-hex content address of any stored object. Unique by value;
/// cheap to clone and hash so the data plane can use it as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_oid(oid: git2::Oid) -> Self {
        ObjectId(oid.to_string())
    }

    fn to_oid(&self) -> Result<git2::Oid, AdapterError> {
        git2::Oid::from_str(&self.0)
            .map_err(|e| AdapterError::CorruptObject(format!("invalid object id {}: {e}", self.0)))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    LocalBranch,
    RemoteBranch,
    Tag,
    DetachedHead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub name: String,
    /// Resolved commit id; tag indirection (annotated tag -> commit) has
    /// already been followed one level (see DESIGN.md Open Question 1).
    pub target: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Unix timestamp, seconds.
    pub when: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: ObjectId,
    pub author: Signature,
    pub committer: Signature,
    pub summary: String,
    pub parent_count: usize,
    pub parents: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub commit: ObjectId,
    /// Unified-patch body, matching the external format named in spec.md §6.
    pub patch: Vec<u8>,
    pub stats: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("corrupt object: {0}")]
    CorruptObject(String),
}

impl From<git2::Error> for AdapterError {
    fn from(e: git2::Error) -> Self {
        use git2::ErrorCode::*;
        match e.code() {
            NotFound => AdapterError::NotFound(e.message().to_string()),
            _ => AdapterError::Io(e.message().to_string()),
        }
    }
}

/// Cooperative cancellation handle shared between a commit loader task and
/// the producer iterating the DAG (spec.md §4.1, §5).
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// The core consumes these operations; it never implements them (spec.md §4.1).
pub trait RepoBackend: Send + Sync {
    fn head(&self) -> Result<(ObjectId, Option<String>), AdapterError>;
    fn load_branches(&self) -> Result<Vec<Reference>, AdapterError>;
    fn load_tags(&self) -> Result<Vec<Reference>, AdapterError>;
    /// Lazy, newest-first sequence of commits reachable from `from`,
    /// observing `cancel` cooperatively between items. Borrows the backend
    /// for the iterator's lifetime; callers drain it within one blocking
    /// call rather than holding it across an `.await` point.
    fn commits<'a>(
        &'a self,
        from: ObjectId,
        cancel: CancelToken,
    ) -> Result<Box<dyn Iterator<Item = Result<Commit, AdapterError>> + 'a>, AdapterError>;
    fn commit(&self, id: &ObjectId) -> Result<Commit, AdapterError>;
    fn diff(&self, commit: &Commit) -> Result<Diff, AdapterError>;
}

pub struct Git2Backend {
    repo: git2::Repository,
}

impl Git2Backend {
    pub fn open(path: &std::path::Path) -> Result<Self, AdapterError> {
        let repo = git2::Repository::discover(path)
            .map_err(|e| AdapterError::NotFound(format!("{}: {e}", path.display())))?;
        Ok(Self { repo })
    }

    fn commit_from_oid(&self, oid: git2::Oid) -> Result<Commit, AdapterError> {
        let commit = self.repo.find_commit(oid).map_err(AdapterError::from)?;
        Ok(build_commit(&commit))
    }

    /// Resolve a reference target, following at most one level of
    /// annotated-tag indirection (DESIGN.md Open Question 1).
    fn resolve_target(&self, oid: git2::Oid) -> Result<ObjectId, AdapterError> {
        let obj = self.repo.find_object(oid, None).map_err(AdapterError::from)?;
        match obj.kind() {
            Some(git2::ObjectType::Commit) => Ok(ObjectId::from_oid(oid)),
            Some(git2::ObjectType::Tag) => {
                let tag = obj.as_tag().expect("kind checked above");
                let target = tag.target().map_err(AdapterError::from)?;
                if target.kind() == Some(git2::ObjectType::Commit) {
                    Ok(ObjectId::from_oid(target.id()))
                } else {
                    Err(AdapterError::CorruptObject(format!(
                        "tag {oid} does not resolve to a commit within one level of indirection"
                    )))
                }
            }
            other => Err(AdapterError::CorruptObject(format!(
                "unexpected object kind for reference target: {other:?}"
            ))),
        }
    }
}

fn build_commit(commit: &git2::Commit) -> Commit {
    let author = commit.author();
    let committer = commit.committer();
    Commit {
        id: ObjectId::from_oid(commit.id()),
        author: Signature {
            name: author.name().unwrap_or_default().to_string(),
            email: author.email().unwrap_or_default().to_string(),
            when: author.when().seconds(),
        },
        committer: Signature {
            name: committer.name().unwrap_or_default().to_string(),
            email: committer.email().unwrap_or_default().to_string(),
            when: committer.when().seconds(),
        },
        summary: commit.summary().unwrap_or_default().to_string(),
        parent_count: commit.parent_count(),
        parents: commit.parent_ids().map(ObjectId::from_oid).collect(),
    }
}

impl RepoBackend for Git2Backend {
    fn head(&self) -> Result<(ObjectId, Option<String>), AdapterError> {
        let head = self.repo.head().map_err(AdapterError::from)?;
        let oid = head
            .target()
            .ok_or_else(|| AdapterError::CorruptObject("HEAD has no target".into()))?;
        let branch = head.shorthand().map(|s| s.to_string());
        Ok((ObjectId::from_oid(oid), branch))
    }

    fn load_branches(&self) -> Result<Vec<Reference>, AdapterError> {
        let mut out = Vec::new();
        for item in self.repo.branches(None).map_err(AdapterError::from)? {
            let (branch, branch_type) = item.map_err(AdapterError::from)?;
            let Some(name) = branch.name().map_err(AdapterError::from)?.map(str::to_string) else {
                continue;
            };
            let Some(oid) = branch.get().target() else {
                continue;
            };
            let kind = match branch_type {
                git2::BranchType::Local => ReferenceKind::LocalBranch,
                git2::BranchType::Remote => ReferenceKind::RemoteBranch,
            };
            out.push(Reference {
                kind,
                name,
                target: ObjectId::from_oid(oid),
            });
        }
        Ok(out)
    }

    fn load_tags(&self) -> Result<Vec<Reference>, AdapterError> {
        let mut out = Vec::new();
        let names = self.repo.tag_names(None).map_err(AdapterError::from)?;
        for name in names.iter().flatten() {
            let refname = format!("refs/tags/{name}");
            let reference = self.repo.find_reference(&refname).map_err(AdapterError::from)?;
            let Some(oid) = reference.target() else {
                continue;
            };
            let target = self.resolve_target(oid)?;
            out.push(Reference {
                kind: ReferenceKind::Tag,
                name: name.to_string(),
                target,
            });
        }
        Ok(out)
    }

    fn commits<'a>(
        &'a self,
        from: ObjectId,
        cancel: CancelToken,
    ) -> Result<Box<dyn Iterator<Item = Result<Commit, AdapterError>> + 'a>, AdapterError> {
        let oid = from.to_oid()?;
        let mut revwalk = self.repo.revwalk().map_err(AdapterError::from)?;
        revwalk.push(oid).map_err(AdapterError::from)?;
        revwalk
            .set_sorting(git2::Sort::TIME | git2::Sort::TOPOLOGICAL)
            .map_err(AdapterError::from)?;

        // git2 borrows the repository; the iterator below owns the revwalk
        // and a raw pointer back to the repo for lookups, matching the
        // "lazy sequence, cooperative cancellation" contract in spec.md §4.1.
        struct CommitIter<'a> {
            revwalk: git2::Revwalk<'a>,
            repo: &'a git2::Repository,
            cancel: CancelToken,
        }
        impl<'a> Iterator for CommitIter<'a> {
            type Item = Result<Commit, AdapterError>;
            fn next(&mut self) -> Option<Self::Item> {
                if self.cancel.is_cancelled() {
                    return None;
                }
                let oid = match self.revwalk.next()? {
                    Ok(oid) => oid,
                    Err(e) => return Some(Err(AdapterError::from(e))),
                };
                let commit = match self.repo.find_commit(oid) {
                    Ok(c) => c,
                    Err(e) => return Some(Err(AdapterError::from(e))),
                };
                Some(Ok(build_commit(&commit)))
            }
        }

        Ok(Box::new(CommitIter {
            revwalk,
            repo: &self.repo,
            cancel,
        }))
    }

    fn commit(&self, id: &ObjectId) -> Result<Commit, AdapterError> {
        let oid = id.to_oid()?;
        let resolved = self.resolve_target(oid).unwrap_or_else(|_| id.clone());
        let oid = resolved.to_oid()?;
        self.commit_from_oid(oid)
    }

    fn diff(&self, commit: &Commit) -> Result<Diff, AdapterError> {
        let oid = commit.id.to_oid()?;
        let commit_obj = self.repo.find_commit(oid).map_err(AdapterError::from)?;
        if commit_obj.parent_count() > 1 {
            // Merge-commit policy (spec.md §4.1): empty diff.
            return Ok(Diff {
                commit: commit.id.clone(),
                patch: Vec::new(),
                stats: Vec::new(),
            });
        }
        let new_tree = commit_obj.tree().map_err(AdapterError::from)?;
        let old_tree = if commit_obj.parent_count() == 1 {
            Some(
                commit_obj
                    .parent(0)
                    .map_err(AdapterError::from)?
                    .tree()
                    .map_err(AdapterError::from)?,
            )
        } else {
            None
        };
        let mut diff_opts = git2::DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut diff_opts))
            .map_err(AdapterError::from)?;

        let mut patch = Vec::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(
                line.origin(),
                '+' | '-' | ' '
            ) {
                patch.push(line.origin() as u8);
            }
            patch.extend_from_slice(line.content());
            true
        })
        .map_err(AdapterError::from)?;

        let stats = diff.stats().map_err(AdapterError::from)?;
        let stats_buf = stats
            .to_buf(git2::DiffStatsFormat::FULL, 80)
            .map_err(AdapterError::from)?;

        Ok(Diff {
            commit: commit.id.clone(),
            patch,
            stats: stats_buf.as_slice().to_vec(),
        })
    }
}

/// Stable ordering used when a caller needs to sort commits already
/// obtained from a backend (newest-first by committer time, ties broken by
/// id — spec.md §4.1).
pub fn commit_order(a: &Commit, b: &Commit) -> Ordering {
    b.committer
        .when
        .cmp(&a.committer.when)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo(dir: &std::path::Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir)
                .env("GIT_AUTHOR_NAME", "Test")
                .env("GIT_AUTHOR_EMAIL", "test@example.com")
                .env("GIT_COMMITTER_NAME", "Test")
                .env("GIT_COMMITTER_EMAIL", "test@example.com")
                .status()
                .expect("git available");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        std::fs::write(dir.join("a.txt"), "one\n").unwrap();
        run(&["add", "a.txt"]);
        run(&["commit", "-q", "-m", "first"]);
        std::fs::write(dir.join("a.txt"), "two\n").unwrap();
        run(&["add", "a.txt"]);
        run(&["commit", "-q", "-m", "second"]);
        run(&["tag", "v1"]);
    }

    #[test]
    fn head_and_commits_walk_history() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let backend = Git2Backend::open(dir.path()).unwrap();
        let (head_id, branch) = backend.head().unwrap();
        assert!(branch.is_some());

        let commits: Vec<_> = backend
            .commits(head_id, CancelToken::new())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].summary, "second");
        assert_eq!(commits[1].summary, "first");
    }

    #[test]
    fn tags_resolve_to_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let backend = Git2Backend::open(dir.path()).unwrap();
        let tags = backend.load_tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "v1");
        let (head_id, _) = backend.head().unwrap();
        assert_eq!(tags[0].target, head_id);
    }

    #[test]
    fn cancel_token_stops_iteration_early() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let backend = Git2Backend::open(dir.path()).unwrap();
        let (head_id, _) = backend.head().unwrap();
        let cancel = CancelToken::new();
        let mut iter = backend.commits(head_id, cancel.clone()).unwrap();
        assert!(iter.next().is_some());
        cancel.cancel();
        assert!(iter.next().is_none());
    }

    #[test]
    fn diff_of_single_parent_commit_has_patch() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let backend = Git2Backend::open(dir.path()).unwrap();
        let (head_id, _) = backend.head().unwrap();
        let commit = backend.commit(&head_id).unwrap();
        let diff = backend.diff(&commit).unwrap();
        assert!(!diff.patch.is_empty());
    }
}
