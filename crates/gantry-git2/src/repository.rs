//! Git repository wrapper implementing the store's Git API.

use std::path::Path;

use chrono::{TimeZone, Utc};
use git2::{DiffOptions, IndexEntry, IndexTime, Oid, Repository as Git2Repo, Sort};
use tracing::debug;

use gantry_store::{
    CommitInfo, DirEntry, EntryKind, GitApi, GitApiError, GitApiResult, TreeEntry,
};

/// A local Git repository acting as the object store.
pub struct LocalRepo {
    inner: Git2Repo,
}

impl LocalRepo {
    /// Opens a repository (bare or with worktree) at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a valid Git repository.
    pub fn open(path: impl AsRef<Path>) -> GitApiResult<Self> {
        let path = path.as_ref();
        let inner = Git2Repo::open(path).map_err(|e| GitApiError::Remote {
            op: "open repository",
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(Self { inner })
    }

    /// Normalizes GitHub-style ref names (`heads/main`) and bare branch
    /// names to fully qualified ones.
    fn refname(reference: &str) -> String {
        if reference.starts_with("refs/") {
            reference.to_string()
        } else if reference.starts_with("heads/") || reference.starts_with("tags/") {
            format!("refs/{reference}")
        } else {
            format!("refs/heads/{reference}")
        }
    }

    /// Finds the commit for a reference that may be a SHA or a ref name.
    fn peel(&self, reference: &str) -> GitApiResult<git2::Commit<'_>> {
        if let Ok(oid) = Oid::from_str(reference)
            && let Ok(commit) = self.inner.find_commit(oid)
        {
            return Ok(commit);
        }
        let name = Self::refname(reference);
        let git_ref = self
            .inner
            .find_reference(&name)
            .map_err(|_| GitApiError::RefNotFound(reference.to_string()))?;
        git_ref
            .peel_to_commit()
            .map_err(|_| GitApiError::RefNotFound(reference.to_string()))
    }

    fn commit_info(commit: &git2::Commit<'_>) -> CommitInfo {
        let when = commit.committer().when();
        CommitInfo {
            sha: commit.id().to_string(),
            tree: commit.tree_id().to_string(),
            message: commit.message().unwrap_or("").to_string(),
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            committer_date: Utc
                .timestamp_opt(when.seconds(), 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    /// Whether `commit` changed `path` relative to its first parent.
    fn touches_path(&self, commit: &git2::Commit<'_>, path: &str) -> GitApiResult<bool> {
        let tree = commit.tree().map_err(|e| remote("read tree", &e))?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree().map_err(|e| remote("read tree", &e))?),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        opts.pathspec(path);
        let diff = self
            .inner
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .map_err(|e| remote("diff trees", &e))?;

        Ok(diff.deltas().len() > 0)
    }
}

fn remote(op: &'static str, e: &git2::Error) -> GitApiError {
    GitApiError::Remote {
        op,
        message: e.to_string(),
    }
}

impl GitApi for LocalRepo {
    fn resolve_ref(&self, reference: &str) -> GitApiResult<String> {
        let name = Self::refname(reference);
        let git_ref = self
            .inner
            .find_reference(&name)
            .map_err(|_| GitApiError::RefNotFound(reference.to_string()))?;
        let commit = git_ref
            .peel_to_commit()
            .map_err(|_| GitApiError::RefNotFound(reference.to_string()))?;
        Ok(commit.id().to_string())
    }

    fn commit(&self, sha: &str) -> GitApiResult<CommitInfo> {
        let oid =
            Oid::from_str(sha).map_err(|_| GitApiError::ObjectNotFound(sha.to_string()))?;
        let commit = self
            .inner
            .find_commit(oid)
            .map_err(|_| GitApiError::ObjectNotFound(sha.to_string()))?;
        Ok(Self::commit_info(&commit))
    }

    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> GitApiResult<String> {
        let base_oid = Oid::from_str(base_tree)
            .map_err(|_| GitApiError::ObjectNotFound(base_tree.to_string()))?;
        let base = self
            .inner
            .find_tree(base_oid)
            .map_err(|_| GitApiError::ObjectNotFound(base_tree.to_string()))?;

        let mut index = git2::Index::new().map_err(|e| remote("create tree", &e))?;
        index.read_tree(&base).map_err(|e| remote("create tree", &e))?;

        for entry in entries {
            let blob = self
                .inner
                .blob(entry.content.as_bytes())
                .map_err(|e| remote("create tree", &e))?;
            let index_entry = IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: 0o100_644,
                uid: 0,
                gid: 0,
                file_size: entry.content.len() as u32,
                id: blob,
                flags: 0,
                flags_extended: 0,
                path: entry.path.clone().into_bytes(),
            };
            index
                .add(&index_entry)
                .map_err(|e| remote("create tree", &e))?;
        }

        let tree = index
            .write_tree_to(&self.inner)
            .map_err(|e| remote("create tree", &e))?;
        Ok(tree.to_string())
    }

    fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> GitApiResult<String> {
        let tree_oid =
            Oid::from_str(tree).map_err(|_| GitApiError::ObjectNotFound(tree.to_string()))?;
        let tree = self
            .inner
            .find_tree(tree_oid)
            .map_err(|_| GitApiError::ObjectNotFound(tree_oid.to_string()))?;

        let mut parent_commits = Vec::with_capacity(parents.len());
        for sha in parents {
            let oid =
                Oid::from_str(sha).map_err(|_| GitApiError::ObjectNotFound(sha.clone()))?;
            let commit = self
                .inner
                .find_commit(oid)
                .map_err(|_| GitApiError::ObjectNotFound(sha.clone()))?;
            parent_commits.push(commit);
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let sig = self
            .inner
            .signature()
            .map_err(|e| remote("create commit", &e))?;
        let oid = self
            .inner
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .map_err(|e| remote("create commit", &e))?;
        Ok(oid.to_string())
    }

    fn merge(&self, base_ref: &str, head_sha: &str) -> GitApiResult<()> {
        let refname = Self::refname(base_ref);
        let base_commit = self.peel(base_ref)?;
        let head_commit = self.peel(head_sha)?;

        if base_commit.id() == head_commit.id() {
            return Ok(());
        }

        // Fast-forward when the head already contains the base.
        let descendant = self
            .inner
            .graph_descendant_of(head_commit.id(), base_commit.id())
            .map_err(|e| remote("merge", &e))?;
        if descendant {
            self.inner
                .reference(&refname, head_commit.id(), true, "fast-forward")
                .map_err(|e| remote("merge", &e))?;
            debug!(reference = %base_ref, head = %head_commit.id(), "fast-forwarded");
            return Ok(());
        }

        let mut merged = self
            .inner
            .merge_commits(&base_commit, &head_commit, None)
            .map_err(|e| remote("merge", &e))?;
        if merged.has_conflicts() {
            return Err(GitApiError::MergeConflict {
                base: base_ref.to_string(),
                head: head_sha.to_string(),
            });
        }

        let tree_oid = merged
            .write_tree_to(&self.inner)
            .map_err(|e| remote("merge", &e))?;
        let tree = self
            .inner
            .find_tree(tree_oid)
            .map_err(|e| remote("merge", &e))?;
        let sig = self.inner.signature().map_err(|e| remote("merge", &e))?;
        let message = format!("Merge {head_sha} into {base_ref}");
        let merge_oid = self
            .inner
            .commit(
                Some(&refname),
                &sig,
                &sig,
                &message,
                &tree,
                &[&base_commit, &head_commit],
            )
            .map_err(|e| remote("merge", &e))?;
        debug!(reference = %base_ref, merge = %merge_oid, "created merge commit");
        Ok(())
    }

    fn commits_touching(&self, reference: &str, path: &str) -> GitApiResult<Vec<CommitInfo>> {
        let tip = self.peel(reference)?;

        let mut revwalk = self.inner.revwalk().map_err(|e| remote("list commits", &e))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| remote("list commits", &e))?;
        revwalk.push(tip.id()).map_err(|e| remote("list commits", &e))?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| remote("list commits", &e))?;
            let commit = self
                .inner
                .find_commit(oid)
                .map_err(|e| remote("list commits", &e))?;
            if self.touches_path(&commit, path)? {
                commits.push(Self::commit_info(&commit));
            }
        }

        Ok(commits)
    }

    fn read_file(&self, reference: &str, path: &str) -> GitApiResult<Vec<u8>> {
        let commit = self.peel(reference)?;
        let tree = commit.tree().map_err(|e| remote("read file", &e))?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|_| GitApiError::PathNotFound(path.to_string()))?;
        let object = entry
            .to_object(&self.inner)
            .map_err(|e| remote("read file", &e))?;
        let blob = object
            .as_blob()
            .ok_or_else(|| GitApiError::PathNotFound(path.to_string()))?;
        Ok(blob.content().to_vec())
    }

    fn read_dir(&self, reference: &str, path: &str) -> GitApiResult<Vec<DirEntry>> {
        let commit = self.peel(reference)?;
        let tree = commit.tree().map_err(|e| remote("read dir", &e))?;

        let dir = if path.is_empty() {
            tree
        } else {
            let entry = tree
                .get_path(Path::new(path))
                .map_err(|_| GitApiError::PathNotFound(path.to_string()))?;
            let object = entry
                .to_object(&self.inner)
                .map_err(|e| remote("read dir", &e))?;
            object
                .into_tree()
                .map_err(|_| GitApiError::PathNotFound(path.to_string()))?
        };

        let mut listing = Vec::with_capacity(dir.len());
        for entry in dir.iter() {
            let kind = match entry.kind() {
                Some(git2::ObjectType::Tree) => EntryKind::Dir,
                _ => EntryKind::File,
            };
            listing.push(DirEntry {
                name: entry.name().unwrap_or("").to_string(),
                kind,
            });
        }
        Ok(listing)
    }
}
