//! The Git object API capability.
//!
//! The remote (or local) Git object store is an external collaborator:
//! this module defines the trait the store orchestrates against, plus
//! the value types that cross that seam.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::path;

/// File mode for blob tree entries. Always this value.
pub const BLOB_MODE: &str = "100644";

/// Errors surfaced by a [`GitApi`] implementation.
///
/// Adapters map their transport failures into these variants; the store
/// wraps them with operation context and never retries.
#[derive(Debug, Error)]
pub enum GitApiError {
    /// The named ref does not exist.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A commit or tree object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// No file or directory at the given path for the given reference.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The merge could not be performed cleanly.
    #[error("merge conflict merging {head} into {base}")]
    MergeConflict {
        /// Target ref of the merge.
        base: String,
        /// Commit being merged.
        head: String,
    },

    /// Any other transport or remote-API failure.
    #[error("{op}: {message}")]
    Remote {
        /// The operation that failed.
        op: &'static str,
        /// Remote or transport error detail.
        message: String,
    },
}

/// Result type for Git API operations.
pub type GitApiResult<T> = Result<T, GitApiError>;

/// One file to be written by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Full path of the file within the repository.
    pub path: String,
    /// File mode; always [`BLOB_MODE`] for the entries this store writes.
    pub mode: &'static str,
    /// File content.
    pub content: String,
}

impl TreeEntry {
    /// Creates a blob entry at `path` with the given content.
    #[must_use]
    pub fn blob(path: String, content: String) -> Self {
        Self {
            path,
            mode: BLOB_MODE,
            content,
        }
    }
}

/// A commit object as reported by the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit SHA.
    pub sha: String,
    /// SHA of the commit's tree.
    pub tree: String,
    /// Commit message.
    pub message: String,
    /// Parent commit SHAs.
    pub parents: Vec<String>,
    /// Committer timestamp.
    pub committer_date: DateTime<Utc>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A subdirectory.
    Dir,
}

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, without any path prefix.
    pub name: String,
    /// Whether the entry is a file or a directory.
    pub kind: EntryKind,
}

/// The capabilities the store requires from a Git object API.
///
/// All operations are synchronous blocking calls; timeouts and
/// cancellation belong to the adapter's transport.
pub trait GitApi {
    /// Resolves a named ref to its tip commit SHA.
    ///
    /// # Errors
    ///
    /// Returns [`GitApiError::RefNotFound`] if the ref does not exist.
    fn resolve_ref(&self, reference: &str) -> GitApiResult<String>;

    /// Fetches the commit object for a SHA.
    ///
    /// # Errors
    ///
    /// Returns [`GitApiError::ObjectNotFound`] if no such commit exists.
    fn commit(&self, sha: &str) -> GitApiResult<CommitInfo>;

    /// Creates a tree from a base tree plus the given entries, returning
    /// the new tree's SHA.
    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> GitApiResult<String>;

    /// Creates a commit object, returning its SHA.
    fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> GitApiResult<String>;

    /// Merges `head_sha` into the named ref.
    ///
    /// Whether this fast-forwards, creates a merge commit, or fails with
    /// [`GitApiError::MergeConflict`] is decided by the backing store.
    fn merge(&self, base_ref: &str, head_sha: &str) -> GitApiResult<()>;

    /// Lists commits under `reference` that touched `path`, newest first.
    fn commits_touching(&self, reference: &str, path: &str) -> GitApiResult<Vec<CommitInfo>>;

    /// Reads the raw content of the file at `path` as of `reference`.
    ///
    /// `reference` may be a ref name or a commit SHA.
    ///
    /// # Errors
    ///
    /// Returns [`GitApiError::PathNotFound`] if there is no file there.
    fn read_file(&self, reference: &str, path: &str) -> GitApiResult<Vec<u8>>;

    /// Lists the directory at `path` as of `reference`.
    fn read_dir(&self, reference: &str, path: &str) -> GitApiResult<Vec<DirEntry>>;
}

/// The capability to read file content at one bound reference.
///
/// Decoding an application performs several reads; constructing one
/// fetcher per reference makes snapshot consistency across those reads
/// structural rather than a calling convention.
pub trait ContentFetcher {
    /// Reads the file at the sanitized path built from `elem`, relative
    /// to the store's base path, at the fetcher's bound reference.
    ///
    /// # Errors
    ///
    /// Returns [`GitApiError::PathNotFound`] if the file is absent.
    fn read(&self, elem: &[&str]) -> GitApiResult<Vec<u8>>;
}

/// A [`ContentFetcher`] pinned to one reference of a [`GitApi`].
pub(crate) struct AtRef<'a, G> {
    api: &'a G,
    base_path: &'a str,
    reference: String,
}

impl<'a, G: GitApi> AtRef<'a, G> {
    pub(crate) fn new(api: &'a G, base_path: &'a str, reference: String) -> Self {
        Self {
            api,
            base_path,
            reference,
        }
    }
}

impl<G: GitApi> ContentFetcher for AtRef<'_, G> {
    fn read(&self, elem: &[&str]) -> GitApiResult<Vec<u8>> {
        let full_path = path::join(self.base_path, elem);
        self.api.read_file(&self.reference, &full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_entry_mode() {
        let entry = TreeEntry::blob("apps/web/VERSION".to_string(), "v1".to_string());
        assert_eq!(entry.mode, "100644");
    }

    #[test]
    fn test_error_display() {
        let err = GitApiError::RefNotFound("heads/main".to_string());
        assert_eq!(err.to_string(), "ref not found: heads/main");

        let err = GitApiError::MergeConflict {
            base: "heads/main".to_string(),
            head: "abc123".to_string(),
        };
        assert_eq!(err.to_string(), "merge conflict merging abc123 into heads/main");

        let err = GitApiError::Remote {
            op: "create tree",
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "create tree: boom");
    }
}
