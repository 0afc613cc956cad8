//! Store error types.

use thiserror::Error;

use crate::api::GitApiError;

/// Storage-layer errors.
///
/// Remote failures keep the operation and identifying ref/SHA they
/// occurred under; decode failures name the offending path. Not-found
/// and not-implemented are distinct variants so callers can map them to
/// 404- and 501-equivalent responses instead of a blanket 500.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Resolving the target ref failed.
    #[error("get {reference:?} ref: {source}")]
    ResolveRef {
        /// The ref being resolved.
        reference: String,
        /// Underlying API error.
        source: GitApiError,
    },

    /// Fetching a commit object failed.
    #[error("get commit {sha:?}: {source}")]
    GetCommit {
        /// The commit being fetched.
        sha: String,
        /// Underlying API error.
        source: GitApiError,
    },

    /// Serializing application state into tree entries failed.
    #[error("generating tree entries: {0}")]
    Encode(String),

    /// Creating the tree object failed.
    #[error("creating tree: {0}")]
    CreateTree(#[source] GitApiError),

    /// Creating the commit object failed.
    #[error("creating commit: {0}")]
    CreateCommit(#[source] GitApiError),

    /// Merging the release commit into the target ref failed.
    #[error("merging {head:?} into {reference:?}: {source}")]
    Merge {
        /// The commit that was to be published.
        head: String,
        /// The target ref.
        reference: String,
        /// Underlying API error.
        source: GitApiError,
    },

    /// A stored file is missing or cannot be decoded.
    #[error("decoding {path:?}: {reason}")]
    Decode {
        /// Path of the offending file.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// No application matched the query.
    #[error("app not found: {0}")]
    NotFound(String),

    /// The operation is not supported by this store.
    #[error("{0} not implemented")]
    NotImplemented(&'static str),

    /// The store was constructed with invalid settings.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// Any other API failure, e.g. from a listing call.
    #[error(transparent)]
    Api(#[from] GitApiError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
