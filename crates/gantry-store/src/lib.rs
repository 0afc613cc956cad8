//! Versioned application-configuration store on top of a Git object API.
//!
//! Each release of an application is a directory of files committed to a
//! repository; the commit history of the application's `VERSION` file is
//! its release history. This crate provides:
//! - The [`GitApi`] capability trait the backing store must implement
//! - The configuration codec mapping apps to and from tree entries
//! - The [`Storage`] orchestrator: release creation, release history,
//!   and the application registry

mod api;
mod codec;
mod error;
pub mod path;
mod storage;

pub use api::{
    BLOB_MODE, CommitInfo, ContentFetcher, DirEntry, EntryKind, GitApi, GitApiError,
    GitApiResult, TreeEntry,
};
pub use codec::{FILE_ENV, FILE_IMAGE, FILE_SERVICES, FILE_VERSION};
pub use error::{StoreError, StoreResult};
pub use storage::Storage;
