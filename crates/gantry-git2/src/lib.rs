//! Local-repository adapter for the Gantry store.
//!
//! Implements the store's [`GitApi`](gantry_store::GitApi) capability
//! against an on-disk repository via `git2`. Useful as a real backend
//! for single-host deployments and as the test backend for the store's
//! release-commit protocol.

mod repository;

pub use repository::LocalRepo;
