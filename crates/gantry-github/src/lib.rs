//! GitHub REST adapter for the Gantry store.
//!
//! Implements the store's [`GitApi`](gantry_store::GitApi) capability
//! against the GitHub git-data and contents endpoints, so application
//! configuration can be stored in a GitHub repository.

mod client;
mod config;

pub use client::GitHubApi;
pub use config::{ConfigError, GitHubConfig};
