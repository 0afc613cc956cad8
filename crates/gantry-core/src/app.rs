//! Applications and releases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{Formation, ImageRef};

/// Environment variables for an application.
///
/// A `BTreeMap` so that serialized output has a stable key order.
pub type Environment = BTreeMap<String, String>;

/// An application and its configuration state.
///
/// The storage layer persists this as a directory of files and
/// reconstructs it from a commit; ownership of the state itself stays
/// with the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    /// Unique name, also the directory name in storage.
    pub name: String,
    /// Release counter. Starts at 0, bumped by exactly 1 per release.
    pub version: u32,
    /// Environment variables, if any have been set.
    pub environment: Option<Environment>,
    /// Container image to run, once one has been deployed.
    pub image: Option<ImageRef>,
    /// Process formation, once one has been configured.
    pub formation: Option<Formation>,
}

impl App {
    /// Creates a new application with no configuration and version 0.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            environment: None,
            image: None,
            formation: None,
        }
    }
}

/// An immutable snapshot of an application at release time.
///
/// Identity is implicit: a release is identified by its position in the
/// commit history of the application's version file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Application state as of this release.
    pub app: App,
    /// Human-readable description, stored as the commit message.
    pub description: String,
    /// When the release was created (committer timestamp on reads).
    pub created_at: DateTime<Utc>,
}
