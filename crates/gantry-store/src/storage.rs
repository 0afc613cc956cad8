//! Storage orchestration.
//!
//! [`Storage`] publishes releases by committing configuration files to
//! the backing repository and reconstructs applications and their
//! release history by reading those files back out of commits.

use chrono::Utc;
use gantry_core::{App, Release};
use tracing::{debug, info};

use crate::api::{AtRef, GitApi};
use crate::codec::{self, FILE_VERSION};
use crate::error::{StoreError, StoreResult};
use crate::path;

/// A versioned application-configuration store on top of a [`GitApi`].
///
/// Configuration lives under `base_path/<app name>/` on the target ref.
/// No mutual exclusion is performed over that ref: concurrent publishes
/// are arbitrated entirely by the backing store's merge primitive.
pub struct Storage<G> {
    api: G,
    base_path: String,
    reference: String,
}

impl<G: GitApi> Storage<G> {
    /// Creates a storage layer writing under `base_path` on `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `base_path` or `reference` is
    /// empty.
    pub fn new(
        api: G,
        base_path: impl Into<String>,
        reference: impl Into<String>,
    ) -> StoreResult<Self> {
        let base_path = base_path.into();
        let reference = reference.into();
        if base_path.is_empty() {
            return Err(StoreError::Config("base path must not be empty".to_string()));
        }
        if reference.is_empty() {
            return Err(StoreError::Config("target ref must not be empty".to_string()));
        }
        Ok(Self {
            api,
            base_path,
            reference,
        })
    }

    /// Publishes a new release of `app`.
    ///
    /// Commits the app's configuration files, version bumped by one, as
    /// a commit on top of the target ref's tip, then merges that commit
    /// into the ref. Roughly, in CLI terms:
    ///
    /// ```text
    /// > git checkout -b changes
    /// > touch VERSION app.env image.txt services.json
    /// > git commit -m "Description of the changes"
    /// > git checkout base-ref
    /// > git merge changes
    /// ```
    ///
    /// The input app is not modified; the bumped copy is carried by the
    /// returned [`Release`]. A failed attempt therefore leaves the
    /// caller's state untouched and is safe to retry from scratch — at
    /// worst an unreferenced commit object is left behind.
    ///
    /// # Errors
    ///
    /// Any step failing aborts the whole operation; nothing is retried.
    pub fn releases_create(&self, app: &App, description: &str) -> StoreResult<Release> {
        let mut app = app.clone();
        app.version += 1;

        // Tip of the ref we want to update; base for our changes.
        let tip = self
            .api
            .resolve_ref(&self.reference)
            .map_err(|source| StoreError::ResolveRef {
                reference: self.reference.clone(),
                source,
            })?;
        let last_commit = self
            .api
            .commit(&tip)
            .map_err(|source| StoreError::GetCommit {
                sha: tip.clone(),
                source,
            })?;
        debug!(reference = %self.reference, tip = %tip, "resolved target ref");

        // Serialization failures surface here, before anything is written.
        let entries = codec::tree_entries(&self.base_path, &app)?;

        let tree = self
            .api
            .create_tree(&last_commit.tree, &entries)
            .map_err(StoreError::CreateTree)?;
        let commit = self
            .api
            .create_commit(description, &tree, std::slice::from_ref(&tip))
            .map_err(StoreError::CreateCommit)?;
        debug!(commit = %commit, entries = entries.len(), "created release commit");

        self.api
            .merge(&self.reference, &commit)
            .map_err(|source| StoreError::Merge {
                head: commit.clone(),
                reference: self.reference.clone(),
                source,
            })?;

        info!(app = %app.name, version = app.version, "created release");

        Ok(Release {
            app,
            description: description.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Returns the release history of the named application, most
    /// recent first.
    ///
    /// Walks the commits that touched the app's `VERSION` file and
    /// decodes the full configuration as of each commit, pinned to that
    /// commit's SHA so every file of one release comes from the same
    /// snapshot. One decode costs several reads; history length drives
    /// the total.
    pub fn releases(&self, app_name: &str) -> StoreResult<Vec<Release>> {
        let version_path = path::join(&self.base_path, &[app_name, FILE_VERSION]);
        let commits = self.api.commits_touching(&self.reference, &version_path)?;
        debug!(app = %app_name, commits = commits.len(), "walking release history");

        let mut releases = Vec::with_capacity(commits.len());
        for commit in commits {
            let fetcher = self.contents_at(commit.sha.clone());
            let app = codec::load_app(&fetcher, app_name)?;
            releases.push(Release {
                app,
                description: commit.message,
                created_at: commit.committer_date,
            });
        }

        Ok(releases)
    }

    /// Lists applications, optionally filtered by exact name.
    ///
    /// Every immediate subdirectory of the base path is an application;
    /// only the name is populated.
    pub fn apps(&self, name: Option<&str>) -> StoreResult<Vec<App>> {
        let listing = self.api.read_dir(&self.reference, &self.base_path)?;

        let mut apps: Vec<App> = listing
            .into_iter()
            .filter(|entry| entry.kind == crate::api::EntryKind::Dir)
            .map(|entry| App::new(entry.name))
            .collect();

        if let Some(name) = name {
            apps.retain(|app| app.name == name);
        }

        Ok(apps)
    }

    /// Finds one application by name and loads its full configuration
    /// as of the target ref's current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no application matches.
    pub fn apps_find(&self, name: &str) -> StoreResult<App> {
        let apps = self.apps(Some(name))?;
        let Some(app) = apps.into_iter().next() else {
            return Err(StoreError::NotFound(name.to_string()));
        };

        let fetcher = self.contents_at(self.reference.clone());
        codec::load_app(&fetcher, &app.name)
    }

    /// Destroying applications is not supported by this store.
    pub fn apps_destroy(&self, _app: &App) -> StoreResult<()> {
        Err(StoreError::NotImplemented("apps destroy"))
    }

    /// Finding a release directly by identity is not supported; use
    /// [`Storage::releases`].
    pub fn releases_find(&self, _app_name: &str, _version: u32) -> StoreResult<Release> {
        Err(StoreError::NotImplemented("releases find"))
    }

    /// Resetting would rewrite repository history; refused.
    pub fn reset(&self) -> StoreResult<()> {
        Err(StoreError::NotImplemented("reset"))
    }

    /// The store holds no connections of its own; always healthy.
    pub fn is_healthy(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Builds a content fetcher pinned to `reference`, which may be the
    /// target ref or a specific commit SHA.
    fn contents_at(&self, reference: String) -> AtRef<'_, G> {
        AtRef::new(&self.api, &self.base_path, reference)
    }
}
