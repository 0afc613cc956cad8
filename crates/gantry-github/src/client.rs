//! GitHub REST client.
//!
//! https://docs.github.com/en/rest/git
//! https://docs.github.com/en/rest/repos/contents

use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gantry_store::{
    CommitInfo, DirEntry, EntryKind, GitApi, GitApiError, GitApiResult, TreeEntry,
};

use crate::config::{ConfigError, GitHubConfig};

/// A [`GitApi`] implementation over the GitHub REST API.
///
/// All calls are synchronous and blocking; timeouts are the transport's
/// and nothing is retried here.
pub struct GitHubApi {
    config: GitHubConfig,
    client: Client,
}

impl GitHubApi {
    /// Builds a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error when a required setting is missing or the HTTP
    /// client cannot be constructed.
    pub fn new(config: GitHubConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{tail}",
            self.config.api_url, self.config.owner, self.config.repo
        )
    }

    fn send(&self, op: &'static str, request: reqwest::blocking::RequestBuilder) -> GitApiResult<Response> {
        request.send().map_err(|e| GitApiError::Remote {
            op,
            message: e.to_string(),
        })
    }

    /// Turns a non-success response into a remote error with the status
    /// line and response body.
    fn check(op: &'static str, response: Response) -> GitApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        Err(GitApiError::Remote {
            op,
            message: format!("{status}: {message}"),
        })
    }

    fn json<T: serde::de::DeserializeOwned>(op: &'static str, response: Response) -> GitApiResult<T> {
        response.json().map_err(|e| GitApiError::Remote {
            op,
            message: e.to_string(),
        })
    }
}

impl GitApi for GitHubApi {
    fn resolve_ref(&self, reference: &str) -> GitApiResult<String> {
        let url = self.url(&format!("git/ref/{reference}"));
        let response = self.send("get ref", self.client.get(&url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GitApiError::RefNotFound(reference.to_string()));
        }
        let data: RefResponse = Self::json("get ref", Self::check("get ref", response)?)?;
        Ok(data.object.sha)
    }

    fn commit(&self, sha: &str) -> GitApiResult<CommitInfo> {
        let url = self.url(&format!("git/commits/{sha}"));
        let response = self.send("get commit", self.client.get(&url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GitApiError::ObjectNotFound(sha.to_string()));
        }
        let data: GitCommit = Self::json("get commit", Self::check("get commit", response)?)?;
        Ok(data.into())
    }

    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> GitApiResult<String> {
        let body = CreateTree {
            base_tree,
            tree: entries
                .iter()
                .map(|e| WireTreeEntry {
                    path: &e.path,
                    mode: e.mode,
                    kind: "blob",
                    content: &e.content,
                })
                .collect(),
        };
        let url = self.url("git/trees");
        let response = self.send("create tree", self.client.post(&url).json(&body))?;
        let data: ShaResponse =
            Self::json("create tree", Self::check("create tree", response)?)?;
        debug!(tree = %data.sha, entries = entries.len(), "created tree");
        Ok(data.sha)
    }

    fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> GitApiResult<String> {
        let body = CreateCommit {
            message,
            tree,
            parents,
        };
        let url = self.url("git/commits");
        let response = self.send("create commit", self.client.post(&url).json(&body))?;
        let data: ShaResponse =
            Self::json("create commit", Self::check("create commit", response)?)?;
        debug!(commit = %data.sha, "created commit");
        Ok(data.sha)
    }

    fn merge(&self, base_ref: &str, head_sha: &str) -> GitApiResult<()> {
        // The merges endpoint takes a branch name, not a git ref path.
        let base = base_ref
            .trim_start_matches("refs/")
            .trim_start_matches("heads/");
        let body = MergeRequest {
            base,
            head: head_sha,
        };
        let url = self.url("merges");
        let response = self.send("merge", self.client.post(&url).json(&body))?;
        match response.status() {
            StatusCode::CONFLICT => Err(GitApiError::MergeConflict {
                base: base_ref.to_string(),
                head: head_sha.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(GitApiError::ObjectNotFound(head_sha.to_string())),
            _ => {
                Self::check("merge", response)?;
                Ok(())
            }
        }
    }

    fn commits_touching(&self, reference: &str, path: &str) -> GitApiResult<Vec<CommitInfo>> {
        let url = self.url("commits");
        let request = self
            .client
            .get(&url)
            .query(&[("sha", reference), ("path", path)]);
        let response = self.send("list commits", request)?;
        let data: Vec<RepoCommit> =
            Self::json("list commits", Self::check("list commits", response)?)?;
        Ok(data.into_iter().map(Into::into).collect())
    }

    fn read_file(&self, reference: &str, path: &str) -> GitApiResult<Vec<u8>> {
        let url = self.url(&format!("contents/{path}"));
        let request = self.client.get(&url).query(&[("ref", reference)]);
        let response = self.send("get contents", request)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GitApiError::PathNotFound(path.to_string()));
        }
        let data: FileContents =
            Self::json("get contents", Self::check("get contents", response)?)?;
        decode_content(&data.content).ok_or_else(|| GitApiError::Remote {
            op: "get contents",
            message: format!("undecodable content for {path:?}"),
        })
    }

    fn read_dir(&self, reference: &str, path: &str) -> GitApiResult<Vec<DirEntry>> {
        let url = self.url(&format!("contents/{path}"));
        let request = self.client.get(&url).query(&[("ref", reference)]);
        let response = self.send("get contents", request)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GitApiError::PathNotFound(path.to_string()));
        }
        let data: Vec<ContentsEntry> =
            Self::json("get contents", Self::check("get contents", response)?)?;
        Ok(data.into_iter().map(Into::into).collect())
    }
}

/// Decodes the base64 file content of a contents response, which GitHub
/// wraps with newlines.
fn decode_content(content: &str) -> Option<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact).ok()
}

// Wire types.

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitPerson {
    date: DateTime<Utc>,
}

/// A commit from the git-data API.
#[derive(Debug, Deserialize)]
struct GitCommit {
    sha: String,
    message: String,
    tree: ShaRef,
    #[serde(default)]
    parents: Vec<ShaRef>,
    committer: CommitPerson,
}

impl From<GitCommit> for CommitInfo {
    fn from(c: GitCommit) -> Self {
        Self {
            sha: c.sha,
            tree: c.tree.sha,
            message: c.message,
            parents: c.parents.into_iter().map(|p| p.sha).collect(),
            committer_date: c.committer.date,
        }
    }
}

/// A commit from the repository commit-list API, which nests the git
/// commit under `commit`.
#[derive(Debug, Deserialize)]
struct RepoCommit {
    sha: String,
    commit: RepoCommitDetail,
    #[serde(default)]
    parents: Vec<ShaRef>,
}

#[derive(Debug, Deserialize)]
struct RepoCommitDetail {
    message: String,
    tree: ShaRef,
    committer: CommitPerson,
}

impl From<RepoCommit> for CommitInfo {
    fn from(c: RepoCommit) -> Self {
        Self {
            sha: c.sha,
            tree: c.commit.tree.sha,
            message: c.commit.message,
            parents: c.parents.into_iter().map(|p| p.sha).collect(),
            committer_date: c.commit.committer.date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileContents {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<ContentsEntry> for DirEntry {
    fn from(e: ContentsEntry) -> Self {
        Self {
            kind: if e.kind == "dir" {
                EntryKind::Dir
            } else {
                EntryKind::File
            },
            name: e.name,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateTree<'a> {
    base_tree: &'a str,
    tree: Vec<WireTreeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct WireTreeEntry<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

#[derive(Debug, Serialize)]
struct MergeRequest<'a> {
    base: &'a str,
    head: &'a str,
}
