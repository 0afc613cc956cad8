//! Adapter configuration.

use thiserror::Error;

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is empty.
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    /// The HTTP client could not be built from these settings.
    #[error("building HTTP client: {0}")]
    Client(String),
}

/// Settings for the GitHub adapter.
///
/// Validated when the client is constructed, so a misconfigured process
/// fails at startup rather than on first use.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API endpoint; override for GitHub Enterprise.
    pub api_url: String,
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Access token with `repo` scope.
    pub token: String,
}

impl GitHubConfig {
    /// Creates a configuration against the public GitHub API.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    /// Overrides the API endpoint.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Checks that every required setting is present.
    ///
    /// # Errors
    ///
    /// Returns the first missing setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(ConfigError::MissingSetting("api_url"));
        }
        if self.owner.is_empty() {
            return Err(ConfigError::MissingSetting("owner"));
        }
        if self.repo.is_empty() {
            return Err(ConfigError::MissingSetting("repo"));
        }
        if self.token.is_empty() {
            return Err(ConfigError::MissingSetting("token"));
        }
        Ok(())
    }
}
