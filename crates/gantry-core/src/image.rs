//! Container image references.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing an image reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    /// Empty input.
    #[error("empty image reference")]
    Empty,

    /// A component of the reference is empty, e.g. `repo:` or `/repo`.
    #[error("invalid image reference: {0:?}")]
    Invalid(String),
}

/// A reference to a container image: `[registry/]repository[:tag]`.
///
/// The canonical string form produced by [`fmt::Display`] is what the
/// storage layer writes to `image.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host, when not the default registry.
    pub registry: Option<String>,
    /// Repository name, e.g. `remind101/acme-inc`.
    pub repository: String,
    /// Tag, when pinned to one.
    pub tag: Option<String>,
}

impl FromStr for ImageRef {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ImageError::Empty);
        }

        // A leading component with a "." or ":" (port) is a registry
        // host; otherwise the whole prefix belongs to the repository.
        let (registry, rest) = match s.split_once('/') {
            Some((first, rest)) if first.contains('.') || first.contains(':') => {
                (Some(first.to_string()), rest)
            }
            _ => (None, s),
        };

        let (repository, tag) = match rest.rsplit_once(':') {
            Some((repo, tag)) => (repo.to_string(), Some(tag.to_string())),
            None => (rest.to_string(), None),
        };

        if repository.is_empty()
            || registry.as_deref() == Some("")
            || tag.as_deref() == Some("")
        {
            return Err(ImageError::Invalid(s.to_string()));
        }

        Ok(Self {
            registry,
            repository,
            tag,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        Ok(())
    }
}
