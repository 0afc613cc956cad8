//! The configuration codec.
//!
//! Maps an [`App`] to the fixed set of files that represent it in
//! storage, and reconstructs an [`App`] by reading those files back
//! through a [`ContentFetcher`] bound to one reference.
//!
//! Per-application layout:
//! - `VERSION` — always present, literal `v<version>`
//! - `app.env` — env-file text, written only when an environment is set
//! - `image.txt` — canonical image reference, written only when set
//! - `services.json` — formation as indented JSON, written only when set

use gantry_core::{App, Formation, ImageRef, env};

use crate::api::{ContentFetcher, GitApiError, TreeEntry};
use crate::error::{StoreError, StoreResult};
use crate::path;

/// Version file name.
pub const FILE_VERSION: &str = "VERSION";
/// Environment file name.
pub const FILE_ENV: &str = "app.env";
/// Image reference file name.
pub const FILE_IMAGE: &str = "image.txt";
/// Formation file name.
pub const FILE_SERVICES: &str = "services.json";

/// Builds the tree entries that persist `app` under `base_path`.
///
/// Serialization failures abort here, before any remote call is made.
pub(crate) fn tree_entries(base_path: &str, app: &App) -> StoreResult<Vec<TreeEntry>> {
    let mut entries = vec![TreeEntry::blob(
        path::join(base_path, &[&app.name, FILE_VERSION]),
        format!("v{}", app.version),
    )];

    if let Some(environment) = &app.environment {
        let content = env::write(environment).map_err(|e| StoreError::Encode(e.to_string()))?;
        entries.push(TreeEntry::blob(
            path::join(base_path, &[&app.name, FILE_ENV]),
            content,
        ));
    }

    if let Some(image) = &app.image {
        entries.push(TreeEntry::blob(
            path::join(base_path, &[&app.name, FILE_IMAGE]),
            image.to_string(),
        ));
    }

    if let Some(formation) = &app.formation {
        let content = serde_json::to_string_pretty(formation)
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        entries.push(TreeEntry::blob(
            path::join(base_path, &[&app.name, FILE_SERVICES]),
            content,
        ));
    }

    Ok(entries)
}

/// Reconstructs the application named `name` through `fetcher`.
///
/// `VERSION` is required. The other files default the corresponding
/// field to `None` when absent; malformed content is always fatal, and
/// never yields a partially populated app.
pub(crate) fn load_app<F: ContentFetcher>(fetcher: &F, name: &str) -> StoreResult<App> {
    let mut app = App::new(name);

    let version = required_file(fetcher, name, FILE_VERSION)?;
    let version = text(&version, name, FILE_VERSION)?;
    app.version = parse_version(version.trim())
        .ok_or_else(|| decode_error(name, FILE_VERSION, format!("bad version {version:?}")))?;

    if let Some(raw) = optional_file(fetcher, name, FILE_SERVICES)? {
        let formation: Formation = serde_json::from_slice(&raw)
            .map_err(|e| decode_error(name, FILE_SERVICES, e.to_string()))?;
        app.formation = Some(formation);
    }

    if let Some(raw) = optional_file(fetcher, name, FILE_IMAGE)? {
        let image: ImageRef = text(&raw, name, FILE_IMAGE)?
            .trim()
            .parse()
            .map_err(|e: gantry_core::ImageError| decode_error(name, FILE_IMAGE, e.to_string()))?;
        app.image = Some(image);
    }

    if let Some(raw) = optional_file(fetcher, name, FILE_ENV)? {
        let environment = env::read(text(&raw, name, FILE_ENV)?)
            .map_err(|e| decode_error(name, FILE_ENV, e.to_string()))?;
        app.environment = Some(environment);
    }

    Ok(app)
}

/// Parses the `v<N>` version-file content.
fn parse_version(content: &str) -> Option<u32> {
    content.strip_prefix('v')?.parse().ok()
}

fn required_file<F: ContentFetcher>(fetcher: &F, name: &str, file: &str) -> StoreResult<Vec<u8>> {
    match fetcher.read(&[name, file]) {
        Ok(raw) => Ok(raw),
        Err(GitApiError::PathNotFound(_)) => {
            Err(decode_error(name, file, "file missing".to_string()))
        }
        Err(e) => Err(StoreError::Api(e)),
    }
}

fn optional_file<F: ContentFetcher>(
    fetcher: &F,
    name: &str,
    file: &str,
) -> StoreResult<Option<Vec<u8>>> {
    match fetcher.read(&[name, file]) {
        Ok(raw) => Ok(Some(raw)),
        Err(GitApiError::PathNotFound(_)) => Ok(None),
        Err(e) => Err(StoreError::Api(e)),
    }
}

fn text<'a>(raw: &'a [u8], name: &str, file: &str) -> StoreResult<&'a str> {
    std::str::from_utf8(raw).map_err(|_| decode_error(name, file, "not valid UTF-8".to_string()))
}

fn decode_error(name: &str, file: &str, reason: String) -> StoreError {
    StoreError::Decode {
        path: format!("{name}/{file}"),
        reason,
    }
}
