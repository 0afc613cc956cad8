//! Traversal-proof path construction.
//!
//! Storage paths are built from caller-supplied components (application
//! names in particular). Joining them naively would let a name like
//! `../../other` escape the base directory, so every component is
//! percent-escaped on its own before being joined.

/// The Git object APIs we target use `/` as the directory separator.
pub const SEPARATOR: &str = "/";

/// Joins `elem` onto `base`, percent-escaping each component.
///
/// Any separator character inside a component is encoded rather than
/// interpreted, so the result is always lexically under `base`. This
/// has no I/O and cannot fail.
#[must_use]
pub fn join(base: &str, elem: &[&str]) -> String {
    let mut parts = Vec::with_capacity(elem.len() + 1);
    parts.push(base.to_string());
    for e in elem {
        parts.push(urlencoding::encode(e).into_owned());
    }
    parts.join(SEPARATOR)
}
