//! Scope comparison
//!
//! The provider reports the scope it actually granted. It collapses implied
//! scopes, so `write_products` comes back without `read_products` even if both
//! were requested. Both sides are normalized before comparing.

use std::collections::BTreeSet;

const WRITE_PREFIX: &str = "write_";
const READ_PREFIX: &str = "read_";
const UNAUTHENTICATED_WRITE_PREFIX: &str = "unauthenticated_write_";
const UNAUTHENTICATED_READ_PREFIX: &str = "unauthenticated_read_";

/// Split a comma separated scope and add the scopes each entry implies
#[must_use]
pub fn normalize_scope(scope: &str) -> BTreeSet<String> {
    let mut normalized = BTreeSet::new();

    for entry in scope.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(resource) = entry.strip_prefix(UNAUTHENTICATED_WRITE_PREFIX) {
            normalized.insert(format!("{UNAUTHENTICATED_READ_PREFIX}{resource}"));
        } else if let Some(resource) = entry.strip_prefix(WRITE_PREFIX) {
            normalized.insert(format!("{READ_PREFIX}{resource}"));
        }
        normalized.insert(entry.to_string());
    }

    normalized
}

/// Whether the granted scope covers exactly what was requested
#[must_use]
pub fn scopes_match(requested: &str, granted: &str) -> bool {
    normalize_scope(requested) == normalize_scope(granted)
}
