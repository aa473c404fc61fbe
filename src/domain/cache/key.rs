//! Cache key namespacing and the not-found placeholder

use std::fmt::Display;

/// Value stored under a key whose record the store confirmed absent
///
/// A bare `*` is never valid JSON, so it cannot collide with a serialized record.
pub const PLACEHOLDER: &str = "*";

/// Builds a namespaced cache key of the form `<prefix><id>`
///
/// The prefix carries its own trailing delimiter (`"mob:"`).
pub fn namespaced_key(prefix: &str, id: &impl Display) -> String {
    format!("{}{}", prefix, id)
}

/// Returns true when a raw cache value is the placeholder sentinel
pub fn is_placeholder_value(value: &str) -> bool {
    value == PLACEHOLDER
}
