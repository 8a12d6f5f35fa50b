//! Node path manipulation.
//!
//! Paths are slash-delimited and absolute (`/a/b/c`). None of these helpers
//! fail loudly: malformed input yields `None`.

use uuid::Uuid;

/// Path separator.
pub const SEPARATOR: char = '/';

/// The root of the namespace.
pub const ROOT: &str = "/";

/// Marker that precedes the correlation id in protected node names.
pub const PROTECTED_PREFIX: &str = "_c_";

/// Width of the counter the store appends to sequential node names.
pub const SEQUENTIAL_SUFFIX_LENGTH: usize = 10;

/// Returns the parent of `path`, or `None` for the root and malformed paths.
pub fn parent(path: &str) -> Option<&str> {
    if !path.starts_with(SEPARATOR) || path == ROOT {
        return None;
    }

    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR)? {
        0 => Some(ROOT),
        index => Some(&trimmed[..index]),
    }
}

/// Returns the last segment of `path`, or `None` for the root and malformed paths.
pub fn leaf_name(path: &str) -> Option<&str> {
    if !path.starts_with(SEPARATOR) {
        return None;
    }

    let trimmed = path.trim_end_matches(SEPARATOR);
    let index = trimmed.rfind(SEPARATOR)?;
    let name = &trimmed[index + 1..];
    (!name.is_empty()).then_some(name)
}

/// Parses the zero-padded counter the store appends to sequential nodes.
///
/// Accepts either a bare name or a full path.
pub fn sequential_index(name: &str) -> Option<u64> {
    let name = name.rsplit(SEPARATOR).next()?;
    if name.len() < SEQUENTIAL_SUFFIX_LENGTH {
        return None;
    }

    let suffix = name.get(name.len() - SEQUENTIAL_SUFFIX_LENGTH..)?;
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    suffix.parse().ok()
}

/// Joins a parent path and a child name.
pub fn combine(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    let child = child.trim_start_matches(SEPARATOR);
    format!("{parent}{SEPARATOR}{child}")
}

/// Builds a protected node name: `_c_<correlation id>-<base name>`.
pub fn build_protected_name(correlation_id: Uuid, base_name: &str) -> String {
    format!("{PROTECTED_PREFIX}{}-{base_name}", correlation_id.hyphenated())
}

/// Rewrites `path` so that its leaf embeds `correlation_id`.
///
/// `/locks/a/lock` becomes `/locks/a/_c_<correlation id>-lock`.
pub fn build_protected_path(path: &str, correlation_id: Uuid) -> Option<String> {
    let parent = parent(path)?;
    let name = leaf_name(path)?;
    Some(combine(parent, &build_protected_name(correlation_id, name)))
}

/// Returns `true` for an absolute path without empty segments.
pub fn is_valid(path: &str) -> bool {
    if path == ROOT {
        return true;
    }

    path.starts_with(SEPARATOR)
        && !path.ends_with(SEPARATOR)
        && path[1..].split(SEPARATOR).all(|segment| !segment.is_empty())
}
