use std::fmt;

/// Separator between the type discriminator and the raw path in a [`DocId`].
const ID_SEPARATOR: char = '_';

/// Path delimiter used by the watcher and by the hierarchical index key.
pub const PATH_DELIMITER: char = '/';

/// Stable document identifier for one filesystem entry.
///
/// Derived purely from `(full_path, is_dir)`, so every replica computes the same
/// identifier for the same entity regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(String);

impl DocId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the document identifier for a path and type flag.
///
/// The same path yields different identifiers for a file and a directory.
pub fn identify(full_path: &str, is_dir: bool) -> DocId {
    let discriminator = if is_dir { "dir" } else { "file" };
    DocId(format!("{discriminator}{ID_SEPARATOR}{full_path}"))
}

/// Split a path into its hierarchical index key.
///
/// Empty segments (the leading one of an absolute path, a trailing slash, doubled
/// slashes) are dropped, so `/a/b`, `/a/b/` and `a/b` all map to `["a", "b"]`.
pub fn index_key(full_path: &str) -> Vec<&str> {
    full_path
        .split(PATH_DELIMITER)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// True when `candidate` equals `prefix` or lies beneath it, segment-wise.
///
/// `/a/bc` is not beneath `/a/b`: segments must match whole.
pub fn is_within(candidate: &str, prefix: &str) -> bool {
    let candidate = index_key(candidate);
    let prefix = index_key(prefix);
    candidate.starts_with(&prefix)
}

/// Render an index key back into the absolute form stored in the path hierarchy field.
pub fn key_to_path(key: &[&str]) -> String {
    let mut path = String::with_capacity(key.iter().map(|s| s.len() + 1).sum());
    for segment in key {
        path.push(PATH_DELIMITER);
        path.push_str(segment);
    }
    if path.is_empty() {
        path.push(PATH_DELIMITER);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_is_deterministic() {
        let a = identify("/watch/2019/report.pdf", false);
        let b = identify("/watch/2019/report.pdf", false);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "file_/watch/2019/report.pdf");
    }

    #[test]
    fn test_identify_distinguishes_type() {
        let file = identify("/watch/2019", false);
        let dir = identify("/watch/2019", true);
        assert_ne!(file, dir);
        assert_eq!(dir.as_str(), "dir_/watch/2019");
    }

    #[test]
    fn test_index_key_drops_empty_segments() {
        assert_eq!(index_key("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(index_key("/a/b/"), vec!["a", "b"]);
        assert_eq!(index_key("a//b"), vec!["a", "b"]);
        assert!(index_key("/").is_empty());
    }

    #[test]
    fn test_is_within_matches_whole_segments() {
        assert!(is_within("/a/b", "/a/b"));
        assert!(is_within("/a/b/c", "/a/b"));
        assert!(!is_within("/a/bc", "/a/b"));
        assert!(!is_within("/a", "/a/b"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_key_to_path() {
        assert_eq!(key_to_path(&["a", "b"]), "/a/b");
        assert_eq!(key_to_path(&[]), "/");
    }
}
