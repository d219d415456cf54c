use crate::VfsError;

/// Normalize a VFS path.
///
/// - Replaces backslashes with forward slashes
/// - Collapses redundant separators (`a///b` → `a/b`)
/// - Drops `.` segments
/// - Rejects `..` segments (path traversal not allowed)
/// - Strips leading and trailing slashes
///
/// Returns `Err(VfsError::InvalidPath)` if the path is empty or contains `..`.
pub fn normalize(path: &str) -> Result<String, VfsError> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();

    for segment in replaced.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(VfsError::InvalidPath(
                "path traversal (..) not allowed".into(),
            ));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(VfsError::InvalidPath("empty path".into()));
    }

    Ok(segments.join("/"))
}

/// Join a source or directory with a relative path.
///
/// Either side may be empty. The result is not normalized.
pub fn join(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{rest}"),
    }
}

/// Split a normalized path into source name and remainder.
///
/// Returns `(source, rest)` where `source` is the first path segment
/// and `rest` is everything after it. If there is only one segment,
/// `rest` is empty.
///
/// The path must already be normalized (no leading slash, no `..`).
pub(crate) fn split_source(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (path, ""),
    }
}
