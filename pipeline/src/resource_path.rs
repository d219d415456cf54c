//! Helpers for `/`-delimited resource names.
//!
//! Resource names are relative to the data directory, e.g.
//! `Models/Hero.gltf`. A *scope* is a directory prefix with a trailing slash
//! (`Models/`), or the empty string for the whole tree.

/// Whether `resource_name` lies under `path`.
///
/// `path` may be a scope (`Models/`), a directory or file name without a
/// trailing slash (`Models`, `Models/Hero.gltf`), or empty. Matching respects
/// segment boundaries, so `Models` does not contain `Models2/a.png`.
pub fn is_under(resource_name: &str, path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    if path.ends_with('/') {
        return resource_name.starts_with(path);
    }
    match resource_name.strip_prefix(path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The scope of the directory containing `resource_name`.
///
/// `Models/AssetPipeline.json` → `Models/`, `AssetPipeline.json` → ``.
pub fn scope_of(resource_name: &str) -> &str {
    match resource_name.rfind('/') {
        Some(pos) => &resource_name[..=pos],
        None => "",
    }
}

/// Normalize a scope so it is empty or ends with `/`.
pub fn to_scope(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// File name part of a resource name.
pub fn file_name(resource_name: &str) -> &str {
    match resource_name.rfind('/') {
        Some(pos) => &resource_name[pos + 1..],
        None => resource_name,
    }
}

/// Every ancestor directory of `resource_name`, shallowest first.
///
/// `a/b/c.txt` → `["a", "a/b"]`.
pub fn ancestor_dirs(resource_name: &str) -> impl Iterator<Item = &str> {
    resource_name
        .match_indices('/')
        .map(move |(pos, _)| &resource_name[..pos])
}

/// Case-insensitive wildcard match of a file name against a pattern.
///
/// `*` matches any run of characters, `?` a single character.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
