//! Resource path helpers.
//!
//! Resource paths are `/`-separated, relative to the store root, with no
//! leading or trailing separator. The root itself is the empty string.

/// Normalize a resource path.
///
/// Backslashes become `/`, empty and `.` segments are dropped.
///
/// ```rust
/// use cluster_notify::core::paths::normalize;
///
/// assert_eq!(normalize("/styles//foo.sld/"), "styles/foo.sld");
/// assert_eq!(normalize("workspaces\\topp"), "workspaces/topp");
/// ```
pub fn normalize(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent of a normalized path, `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(idx) => Some(&path[..idx]),
        None => Some(""),
    }
}

/// Ancestors of a normalized path, nearest first, ending with the root.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = path;
    while let Some(p) = parent(current) {
        out.push(p);
        current = p;
    }
    out
}

/// Whether `child` lies strictly below `ancestor`.
pub fn is_descendant(child: &str, ancestor: &str) -> bool {
    if child == ancestor {
        return false;
    }
    if ancestor.is_empty() {
        return !child.is_empty();
    }
    child
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}
