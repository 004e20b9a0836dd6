//! Path helpers shared by the classifier, the compilation database and the scanner.
//!
//! All qualified names derived from paths use `/` separators regardless of platform.

use std::path::{Component, Path, PathBuf};

/// String prefix test. A trailing `/` on either side is not special.
pub fn path_starts_with(prefix: &Path, path: &Path) -> bool {
    let prefix = prefix.to_string_lossy();
    let path = path.to_string_lossy();
    path.starts_with(prefix.as_ref())
}

/// The components of `path` left after the components it shares with `prefix`.
pub fn non_prefix_part(prefix: &Path, path: &Path) -> PathBuf {
    let mut prefix_components = prefix.components();
    let mut rest = PathBuf::new();
    let mut diverged = false;
    for component in path.components() {
        if !diverged {
            match prefix_components.next() {
                Some(p) if p == component => continue,
                _ => diverged = true,
            }
        }
        rest.push(component);
    }
    rest
}

/// Path relative to `prefix` when it lives below it, untouched otherwise.
pub fn normalise_path(path: &Path, prefix: &Path) -> PathBuf {
    if !prefix.as_os_str().is_empty() && path_starts_with(prefix, path) {
        return non_prefix_part(prefix, path);
    }
    path.to_path_buf()
}

/// Render a path with `/` separators.
pub fn generic_string(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn lexically_normal(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalise the longest existing ancestor of `path` and append the rest
/// lexically.
pub fn weakly_canonical(path: &Path) -> PathBuf {
    let normal = lexically_normal(path);
    if let Ok(canonical) = std::fs::canonicalize(&normal) {
        return canonical;
    }

    let mut missing = Vec::new();
    let mut existing = normal.as_path();
    while let Some(parent) = existing.parent() {
        if let Some(name) = existing.file_name() {
            missing.push(name.to_os_string());
        }
        existing = parent;
        if let Ok(mut canonical) = std::fs::canonicalize(existing) {
            for name in missing.iter().rev() {
                canonical.push(name);
            }
            return canonical;
        }
    }
    normal
}

/// Longest common directory of `paths`.
///
/// When the deepest shared directory has a three character name it is taken to
/// be a package group and its parent is returned instead, so a project holding
/// a single group still gets the group as a top-level directory.
pub fn common_parent(paths: &[PathBuf]) -> PathBuf {
    let Some((first, rest)) = paths.split_first() else {
        return PathBuf::new();
    };

    let mut old_prefix = PathBuf::new();
    let mut prefix = PathBuf::new();
    for component in first.components() {
        prefix.push(component);
        if !rest.iter().all(|p| path_starts_with(&prefix, p)) {
            let three_letters = old_prefix
                .file_name()
                .map(|n| n.to_string_lossy().chars().count() == 3)
                .unwrap_or(false);
            if three_letters {
                return old_prefix.parent().map(Path::to_path_buf).unwrap_or_default();
            }
            return old_prefix;
        }
        old_prefix = prefix.clone();
    }
    old_prefix
}

/// File name of `path` as an owned string, empty when there is none.
pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn file_stem_string(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension including the leading dot, or the empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
