use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Gitignore-style filter applied to every file the compilation database names.
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, patterns: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // Project-level ignore file, if any
        builder.add(root.join(".lakosignore"));

        for pattern in patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Invalid ignore pattern {}: {}", pattern, e);
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    /// A filter that ignores nothing.
    pub fn empty() -> Self {
        Self {
            inner: Gitignore::empty(),
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.inner.is_empty() {
            return false;
        }
        if path.starts_with(self.inner.path()) {
            return self
                .inner
                .matched_path_or_any_parents(path, false)
                .is_ignore();
        }
        self.inner.matched(path, false).is_ignore()
    }
}
