//! Directory walking for document discovery.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// File extensions to include (e.g., ["md", "markdown"]). Empty means all.
    pub file_extensions: Vec<String>,
    /// Maximum depth to traverse. None means unlimited.
    pub max_depth: Option<usize>,
    /// Skip dot-directories such as `.git` and the backup directory.
    pub skip_hidden: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            file_extensions: Vec::new(),
            max_depth: None,
            skip_hidden: true,
        }
    }
}

impl WalkConfig {
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.file_extensions = extensions
            .iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Walks a documentation tree in a stable (sorted) order.
pub struct DocumentWalker {
    config: WalkConfig,
}

impl DocumentWalker {
    pub fn new(config: WalkConfig) -> Self {
        Self { config }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        if self.config.file_extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.config
                    .file_extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
    }

    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut walker = WalkDir::new(root)
            // Symlinked documents are never scanned or rewritten.
            .follow_links(false)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let skip_hidden = self.config.skip_hidden;
        walker
            .into_iter()
            .filter_entry(|e| !(skip_hidden && Self::is_hidden(e)))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches_extension(e.path()))
            .map(|e| e.into_path())
            .collect()
    }
}
