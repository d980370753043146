use super::core::SchemaGuardConfig;
use std::path::{Path, PathBuf};

/// Resolved project paths handed to every component at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub migrations: PathBuf,
    pub models: PathBuf,
    pub controllers: PathBuf,
    pub views: PathBuf,
    pub app: PathBuf,
    pub backups: PathBuf,
    pub jobs: PathBuf,
    pub database: PathBuf,
    pub ignore_patterns: Vec<String>,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>, config: &SchemaGuardConfig) -> Self {
        let root = root.into();
        let resolve = |p: &str| resolve_path(&root, p);
        Self {
            migrations: resolve(&config.paths.migrations),
            models: resolve(&config.paths.models),
            controllers: resolve(&config.paths.controllers),
            views: resolve(&config.paths.views),
            app: resolve(&config.paths.app),
            backups: resolve(&config.paths.backups),
            jobs: resolve(&config.paths.jobs),
            database: resolve(&config.database.path),
            ignore_patterns: config.get_ignore_patterns(),
            root,
        }
    }

    /// Path relative to the project root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

fn resolve_path(root: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
