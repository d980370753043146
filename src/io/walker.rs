use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Collects project files by suffix, honouring `.gitignore` and configured
/// glob exclusions.
pub struct FileWalker {
    root: PathBuf,
    suffixes: Vec<String>,
    ignore_patterns: Vec<glob::Pattern>,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            suffixes: vec![".php".to_string()],
            ignore_patterns: Vec::new(),
        }
    }

    /// File-name suffixes to keep, e.g. `.php` or `.blade.php`.
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.ignore_patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Ignoring invalid ignore pattern");
                    None
                }
            })
            .collect();
        self
    }

    /// Matching files, sorted. A missing root yields no files.
    pub fn walk(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            warn!(dir = %self.root.display(), "Directory does not exist, nothing to scan");
            return Vec::new();
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|path| path.is_file() && self.should_process(path))
            .collect();
        files.sort();
        files
    }

    fn should_process(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if !self.suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }

        let path_str = path.to_string_lossy();
        !self.ignore_patterns.iter().any(|p| p.matches(&path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_by_suffix_and_ignore_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("views/admin")).unwrap();
        std::fs::create_dir_all(root.join("vendor")).unwrap();
        std::fs::write(root.join("views/home.blade.php"), "").unwrap();
        std::fs::write(root.join("views/admin/panel.blade.php"), "").unwrap();
        std::fs::write(root.join("views/helper.php"), "").unwrap();
        std::fs::write(root.join("vendor/lib.blade.php"), "").unwrap();

        let files = FileWalker::new(root)
            .with_suffixes([".blade.php"])
            .with_ignore_patterns(&["**/vendor/**".to_string()])
            .walk();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["views/admin/panel.blade.php", "views/home.blade.php"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        assert!(FileWalker::new("/no/such/dir").walk().is_empty());
    }
}
