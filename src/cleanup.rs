//! Removal of redundant migrations.
//!
//! Two migration files are redundant when they share the name that follows
//! the `YYYY_MM_DD_HHMMSS_` prefix. The most recent file of each group is
//! kept; the others are copied to `<backups>/migrations_<timestamp>/` before
//! they are deleted.

use crate::errors::{GuardResult, IoResultExt};
use crate::observability::{set_current_file, set_phase, Phase};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static TIMESTAMP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}_\d{2}_\d{2}_\d{6}_(.+)\.php$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedundantGroup {
    /// Migration name without its timestamp prefix
    pub name: String,
    pub kept: PathBuf,
    pub redundant: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub groups: Vec<RedundantGroup>,
    pub removed: Vec<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub dry_run: bool,
}

pub struct MigrationCleaner {
    migrations_dir: PathBuf,
    backups_dir: PathBuf,
    dry_run: bool,
}

impl MigrationCleaner {
    pub fn new(migrations_dir: impl Into<PathBuf>, backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            backups_dir: backups_dir.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Groups of migrations sharing a name, in name order.
    pub fn find_redundant(&self) -> GuardResult<Vec<RedundantGroup>> {
        if !self.migrations_dir.is_dir() {
            warn!(dir = %self.migrations_dir.display(), "Migrations directory does not exist");
            return Ok(Vec::new());
        }

        let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for entry in std::fs::read_dir(&self.migrations_dir).with_path(&self.migrations_dir)? {
            let path = entry.with_path(&self.migrations_dir)?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(caps) = TIMESTAMP_PREFIX.captures(file_name) {
                by_name.entry(caps[1].to_string()).or_default().push(path.clone());
            }
        }

        Ok(by_name
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .filter_map(|(name, mut files)| {
                // The timestamp prefix sorts chronologically.
                files.sort();
                let kept = files.pop()?;
                Some(RedundantGroup {
                    name,
                    kept,
                    redundant: files,
                })
            })
            .collect())
    }

    /// Back up and delete every redundant migration. In dry-run nothing is
    /// copied or deleted; the report lists what would be removed.
    pub fn cleanup(&self) -> GuardResult<CleanupReport> {
        let _phase = set_phase(Phase::Cleanup);
        let groups = self.find_redundant()?;
        let mut report = CleanupReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        let doomed: Vec<PathBuf> = groups.iter().flat_map(|g| g.redundant.clone()).collect();
        if doomed.is_empty() {
            report.groups = groups;
            return Ok(report);
        }

        if self.dry_run {
            for path in &doomed {
                warn!(file = %path.display(), "Dry run: would remove redundant migration");
            }
            report.groups = groups;
            return Ok(report);
        }

        let backup_dir = self
            .backups_dir
            .join(format!("migrations_{}", Utc::now().format("%Y%m%d_%H%M%S")));
        std::fs::create_dir_all(&backup_dir).with_path(&backup_dir)?;

        for path in doomed {
            let _file = set_current_file(path.clone());
            copy_into(&path, &backup_dir)?;
            std::fs::remove_file(&path).with_path(&path)?;
            info!(file = %path.display(), "Removed redundant migration");
            report.removed.push(path);
        }

        report.groups = groups;
        report.backup_dir = Some(backup_dir);
        Ok(report)
    }
}

fn copy_into(path: &Path, dir: &Path) -> GuardResult<()> {
    let Some(name) = path.file_name() else {
        return Ok(());
    };
    let target = dir.join(name);
    std::fs::copy(path, &target).with_path(&target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let migrations = dir.path().join("migrations");
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&migrations).unwrap();
        for name in [
            "2024_01_01_000000_create_users_table.php",
            "2024_03_01_000000_create_users_table.php",
            "2024_02_01_000000_create_posts_table.php",
            "notes.txt",
        ] {
            std::fs::write(migrations.join(name), name).unwrap();
        }
        (dir, migrations, backups)
    }

    #[test]
    fn test_keeps_the_latest_of_each_group() {
        let (_dir, migrations, backups) = setup();
        let groups = MigrationCleaner::new(&migrations, &backups)
            .find_redundant()
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "create_users_table");
        assert_eq!(
            groups[0].kept,
            migrations.join("2024_03_01_000000_create_users_table.php")
        );
        assert_eq!(
            groups[0].redundant,
            vec![migrations.join("2024_01_01_000000_create_users_table.php")]
        );
    }

    #[test]
    fn test_cleanup_backs_up_before_deleting() {
        let (_dir, migrations, backups) = setup();
        let report = MigrationCleaner::new(&migrations, &backups).cleanup().unwrap();

        let old = migrations.join("2024_01_01_000000_create_users_table.php");
        assert_eq!(report.removed, vec![old.clone()]);
        assert!(!old.exists());

        let backup_dir = report.backup_dir.unwrap();
        assert!(backup_dir.starts_with(&backups));
        assert!(backup_dir
            .join("2024_01_01_000000_create_users_table.php")
            .is_file());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (_dir, migrations, backups) = setup();
        let report = MigrationCleaner::new(&migrations, &backups)
            .with_dry_run(true)
            .cleanup()
            .unwrap();

        assert!(report.dry_run);
        assert!(report.removed.is_empty());
        assert_eq!(report.groups.len(), 1);
        assert_eq!(std::fs::read_dir(&migrations).unwrap().count(), 4);
        assert!(!backups.exists());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let cleaner = MigrationCleaner::new("/no/such/migrations", "/tmp");
        assert!(cleaner.find_redundant().unwrap().is_empty());
    }
}
