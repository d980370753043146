//! Logical backups: per-table `INSERT` dumps plus a schema snapshot and a
//! hashed manifest.
//!
//! Layout of one backup:
//!
//! ```text
//! <backups_dir>/backup_20240102_030405_a1B2c3/
//!     manifest.json
//!     users.sql
//!     users.schema.json
//! ```

use crate::database::{SchemaIntrospector, TableSchema};
use crate::errors::{GuardError, GuardResult, IoResultExt};
use crate::observability::{set_current_table, set_phase, Phase};
use crate::transfer::DataExporter;
use chrono::{DateTime, TimeDelta, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBackup {
    pub row_count: u64,
    pub data_file: String,
    pub schema_file: String,
    /// SHA-256 of the data file, lowercase hex
    pub data_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_id: String,
    pub created_at: DateTime<Utc>,
    /// Driver and location of the database that was backed up
    pub database: String,
    pub tables: BTreeMap<String, TableBackup>,
}

impl BackupManifest {
    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|t| t.row_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    pub backup_id: String,
    pub path: PathBuf,
    pub manifest: BackupManifest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupCleanup {
    pub removed: Vec<String>,
    pub kept: usize,
    pub dry_run: bool,
}

pub struct BackupManager {
    backups_dir: PathBuf,
    dry_run: bool,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// `backup_<YYYYMMDD_HHMMSS>_<6 random alphanumerics>`
    pub fn generate_backup_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        format!("backup_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), suffix)
    }

    pub fn backup_path(&self, backup_id: &str) -> PathBuf {
        self.backups_dir.join(backup_id)
    }

    /// Dump every table the introspector lists, with its schema and hash.
    pub fn create_backup_with_metadata(
        &self,
        introspector: &dyn SchemaIntrospector,
        exporter: &DataExporter<'_>,
        database: &str,
    ) -> GuardResult<Backup> {
        let _phase = set_phase(Phase::Backup);
        let backup_id = Self::generate_backup_id();
        let path = self.backup_path(&backup_id);
        std::fs::create_dir_all(&path).with_path(&path)?;

        let mut tables = BTreeMap::new();
        for table in introspector.list_tables()? {
            let _table = set_current_table(&table);

            let data_file = format!("{table}.sql");
            let schema_file = format!("{table}.schema.json");
            let row_count = exporter.export_table(&table, &path.join(&data_file))?;

            let schema = introspector.table_schema(&table)?;
            let schema_path = path.join(&schema_file);
            std::fs::write(&schema_path, serde_json::to_vec_pretty(&schema)?)
                .with_path(&schema_path)?;

            let data_hash = hash_file(&path.join(&data_file))?;
            debug!(table = %table, rows = row_count, "Backed up table");
            tables.insert(
                table,
                TableBackup {
                    row_count,
                    data_file,
                    schema_file,
                    data_hash,
                },
            );
        }

        let manifest = BackupManifest {
            backup_id: backup_id.clone(),
            created_at: Utc::now(),
            database: database.to_string(),
            tables,
        };
        let manifest_path = path.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
            .with_path(&manifest_path)?;

        info!(
            backup_id = %backup_id,
            tables = manifest.tables.len(),
            rows = manifest.total_rows(),
            "Backup created"
        );
        Ok(Backup {
            backup_id,
            path,
            manifest,
        })
    }

    pub fn load_manifest(&self, backup_id: &str) -> GuardResult<BackupManifest> {
        let path = self.backup_path(backup_id);
        if !path.is_dir() {
            return Err(GuardError::BackupNotFound(backup_id.to_string()));
        }
        let manifest_path = path.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(GuardError::MissingManifest(manifest_path));
        }
        let content = std::fs::read_to_string(&manifest_path).with_path(&manifest_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Re-hash every data file and compare with the manifest.
    pub fn validate_backup(&self, backup_id: &str) -> GuardResult<BackupManifest> {
        let manifest = self.load_manifest(backup_id)?;
        let path = self.backup_path(backup_id);

        for (table, entry) in &manifest.tables {
            let actual = hash_file(&path.join(&entry.data_file))?;
            if actual != entry.data_hash {
                warn!(backup_id, table = %table, "Backup data file hash mismatch");
                return Err(GuardError::IntegrityMismatch {
                    table: table.clone(),
                    expected: entry.data_hash.clone(),
                    actual,
                });
            }
        }

        debug!(backup_id, tables = manifest.tables.len(), "Backup validated");
        Ok(manifest)
    }

    pub fn load_table_schema(&self, backup_id: &str, entry: &TableBackup) -> GuardResult<TableSchema> {
        let path = self.backup_path(backup_id).join(&entry.schema_file);
        let content = std::fs::read_to_string(&path).with_path(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn data_file(&self, backup_id: &str, entry: &TableBackup) -> PathBuf {
        self.backup_path(backup_id).join(&entry.data_file)
    }

    /// Manifests of every readable backup, newest first.
    pub fn list_backups(&self) -> GuardResult<Vec<BackupManifest>> {
        if !self.backups_dir.is_dir() {
            warn!(dir = %self.backups_dir.display(), "Backup directory does not exist");
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(&self.backups_dir).with_path(&self.backups_dir)? {
            let entry = entry.with_path(&self.backups_dir)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.path().is_dir() || !name.starts_with("backup_") {
                continue;
            }
            match self.load_manifest(&name) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!(backup_id = %name, error = %e, "Skipping unreadable backup"),
            }
        }
        manifests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(manifests)
    }

    /// Remove backups created more than `max_age_days` ago.
    pub fn cleanup_old_backups(&self, max_age_days: u32) -> GuardResult<BackupCleanup> {
        // An age beyond chrono's range means nothing is old enough to remove.
        let cutoff = TimeDelta::try_days(i64::from(max_age_days))
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let mut cleanup = BackupCleanup {
            dry_run: self.dry_run,
            ..Default::default()
        };

        for manifest in self.list_backups()? {
            if cutoff.is_none_or(|cutoff| manifest.created_at >= cutoff) {
                cleanup.kept += 1;
                continue;
            }
            let path = self.backup_path(&manifest.backup_id);
            if self.dry_run {
                warn!(backup_id = %manifest.backup_id, "Dry run: would remove old backup");
            } else {
                std::fs::remove_dir_all(&path).with_path(&path)?;
                info!(backup_id = %manifest.backup_id, "Removed old backup");
            }
            cleanup.removed.push(manifest.backup_id);
        }
        Ok(cleanup)
    }
}

pub fn hash_file(path: &Path) -> GuardResult<String> {
    let bytes = std::fs::read(path).with_path(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
