//! CLI command implementations for schemaguard operations.
//!
//! Available commands:
//! - **check**: Run the project checkers, optionally applying fixes
//! - **migrations**: Classify migrations by rerun risk
//! - **backup**: Create, validate, list and prune database backups
//! - **strategy / execute / rollback**: The data-mapping workflow
//! - **export / import**: Bulk data transfer as INSERT statements
//! - **cleanup-migrations**: Remove redundant migrations
//! - **job**: Run a check pass as a pollable job
//! - **init**: Initialize a new schemaguard configuration file

pub mod backup;
pub mod check;
pub mod cleanup;
pub mod init;
pub mod jobs;
pub mod mapping;
pub mod migrations;
pub mod transfer;

pub use check::{handle_check, CheckConfig};
pub use init::init_config;
pub use migrations::{analyze_migrations, handle_migrations};

use crate::config::{self, ProjectLayout, SchemaGuardConfig};
use crate::mapping::BackupManager;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Everything a command needs from the global flags, resolved once.
pub struct CommandContext {
    pub project: PathBuf,
    pub config: SchemaGuardConfig,
    pub layout: ProjectLayout,
    pub dry_run: bool,
}

impl CommandContext {
    pub fn new(project: PathBuf, config_path: Option<&Path>, dry_run: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => config::load_config_from_path_result(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => config::load_config_from(&project),
        };
        Ok(Self::with_config(project, config, dry_run))
    }

    pub fn with_config(project: PathBuf, config: SchemaGuardConfig, dry_run: bool) -> Self {
        let layout = ProjectLayout::new(&project, &config);
        Self {
            project,
            config,
            layout,
            dry_run,
        }
    }

    pub fn open_database(&self) -> Result<Connection> {
        crate::database::open_connection(&self.config.database, &self.layout.database)
            .with_context(|| format!("Failed to open database {}", self.layout.database.display()))
    }

    /// `driver:path` label recorded in backup manifests.
    pub fn database_label(&self) -> String {
        format!(
            "{}:{}",
            self.config.database.driver,
            self.layout.database.display()
        )
    }

    pub fn backup_manager(&self) -> BackupManager {
        BackupManager::new(&self.layout.backups).with_dry_run(self.dry_run)
    }
}

/// Pretty JSON to `output`, or stdout when absent.
pub(crate) fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
