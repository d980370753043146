//! Runs a [`MappingStrategy`] against the live database.
//!
//! The steps always run in the same order and the first failure stops the
//! run. Every step is dry-run aware: DDL is only described, the import
//! transaction is rolled back, and post-import validation is skipped.

use super::backup::{BackupManager, BackupManifest};
use super::strategy::{MappingStrategy, TransformationAction};
use crate::criticality::RerunRisk;
use crate::database::{Dialect, SchemaIntrospector, SqliteIntrospector};
use crate::errors::{GuardError, GuardResult};
use crate::observability::{set_phase, set_current_table, Phase};
use crate::transfer::{DataImporter, ImportOptions, ImportSummary, TableImport};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStep {
    ValidateBackupIntegrity,
    ApplySchema,
    ApplyTransformations,
    ImportBackupData,
    ValidateDataIntegrity,
}

impl ExecutionStep {
    pub const ALL: [ExecutionStep; 5] = [
        ExecutionStep::ValidateBackupIntegrity,
        ExecutionStep::ApplySchema,
        ExecutionStep::ApplyTransformations,
        ExecutionStep::ImportBackupData,
        ExecutionStep::ValidateDataIntegrity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStep::ValidateBackupIntegrity => "validate_backup_integrity",
            ExecutionStep::ApplySchema => "apply_schema",
            ExecutionStep::ApplyTransformations => "apply_transformations",
            ExecutionStep::ImportBackupData => "import_backup_data",
            ExecutionStep::ValidateDataIntegrity => "validate_data_integrity",
        }
    }
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub steps_completed: Vec<ExecutionStep>,
    pub steps_skipped: Vec<ExecutionStep>,
    pub errors: Vec<String>,
    pub rollback_available: bool,
    pub dry_run: bool,
    /// Human-readable account of what was done, or would be done in dry-run
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackResult {
    pub backup_id: String,
    pub tables_restored: Vec<String>,
    pub tables_created: Vec<String>,
    pub rows_restored: u64,
    pub committed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub chunk_size: usize,
    pub dry_run: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            chunk_size: ImportOptions::default().chunk_size,
            dry_run: false,
        }
    }
}

#[derive(Default)]
struct RunState {
    manifest: Option<BackupManifest>,
    restore_tables: BTreeSet<String>,
}

pub struct MappingExecutor<'c> {
    conn: &'c Connection,
    backups: BackupManager,
    options: ExecutorOptions,
}

impl<'c> MappingExecutor<'c> {
    pub fn new(conn: &'c Connection, backups: BackupManager, options: ExecutorOptions) -> Self {
        Self {
            conn,
            backups,
            options,
        }
    }

    fn introspector(&self) -> SqliteIntrospector<'c> {
        SqliteIntrospector::new(self.conn)
    }

    pub fn execute_data_mapping(&self, strategy: &MappingStrategy) -> ExecutionResult {
        let _phase = set_phase(Phase::DataMapping);
        let mut result = ExecutionResult {
            dry_run: self.options.dry_run,
            ..Default::default()
        };
        let mut state = RunState::default();

        for step in ExecutionStep::ALL {
            let outcome = match step {
                ExecutionStep::ValidateBackupIntegrity => {
                    self.validate_backup_integrity(strategy, &mut state, &mut result)
                }
                ExecutionStep::ApplySchema => self.apply_schema(strategy, &state, &mut result),
                ExecutionStep::ApplyTransformations => {
                    self.apply_transformations(strategy, &mut state, &mut result)
                }
                ExecutionStep::ImportBackupData => {
                    self.import_backup_data(strategy, &state, &mut result)
                }
                ExecutionStep::ValidateDataIntegrity => {
                    if self.options.dry_run {
                        result.steps_skipped.push(step);
                        result
                            .actions
                            .push("Dry run: post-import validation skipped".to_string());
                        continue;
                    }
                    self.validate_data_integrity(&state, &mut result)
                }
            };

            match outcome {
                Ok(()) => result.steps_completed.push(step),
                Err(e) => {
                    warn!(step = %step, error = %e, "Data mapping step failed");
                    result.errors.push(format!("{step}: {e}"));
                    break;
                }
            }
        }

        result.success = result.errors.is_empty();
        result.rollback_available = result.success;
        info!(
            success = result.success,
            steps = result.steps_completed.len(),
            dry_run = self.options.dry_run,
            "Data mapping finished"
        );
        result
    }

    fn validate_backup_integrity(
        &self,
        strategy: &MappingStrategy,
        state: &mut RunState,
        result: &mut ExecutionResult,
    ) -> GuardResult<()> {
        let manifest = match self.backups.validate_backup(&strategy.backup_id) {
            Ok(manifest) => manifest,
            Err(e) if strategy.risk_assessment.overall_risk == RerunRisk::Extreme => {
                return Err(GuardError::Refused(format!(
                    "EXTREME-risk strategy requires a validated backup ({e})"
                )));
            }
            Err(e) => return Err(e),
        };
        result.actions.push(format!(
            "Validated backup {} ({} tables)",
            manifest.backup_id,
            manifest.tables.len()
        ));
        state.manifest = Some(manifest);
        Ok(())
    }

    fn apply_schema(
        &self,
        strategy: &MappingStrategy,
        state: &RunState,
        result: &mut ExecutionResult,
    ) -> GuardResult<()> {
        let Some(manifest) = state.manifest.as_ref() else {
            return Ok(());
        };

        let introspector = self.introspector();
        for (table, entry) in &manifest.tables {
            if introspector.table_exists(table)? {
                continue;
            }
            let _table = set_current_table(table);
            let schema = self.backups.load_table_schema(&manifest.backup_id, entry)?;
            let Some(create) = schema.create_statement else {
                warn!(table = %table, "No stored create statement, table not recreated");
                result
                    .actions
                    .push(format!("Cannot recreate table {table}: no create statement"));
                continue;
            };

            if self.options.dry_run {
                result.actions.push(format!("Would create table {table}"));
                continue;
            }
            self.conn.execute_batch(&create)?;
            for index in schema.indexes.iter().filter_map(|i| i.create_statement.as_ref()) {
                self.conn.execute_batch(index)?;
            }
            result.actions.push(format!("Created table {table}"));
        }
        Ok(())
    }

    fn apply_transformations(
        &self,
        strategy: &MappingStrategy,
        state: &mut RunState,
        result: &mut ExecutionResult,
    ) -> GuardResult<()> {
        let introspector = self.introspector();

        for transformation in &strategy.data_transformations {
            let Some(table) = transformation.table.as_deref() else {
                continue;
            };
            let _table = set_current_table(table);

            match transformation.action {
                TransformationAction::AddIndexes => {
                    let Some(column) = transformation.column.as_deref() else {
                        continue;
                    };
                    let has_column = introspector.table_exists(table)?
                        && introspector.columns(table)?.iter().any(|c| c.name == column);
                    if !has_column {
                        warn!(table, column, "Index target missing, skipping");
                        continue;
                    }
                    let name = format!("idx_{table}_{column}");
                    if self.options.dry_run {
                        result.actions.push(format!("Would create index {name}"));
                        continue;
                    }
                    let sql =
                        Dialect::Sqlite.create_index_statement(&name, table, &[column.to_string()]);
                    self.conn.execute_batch(&sql)?;
                    result.actions.push(format!("Created index {name}"));
                }
                TransformationAction::ValidateReferences => {
                    let orphans = self.orphaned_rows(&introspector, table)?;
                    if orphans.is_empty() {
                        result.actions.push(format!("References of {table} are consistent"));
                    }
                    for (column, count) in orphans {
                        warn!(table, column = %column, count, "Orphaned references before import");
                        result.actions.push(format!(
                            "{count} row(s) of {table}.{column} reference missing rows"
                        ));
                    }
                }
                TransformationAction::BackupAndRestore => {
                    let in_backup = state
                        .manifest
                        .as_ref()
                        .is_some_and(|m| m.tables.contains_key(table));
                    if in_backup && state.restore_tables.insert(table.to_string()) {
                        result.actions.push(format!("Marked {table} for restore"));
                    }
                }
            }
        }
        Ok(())
    }

    fn import_backup_data(
        &self,
        strategy: &MappingStrategy,
        state: &RunState,
        result: &mut ExecutionResult,
    ) -> GuardResult<()> {
        let Some(manifest) = state.manifest.as_ref() else {
            return Ok(());
        };
        if state.restore_tables.is_empty() {
            result.actions.push("No tables marked for restore".to_string());
            return Ok(());
        }

        let mut plans = strategy.column_plans();
        let imports: Vec<TableImport> = state
            .restore_tables
            .iter()
            .filter_map(|table| manifest.tables.get(table).map(|entry| (table, entry)))
            .map(|(table, entry)| TableImport {
                table: table.clone(),
                data_file: self.backups.data_file(&manifest.backup_id, entry),
                columns: plans.remove(table).unwrap_or_default(),
            })
            .collect();

        let importer = DataImporter::new(
            self.conn,
            ImportOptions {
                chunk_size: self.options.chunk_size,
                dry_run: self.options.dry_run,
                replace_existing: true,
            },
        );
        let summary = importer.import(&imports)?;
        result.actions.push(format!(
            "{} {} row(s) into {} table(s)",
            if summary.committed { "Imported" } else { "Would import" },
            summary.rows_imported(),
            summary.tables.len()
        ));
        result.import = Some(summary);
        Ok(())
    }

    fn validate_data_integrity(&self, state: &RunState, result: &mut ExecutionResult) -> GuardResult<()> {
        let Some(manifest) = state.manifest.as_ref() else {
            return Ok(());
        };
        let introspector = self.introspector();

        for table in &state.restore_tables {
            let Some(entry) = manifest.tables.get(table) else {
                continue;
            };
            let actual = count_rows(self.conn, table)?;
            if actual != entry.row_count {
                return Err(GuardError::IntegrityMismatch {
                    table: table.clone(),
                    expected: format!("{} rows", entry.row_count),
                    actual: format!("{actual} rows"),
                });
            }
            if let Some((column, count)) = self.orphaned_rows(&introspector, table)?.into_iter().next() {
                return Err(GuardError::IntegrityMismatch {
                    table: table.clone(),
                    expected: format!("no orphaned references in {column}"),
                    actual: format!("{count} orphaned rows"),
                });
            }
        }
        result.actions.push(format!(
            "Validated row counts and references of {} table(s)",
            state.restore_tables.len()
        ));
        Ok(())
    }

    fn orphaned_rows(
        &self,
        introspector: &SqliteIntrospector<'_>,
        table: &str,
    ) -> GuardResult<Vec<(String, u64)>> {
        if !introspector.table_exists(table)? {
            return Ok(Vec::new());
        }
        let mut orphans = Vec::new();
        for fk in introspector.foreign_keys(table)? {
            if !introspector.table_exists(&fk.references_table)? {
                continue;
            }
            let sql = Dialect::Sqlite.orphan_count_query(
                table,
                &fk.column,
                &fk.references_table,
                &fk.references_column,
            );
            let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
            if count > 0 {
                orphans.push((fk.column, count as u64));
            }
        }
        Ok(orphans)
    }

    /// Restore every table of a backup verbatim, in one transaction.
    pub fn rollback(&self, backup_id: &str) -> GuardResult<RollbackResult> {
        let _phase = set_phase(Phase::DataMapping);
        let manifest = self.backups.validate_backup(backup_id)?;
        let introspector = self.introspector();
        let mut result = RollbackResult {
            backup_id: backup_id.to_string(),
            ..Default::default()
        };

        for (table, entry) in &manifest.tables {
            if introspector.table_exists(table)? || self.options.dry_run {
                continue;
            }
            let schema = self.backups.load_table_schema(backup_id, entry)?;
            if let Some(create) = schema.create_statement {
                self.conn.execute_batch(&create)?;
                result.tables_created.push(table.clone());
            }
        }

        let imports: Vec<TableImport> = manifest
            .tables
            .iter()
            .map(|(table, entry)| TableImport::new(table.clone(), self.backups.data_file(backup_id, entry)))
            .collect();
        let summary = DataImporter::new(
            self.conn,
            ImportOptions {
                chunk_size: self.options.chunk_size,
                dry_run: self.options.dry_run,
                replace_existing: true,
            },
        )
        .import(&imports)?;

        result.rows_restored = summary.rows_imported();
        result.committed = summary.committed;
        result.tables_restored = summary
            .tables
            .into_iter()
            .filter(|t| t.skipped.is_none())
            .map(|t| t.table)
            .collect();
        info!(
            backup_id,
            tables = result.tables_restored.len(),
            rows = result.rows_restored,
            committed = result.committed,
            "Rollback finished"
        );
        Ok(result)
    }
}

fn count_rows(conn: &Connection, table: &str) -> GuardResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", Dialect::Sqlite.quote_ident(table));
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criticality::{
        ColumnOperation, CriticalityFinding, CriticalityLevel, CriticalityReport, FindingKind,
        FindingSubject,
    };
    use crate::mapping::create_data_mapping_strategy;
    use crate::transfer::DataExporter;
    use tempfile::TempDir;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, legacy TEXT);
             INSERT INTO users VALUES (1, 'Ada', 'a'), (2, 'Grace', 'b');
             CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id), title TEXT);
             INSERT INTO posts VALUES (10, 1, 'Hello'), (11, 2, 'World');",
        )
        .unwrap();
        conn
    }

    fn backed_up(conn: &Connection) -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let backup = BackupManager::new(dir.path())
            .create_backup_with_metadata(
                &SqliteIntrospector::new(conn),
                &DataExporter::new(conn),
                "sqlite",
            )
            .unwrap();
        (dir, backup.backup_id)
    }

    fn strategy(backup_id: &str) -> MappingStrategy {
        let mut report = CriticalityReport::default();
        report.push(CriticalityFinding::new(
            CriticalityLevel::High,
            FindingKind::DataLoss,
            "rename",
            FindingSubject::migration("m.php")
                .table(Some("users"))
                .column("name")
                .renamed_to("full_name"),
        ));
        report.push(CriticalityFinding::new(
            CriticalityLevel::High,
            FindingKind::DataLoss,
            "drop",
            FindingSubject::migration("m.php")
                .table(Some("users"))
                .column("legacy")
                .operation(ColumnOperation::Drop),
        ));
        report.push(CriticalityFinding::new(
            CriticalityLevel::Medium,
            FindingKind::MissingIndex,
            "index",
            FindingSubject::migration("m.php").table(Some("posts")).column("user_id"),
        ));
        create_data_mapping_strategy(&report, backup_id)
    }

    /// Simulate the re-run migration: users loses `legacy`, renames `name`.
    fn migrate_schema(conn: &Connection) {
        conn.execute_batch(
            "PRAGMA foreign_keys = OFF;
             DROP TABLE users;
             CREATE TABLE users (id INTEGER PRIMARY KEY, full_name TEXT);",
        )
        .unwrap();
    }

    fn index_names(conn: &Connection) -> Vec<String> {
        SqliteIntrospector::new(conn)
            .indexes("posts")
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect()
    }

    #[test]
    fn test_full_run_restores_mapped_rows() {
        let conn = seeded();
        let (dir, backup_id) = backed_up(&conn);
        migrate_schema(&conn);

        let executor =
            MappingExecutor::new(&conn, BackupManager::new(dir.path()), ExecutorOptions::default());
        let result = executor.execute_data_mapping(&strategy(&backup_id));

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.steps_completed, ExecutionStep::ALL.to_vec());
        assert!(result.rollback_available);
        assert_eq!(count_rows(&conn, "users").unwrap(), 2);
        let name: String = conn
            .query_row("SELECT full_name FROM users WHERE id = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Grace");
        assert!(index_names(&conn).contains(&"idx_posts_user_id".to_string()));
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let conn = seeded();
        let (dir, backup_id) = backed_up(&conn);
        migrate_schema(&conn);

        let executor = MappingExecutor::new(
            &conn,
            BackupManager::new(dir.path()),
            ExecutorOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        let result = executor.execute_data_mapping(&strategy(&backup_id));

        assert!(result.success);
        assert_eq!(result.steps_skipped, vec![ExecutionStep::ValidateDataIntegrity]);
        assert_eq!(result.steps_completed.len(), 4);
        assert_eq!(count_rows(&conn, "users").unwrap(), 0);
        assert!(!index_names(&conn).contains(&"idx_posts_user_id".to_string()));
        assert!(result.actions.iter().any(|a| a == "Would create index idx_posts_user_id"));
    }

    #[test]
    fn test_tampered_backup_aborts_at_first_step() {
        let conn = seeded();
        let (dir, backup_id) = backed_up(&conn);
        let data = dir.path().join(&backup_id).join("users.sql");
        std::fs::write(&data, "INSERT INTO \"users\" (\"id\") VALUES (99);\n").unwrap();

        let executor =
            MappingExecutor::new(&conn, BackupManager::new(dir.path()), ExecutorOptions::default());
        let result = executor.execute_data_mapping(&strategy(&backup_id));

        assert!(!result.success);
        assert!(!result.rollback_available);
        assert!(result.steps_completed.is_empty());
        assert!(result.errors[0].starts_with("validate_backup_integrity"));
        assert_eq!(count_rows(&conn, "users").unwrap(), 2);
    }

    #[test]
    fn test_rollback_recreates_and_restores_everything() {
        let conn = seeded();
        let (dir, backup_id) = backed_up(&conn);
        conn.execute_batch("DROP TABLE posts; DELETE FROM users WHERE id = 1;")
            .unwrap();

        let executor =
            MappingExecutor::new(&conn, BackupManager::new(dir.path()), ExecutorOptions::default());
        let result = executor.rollback(&backup_id).unwrap();

        assert!(result.committed);
        assert_eq!(result.tables_created, vec!["posts"]);
        assert_eq!(result.tables_restored, vec!["posts", "users"]);
        assert_eq!(result.rows_restored, 4);
        assert_eq!(count_rows(&conn, "users").unwrap(), 2);
        assert_eq!(count_rows(&conn, "posts").unwrap(), 2);
    }

    #[test]
    fn test_rollback_of_unknown_backup_fails() {
        let conn = seeded();
        let dir = tempfile::tempdir().unwrap();
        let executor =
            MappingExecutor::new(&conn, BackupManager::new(dir.path()), ExecutorOptions::default());
        assert!(matches!(
            executor.rollback("backup_missing"),
            Err(GuardError::BackupNotFound(_))
        ));
    }

    #[test]
    fn test_extreme_strategy_with_tampered_backup_is_refused_before_schema_changes() {
        let conn = seeded();
        let (dir, backup_id) = backed_up(&conn);
        conn.execute_batch("DROP TABLE posts;").unwrap();
        let data = dir.path().join(&backup_id).join("users.sql");
        std::fs::write(&data, "INSERT INTO \"users\" (\"id\") VALUES (99);\n").unwrap();

        let mut extreme = strategy(&backup_id);
        extreme.risk_assessment.overall_risk = RerunRisk::Extreme;
        let result =
            MappingExecutor::new(&conn, BackupManager::new(dir.path()), ExecutorOptions::default())
                .execute_data_mapping(&extreme);

        assert!(!result.success);
        assert!(result.steps_completed.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("EXTREME-risk strategy requires a validated backup"));
        assert!(!SqliteIntrospector::new(&conn).table_exists("posts").unwrap());
    }

    #[test]
    fn test_extreme_strategy_with_missing_backup_is_refused() {
        let conn = seeded();
        let dir = tempfile::tempdir().unwrap();
        let mut extreme = strategy("backup_missing");
        extreme.risk_assessment.overall_risk = RerunRisk::Extreme;

        let executor =
            MappingExecutor::new(&conn, BackupManager::new(dir.path()), ExecutorOptions::default());
        let mut state = RunState::default();
        let mut result = ExecutionResult::default();
        let err = executor
            .validate_backup_integrity(&extreme, &mut state, &mut result)
            .unwrap_err();

        assert!(matches!(err, GuardError::Refused(_)));
        assert!(state.manifest.is_none());
    }
}
