use super::statement::{split_sql_statements, InsertStatement};
use crate::config::ThresholdsConfig;
use crate::database::{Dialect, SchemaIntrospector, SqliteIntrospector};
use crate::errors::{GuardResult, IoResultExt};
use crate::observability::{set_current_table, set_phase, Phase};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// SQLite's default cap on bound parameters per statement.
const MAX_BOUND_PARAMETERS: usize = 32_766;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Rows per multi-row `INSERT`
    pub chunk_size: usize,
    /// Run everything, then roll the transaction back
    pub dry_run: bool,
    /// Delete the target table's rows before inserting
    pub replace_existing: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: ThresholdsConfig::default().import_chunk_size,
            dry_run: false,
            replace_existing: true,
        }
    }
}

/// Column renames and drops applied to one table's rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPlan {
    pub renames: BTreeMap<String, String>,
    pub drops: BTreeSet<String>,
}

impl ColumnPlan {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.drops.is_empty()
    }

    fn target_name(&self, column: &str) -> Option<String> {
        if self.drops.contains(column) {
            return None;
        }
        Some(
            self.renames
                .get(column)
                .cloned()
                .unwrap_or_else(|| column.to_string()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableImport {
    pub table: String,
    pub data_file: PathBuf,
    pub columns: ColumnPlan,
}

impl TableImport {
    pub fn new(table: impl Into<String>, data_file: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            data_file: data_file.into(),
            columns: ColumnPlan::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableImportResult {
    pub table: String,
    pub rows_read: u64,
    pub rows_imported: u64,
    /// Source columns not carried into the target
    pub dropped_columns: Vec<String>,
    /// Why the table was not imported at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub tables: Vec<TableImportResult>,
    /// False in dry-run: the transaction was rolled back
    pub committed: bool,
}

impl ImportSummary {
    pub fn rows_imported(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_imported).sum()
    }
}

/// Re-inserts backed-up rows into the live database inside one transaction.
pub struct DataImporter<'c> {
    conn: &'c Connection,
    options: ImportOptions,
}

impl<'c> DataImporter<'c> {
    pub fn new(conn: &'c Connection, options: ImportOptions) -> Self {
        Self { conn, options }
    }

    /// Parent tables are emptied and refilled inside the transaction, so
    /// foreign-key enforcement is suspended for its duration and restored
    /// afterwards. References are checked by the caller once rows are back.
    pub fn import(&self, imports: &[TableImport]) -> GuardResult<ImportSummary> {
        let _phase = set_phase(Phase::Import);
        let enforced: bool = self
            .conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        if enforced {
            debug!("Suspending foreign key enforcement for import");
            self.conn.pragma_update(None, "foreign_keys", false)?;
        }

        let outcome = self.import_in_transaction(imports);

        if enforced {
            self.conn.pragma_update(None, "foreign_keys", true)?;
        }
        outcome
    }

    fn import_in_transaction(&self, imports: &[TableImport]) -> GuardResult<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;

        let mut summary = ImportSummary::default();
        for import in imports {
            let result = self.import_table(&tx, import)?;
            summary.tables.push(result);
        }

        if self.options.dry_run {
            tx.rollback()?;
            warn!(
                rows = summary.rows_imported(),
                "Dry run: import transaction rolled back"
            );
        } else {
            tx.commit()?;
            summary.committed = true;
            info!(rows = summary.rows_imported(), "Import committed");
        }
        Ok(summary)
    }

    fn import_table(&self, conn: &Connection, import: &TableImport) -> GuardResult<TableImportResult> {
        let _table = set_current_table(&import.table);
        let mut result = TableImportResult {
            table: import.table.clone(),
            ..Default::default()
        };

        let introspector = SqliteIntrospector::new(conn);
        if !introspector.table_exists(&import.table)? {
            warn!(table = %import.table, "Target table missing, skipping import");
            result.skipped = Some("table does not exist in target database".into());
            return Ok(result);
        }
        let target_columns: BTreeSet<String> = introspector
            .columns(&import.table)?
            .into_iter()
            .map(|c| c.name)
            .collect();

        let content = std::fs::read_to_string(&import.data_file).with_path(&import.data_file)?;

        if self.options.replace_existing {
            conn.execute(&Dialect::Sqlite.delete_all_statement(&import.table), [])?;
        }

        let mut dropped = BTreeSet::new();
        let mut batch = Batch::default();

        for raw in split_sql_statements(&content) {
            let mut stmt = InsertStatement::parse(&raw)?;
            stmt.remap_columns(|column| {
                let target = import.columns.target_name(column);
                match target {
                    Some(name) if target_columns.contains(&name) => Some(name),
                    _ => {
                        dropped.insert(column.to_string());
                        None
                    }
                }
            });

            for row in stmt.rows {
                result.rows_read += 1;
                if stmt.columns.is_empty() {
                    continue;
                }
                if batch.columns != stmt.columns {
                    result.rows_imported += batch.flush(conn, &import.table)?;
                    batch.columns = stmt.columns.clone();
                }
                batch.rows.push(row);
                if batch.rows.len() >= self.chunk_rows(batch.columns.len()) {
                    result.rows_imported += batch.flush(conn, &import.table)?;
                }
            }
        }
        result.rows_imported += batch.flush(conn, &import.table)?;
        result.dropped_columns = dropped.into_iter().collect();

        debug!(
            table = %import.table,
            read = result.rows_read,
            imported = result.rows_imported,
            "Imported table"
        );
        Ok(result)
    }

    fn chunk_rows(&self, width: usize) -> usize {
        let by_parameters = MAX_BOUND_PARAMETERS / width.max(1);
        self.options.chunk_size.min(by_parameters).max(1)
    }
}

#[derive(Default)]
struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Batch {
    fn flush(&mut self, conn: &Connection, table: &str) -> GuardResult<u64> {
        if self.rows.is_empty() {
            return Ok(0);
        }
        let dialect = Dialect::Sqlite;
        let placeholders = format!("({})", vec!["?"; self.columns.len()].join(", "));
        let columns: Vec<String> = self.columns.iter().map(|c| dialect.quote_ident(c)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            dialect.quote_ident(table),
            columns.join(", "),
            vec![placeholders; self.rows.len()].join(", ")
        );

        let rows = std::mem::take(&mut self.rows);
        let inserted = conn.execute(&sql, params_from_iter(rows.into_iter().flatten()))?;
        Ok(inserted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::export::DataExporter;
    use tempfile::TempDir;

    fn source_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, legacy TEXT);
             INSERT INTO users VALUES (1, 'Ada', 'x'), (2, 'Grace', 'y'), (3, 'Linus', 'z');",
        )
        .unwrap();
        conn
    }

    fn exported(conn: &Connection) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("users.sql");
        DataExporter::new(conn).export_table("users", &file).unwrap();
        (dir, file)
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_imports_with_rename_and_drop_in_small_chunks() {
        let source = source_db();
        let (_dir, file) = exported(&source);

        let target = Connection::open_in_memory().unwrap();
        target
            .execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, full_name TEXT)")
            .unwrap();

        let mut import = TableImport::new("users", &file);
        import.columns.renames.insert("name".into(), "full_name".into());

        let options = ImportOptions {
            chunk_size: 2,
            ..Default::default()
        };
        let summary = DataImporter::new(&target, options).import(&[import]).unwrap();

        assert!(summary.committed);
        assert_eq!(summary.tables[0].rows_read, 3);
        assert_eq!(summary.tables[0].rows_imported, 3);
        assert_eq!(summary.tables[0].dropped_columns, vec!["legacy"]);
        let name: String = target
            .query_row("SELECT full_name FROM users WHERE id = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Grace");
    }

    #[test]
    fn test_dry_run_leaves_target_untouched() {
        let source = source_db();
        let (_dir, file) = exported(&source);

        let target = Connection::open_in_memory().unwrap();
        target
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, legacy TEXT);
                 INSERT INTO users VALUES (9, 'Existing', NULL);",
            )
            .unwrap();

        let options = ImportOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = DataImporter::new(&target, options)
            .import(&[TableImport::new("users", &file)])
            .unwrap();

        assert!(!summary.committed);
        assert_eq!(summary.rows_imported(), 3);
        assert_eq!(count(&target, "users"), 1);
    }

    #[test]
    fn test_missing_target_table_is_skipped() {
        let source = source_db();
        let (_dir, file) = exported(&source);
        let target = Connection::open_in_memory().unwrap();

        let summary = DataImporter::new(&target, ImportOptions::default())
            .import(&[TableImport::new("users", &file)])
            .unwrap();
        assert!(summary.tables[0].skipped.is_some());
        assert_eq!(summary.rows_imported(), 0);
    }

    #[test]
    fn test_malformed_file_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("users.sql");
        std::fs::write(
            &file,
            "INSERT INTO \"users\" (\"id\") VALUES (1);\nDROP TABLE users;\n",
        )
        .unwrap();

        let target = Connection::open_in_memory().unwrap();
        target
            .execute_batch("CREATE TABLE users (id INTEGER); INSERT INTO users VALUES (42);")
            .unwrap();

        let result = DataImporter::new(&target, ImportOptions::default())
            .import(&[TableImport::new("users", &file)]);
        assert!(result.is_err());
        assert_eq!(count(&target, "users"), 1);
    }

    #[test]
    fn test_chunk_size_respects_parameter_limit() {
        let conn = Connection::open_in_memory().unwrap();
        let importer = DataImporter::new(&conn, ImportOptions::default());
        assert_eq!(importer.chunk_rows(2), 1000);
        assert_eq!(importer.chunk_rows(100), 327);
        assert_eq!(importer.chunk_rows(0), 1000);
    }

    #[test]
    fn test_replacing_referenced_parent_with_enforced_foreign_keys() {
        let source = source_db();
        let (_dir, file) = exported(&source);

        let target = Connection::open_in_memory().unwrap();
        target
            .execute_batch(
                "PRAGMA foreign_keys = ON;
                 CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, legacy TEXT);
                 CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL REFERENCES users(id));
                 INSERT INTO users VALUES (1, 'Ada', 'x');
                 INSERT INTO posts VALUES (1, 1);",
            )
            .unwrap();

        let summary = DataImporter::new(&target, ImportOptions::default())
            .import(&[TableImport::new("users", &file)])
            .unwrap();

        assert!(summary.committed);
        assert_eq!(count(&target, "users"), 3);
        let enforced: bool = target
            .pragma_query_value(None, "foreign_keys", |r| r.get(0))
            .unwrap();
        assert!(enforced);
    }
}
