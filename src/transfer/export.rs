use super::statement::InsertStatement;
use crate::database::Dialect;
use crate::errors::{GuardResult, IoResultExt};
use crate::observability::{set_current_table, set_phase, Phase};
use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedTable {
    pub table: String,
    pub rows: u64,
    pub file: PathBuf,
}

/// Dumps table rows as `INSERT` statements.
pub struct DataExporter<'c> {
    conn: &'c Connection,
}

impl<'c> DataExporter<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Write every row of `table` to `path`, one statement per line.
    pub fn export_table(&self, table: &str, path: &Path) -> GuardResult<u64> {
        let _table = set_current_table(table);
        let file = File::create(path).with_path(path)?;
        let mut out = BufWriter::new(file);

        let sql = format!("SELECT * FROM {}", Dialect::Sqlite.quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut count = 0u64;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(owned_value))
                .collect::<Result<Vec<_>, _>>()?;
            let insert = InsertStatement::single(table, columns.clone(), values);
            writeln!(out, "{}", insert.render(Dialect::Sqlite)).with_path(path)?;
            count += 1;
        }
        out.flush().with_path(path)?;

        debug!(table, rows = count, file = %path.display(), "Exported table");
        Ok(count)
    }

    /// Export each table to `<dir>/<table>.sql`.
    pub fn export_tables(&self, tables: &[String], dir: &Path) -> GuardResult<Vec<ExportedTable>> {
        let _phase = set_phase(Phase::Backup);
        std::fs::create_dir_all(dir).with_path(dir)?;

        let mut exported = Vec::with_capacity(tables.len());
        for table in tables {
            let file = dir.join(format!("{table}.sql"));
            let rows = self.export_table(table, &file)?;
            exported.push(ExportedTable {
                table: table.clone(),
                rows,
                file,
            });
        }
        info!(tables = exported.len(), dir = %dir.display(), "Export complete");
        Ok(exported)
    }
}

/// TEXT that is not valid UTF-8 is carried as a blob literal.
fn owned_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => {
                warn!(bytes = bytes.len(), "Non UTF-8 text exported as blob");
                Value::Blob(bytes.to_vec())
            }
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::statement::split_sql_statements;

    #[test]
    fn test_exports_one_statement_per_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, bio TEXT);
             INSERT INTO users VALUES (1, 'Ada', NULL), (2, 'Grace; Hopper', 'line\nbreak');",
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let exported = DataExporter::new(&conn)
            .export_tables(&["users".to_string()], dir.path())
            .unwrap();
        assert_eq!(exported[0].rows, 2);

        let content = std::fs::read_to_string(&exported[0].file).unwrap();
        let statements = split_sql_statements(&content);
        assert_eq!(statements.len(), 2);
        let second = InsertStatement::parse(&statements[1]).unwrap();
        assert_eq!(second.rows[0][1], Value::Text("Grace; Hopper".into()));
    }

    #[test]
    fn test_empty_table_writes_empty_file() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.sql");
        assert_eq!(DataExporter::new(&conn).export_table("t", &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8_text_is_exported_as_blob() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);
             INSERT INTO notes VALUES (1, CAST(X'FF61' AS TEXT));",
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.sql");

        assert_eq!(DataExporter::new(&conn).export_table("notes", &path).unwrap(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let statement = InsertStatement::parse(&split_sql_statements(&content)[0]).unwrap();
        assert_eq!(statement.rows[0][1], Value::Blob(vec![0xFF, 0x61]));
    }
}
