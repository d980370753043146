//! Database access: SQL dialects and schema introspection.
//!
//! Only SQLite has an executing implementation. The [`Dialect`] enum still
//! knows how MySQL and PostgreSQL quote identifiers and describe their
//! catalogs, so callers can plug in their own [`SchemaIntrospector`].

pub mod dialect;
pub mod introspect;

pub use dialect::{quote_literal, Dialect};
pub use introspect::{
    ColumnInfo, ForeignKeyInfo, IndexInfo, SchemaIntrospector, SqliteIntrospector, TableSchema,
};

use crate::config::DatabaseConfig;
use crate::errors::{GuardError, GuardResult};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Open the configured database. `database_path` is the resolved location of
/// the SQLite file.
pub fn open_connection(config: &DatabaseConfig, database_path: &Path) -> GuardResult<Connection> {
    let dialect = Dialect::from_driver(&config.driver)?;
    if dialect != Dialect::Sqlite {
        return Err(GuardError::UnsupportedDriver(dialect.driver_name().to_string()));
    }
    if !database_path.exists() {
        return Err(GuardError::io(
            database_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
        ));
    }

    debug!(path = %database_path.display(), "Opening SQLite database");
    let conn = Connection::open(database_path)?;
    // Restores rewrite parent tables; references are validated afterwards.
    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_sqlite_drivers_are_rejected() {
        let config = DatabaseConfig {
            driver: "mysql".into(),
            path: String::new(),
        };
        let err = open_connection(&config, Path::new("unused")).unwrap_err();
        assert!(matches!(err, GuardError::UnsupportedDriver(d) if d == "mysql"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_connection(&DatabaseConfig::default(), &dir.path().join("none.sqlite"))
            .unwrap_err();
        assert!(matches!(err, GuardError::Io { .. }));
    }

    #[test]
    fn test_opens_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (id INTEGER)")
            .unwrap();
        let conn = open_connection(&DatabaseConfig::default(), &path).unwrap();
        let tables = SqliteIntrospector::new(&conn).list_tables().unwrap();
        assert_eq!(tables, vec!["t"]);
    }

    #[test]
    fn test_opened_connection_does_not_enforce_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        Connection::open(&path).unwrap();

        let conn = open_connection(&DatabaseConfig::default(), &path).unwrap();
        let enforced: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(enforced, 0);
    }
}
