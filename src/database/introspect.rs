use super::dialect::Dialect;
use crate::errors::GuardResult;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Statement that recreates the index, when the database keeps one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_statement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    pub on_delete: String,
    pub on_update: String,
}

/// Full structural description of a table, as stored next to its backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_statement: Option<String>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Read-only view of a database's structure.
pub trait SchemaIntrospector {
    fn dialect(&self) -> Dialect;

    fn list_tables(&self) -> GuardResult<Vec<String>>;

    fn columns(&self, table: &str) -> GuardResult<Vec<ColumnInfo>>;

    fn foreign_keys(&self, table: &str) -> GuardResult<Vec<ForeignKeyInfo>>;

    fn indexes(&self, table: &str) -> GuardResult<Vec<IndexInfo>>;

    fn create_statement(&self, table: &str) -> GuardResult<Option<String>>;

    fn table_exists(&self, table: &str) -> GuardResult<bool> {
        Ok(self.list_tables()?.iter().any(|t| t == table))
    }

    fn table_schema(&self, table: &str) -> GuardResult<TableSchema> {
        Ok(TableSchema {
            table: table.to_string(),
            columns: self.columns(table)?,
            indexes: self.indexes(table)?,
            foreign_keys: self.foreign_keys(table)?,
            create_statement: self.create_statement(table)?,
        })
    }
}

/// Introspection through SQLite's catalog and PRAGMA functions.
pub struct SqliteIntrospector<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteIntrospector<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }
}

impl SchemaIntrospector for SqliteIntrospector<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn list_tables(&self) -> GuardResult<Vec<String>> {
        let mut stmt = self.conn.prepare(Dialect::Sqlite.list_tables_query())?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn table_exists(&self, table: &str) -> GuardResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn columns(&self, table: &str) -> GuardResult<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(&Dialect::Sqlite.columns_query(table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? > 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn foreign_keys(&self, table: &str) -> GuardResult<Vec<ForeignKeyInfo>> {
        let sql = format!(
            "PRAGMA foreign_key_list({})",
            Dialect::Sqlite.quote_ident(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let keys = stmt
            .query_map([], |row| {
                Ok(ForeignKeyInfo {
                    references_table: row.get(2)?,
                    column: row.get(3)?,
                    // NULL when the FK targets the parent's primary key implicitly
                    references_column: row
                        .get::<_, Option<String>>(4)?
                        .unwrap_or_else(|| "id".to_string()),
                    on_update: row.get(5)?,
                    on_delete: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn indexes(&self, table: &str) -> GuardResult<Vec<IndexInfo>> {
        let sql = format!("PRAGMA index_list({})", Dialect::Sqlite.quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let listed = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? != 0))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut indexes = Vec::with_capacity(listed.len());
        for (name, unique) in listed {
            let info_sql = format!("PRAGMA index_info({})", Dialect::Sqlite.quote_ident(&name));
            let mut info = self.conn.prepare(&info_sql)?;
            let columns = info
                .query_map([], |row| row.get::<_, Option<String>>(2))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect();
            let create_statement = self
                .conn
                .query_row(
                    "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
                    params![name],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
            indexes.push(IndexInfo {
                name,
                columns,
                unique,
                create_statement,
            });
        }
        Ok(indexes)
    }

    fn create_statement(&self, table: &str) -> GuardResult<Option<String>> {
        let sql = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL, name TEXT DEFAULT 'anon');
             CREATE TABLE posts (
                 id INTEGER PRIMARY KEY,
                 user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                 title TEXT
             );
             CREATE UNIQUE INDEX users_email_unique ON users (email);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_lists_tables_sorted() {
        let conn = fixture();
        let introspector = SqliteIntrospector::new(&conn);
        assert_eq!(introspector.list_tables().unwrap(), vec!["posts", "users"]);
        assert!(introspector.table_exists("users").unwrap());
        assert!(!introspector.table_exists("comments").unwrap());
    }

    #[test]
    fn test_describes_columns_indexes_and_keys() {
        let conn = fixture();
        let introspector = SqliteIntrospector::new(&conn);

        let users = introspector.table_schema("users").unwrap();
        assert_eq!(users.column_names(), vec!["id", "email", "name"]);
        assert!(users.columns[0].primary_key);
        assert!(!users.columns[1].nullable);
        assert_eq!(users.columns[2].default_value.as_deref(), Some("'anon'"));
        assert_eq!(users.indexes.len(), 1);
        assert!(users.indexes[0].unique);
        assert_eq!(users.indexes[0].columns, vec!["email"]);
        assert!(users.create_statement.unwrap().starts_with("CREATE TABLE users"));

        let keys = introspector.foreign_keys("posts").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].column, "user_id");
        assert_eq!(keys[0].references_table, "users");
        assert_eq!(keys[0].on_delete, "CASCADE");
    }
}
