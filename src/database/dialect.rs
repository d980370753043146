use crate::errors::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL flavour of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "pgsql")]
    Postgres,
}

impl Dialect {
    /// Parse a Laravel-style driver name.
    pub fn from_driver(driver: &str) -> GuardResult<Self> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(GuardError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn driver_name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::Postgres => "pgsql",
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Query returning one column: the names of user tables, sorted.
    pub fn list_tables_query(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Dialect::MySql => {
                "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name"
            }
            Dialect::Postgres => {
                "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = current_schema() ORDER BY tablename"
            }
        }
    }

    /// Query describing the columns of `table`.
    pub fn columns_query(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("PRAGMA table_info({})", self.quote_ident(table)),
            Dialect::MySql => format!(
                "SELECT column_name, column_type, is_nullable, column_default, column_key \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = {} ORDER BY ordinal_position",
                quote_literal(table)
            ),
            Dialect::Postgres => format!(
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = {} ORDER BY ordinal_position",
                quote_literal(table)
            ),
        }
    }

    /// Query counting rows of `table` whose `column` points at no row of
    /// `references_table.references_column`.
    pub fn orphan_count_query(
        &self,
        table: &str,
        column: &str,
        references_table: &str,
        references_column: &str,
    ) -> String {
        let q = |ident: &str| self.quote_ident(ident);
        format!(
            "SELECT COUNT(*) FROM {t} AS c LEFT JOIN {r} AS p ON c.{col} = p.{rcol} \
             WHERE c.{col} IS NOT NULL AND p.{rcol} IS NULL",
            t = q(table),
            r = q(references_table),
            col = q(column),
            rcol = q(references_column),
        )
    }

    pub fn create_index_statement(&self, name: &str, table: &str, columns: &[String]) -> String {
        let columns: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let if_not_exists = match self {
            Dialect::MySql => "",
            Dialect::Sqlite | Dialect::Postgres => "IF NOT EXISTS ",
        };
        format!(
            "CREATE INDEX {if_not_exists}{} ON {} ({})",
            self.quote_ident(name),
            self.quote_ident(table),
            columns.join(", ")
        )
    }

    pub fn delete_all_statement(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote_ident(table))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

/// Single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
