//! Fact extraction from migration change files.
//!
//! The criticality analyzer never looks at source text directly: it asks a
//! [`MigrationExtractor`] for [`MigrationFacts`] and reasons over those. The
//! default [`RegexMigrationExtractor`] pattern-matches Laravel schema-builder
//! calls; a real PHP parser can replace it without touching the analyzer.

pub mod lexer;
pub mod regex_extractor;

pub use lexer::{check_balance, split_statements, BalanceError, Statement};
pub use regex_extractor::RegexMigrationExtractor;

use serde::{Deserialize, Serialize};

/// Extracts schema facts from the text of one migration file.
pub trait MigrationExtractor {
    fn extract(&self, source: &str) -> MigrationFacts;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOperationKind {
    Create,
    Alter,
    Drop,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOperation {
    pub table: String,
    pub kind: TableOperationKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDecl {
    pub table: Option<String>,
    pub name: String,
    /// Schema-builder method, e.g. `string`, `foreignId`
    pub column_type: String,
    pub line: usize,
    pub nullable: bool,
    pub has_default: bool,
    /// Indexed inline via `->index()`, `->unique()` or `->primary()`
    pub indexed: bool,
    /// Declared with `->change()`
    pub is_change: bool,
    /// Declared inside `Schema::table` rather than `Schema::create`
    pub in_alter: bool,
    pub snippet: String,
}

impl ColumnDecl {
    /// `*_id` columns and `foreignId`-style declarations reference other tables.
    pub fn is_foreign_key_style(&self) -> bool {
        self.name.ends_with("_id")
            || matches!(
                self.column_type.as_str(),
                "foreignId" | "foreignUuid" | "foreignUlid"
            )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDecl {
    pub table: Option<String>,
    pub column: String,
    pub references: Option<String>,
    pub named: bool,
    pub on_delete: bool,
    pub on_update: bool,
    pub line: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDecl {
    pub table: Option<String>,
    pub columns: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
    pub line: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRename {
    pub table: Option<String>,
    pub from: String,
    pub to: String,
    pub line: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestructiveKind {
    Truncate,
    DeleteAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructiveStatement {
    pub kind: DestructiveKind,
    pub table: Option<String>,
    pub line: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRef {
    pub table: Option<String>,
    pub line: usize,
    pub snippet: String,
}

/// Everything the analyzer needs to know about one migration file.
///
/// Schema operations come from the `up()` body only; `line_count`,
/// `has_comments` and `syntax_error` describe the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFacts {
    pub line_count: usize,
    pub has_comments: bool,
    pub syntax_error: Option<BalanceError>,
    pub table_operations: Vec<TableOperation>,
    pub columns: Vec<ColumnDecl>,
    pub foreign_keys: Vec<ForeignKeyDecl>,
    pub indexes: Vec<IndexDecl>,
    pub dropped_columns: Vec<ColumnRef>,
    pub renamed_columns: Vec<ColumnRename>,
    pub destructive_statements: Vec<DestructiveStatement>,
    pub bulk_updates: Vec<StatementRef>,
    /// The `up()` body copies or transforms rows explicitly
    pub has_data_migration: bool,
}

impl MigrationFacts {
    /// Tables created, altered, dropped or renamed by this file.
    pub fn touched_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self
            .table_operations
            .iter()
            .map(|op| op.table.as_str())
            .collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    /// Whether `column` of `table` is covered by an inline or standalone index.
    pub fn is_indexed(&self, table: Option<&str>, column: &str) -> bool {
        let same_table = |t: &Option<String>| t.as_deref() == table;
        self.columns
            .iter()
            .any(|c| c.indexed && c.name == column && same_table(&c.table))
            || self
                .indexes
                .iter()
                .any(|i| same_table(&i.table) && i.columns.iter().any(|c| c == column))
    }

    /// Tables dropped in `up()` and later created again in the same body.
    pub fn dropped_then_recreated(&self) -> Vec<&TableOperation> {
        self.table_operations
            .iter()
            .filter(|op| op.kind == TableOperationKind::Drop)
            .filter(|drop| {
                self.table_operations.iter().any(|op| {
                    op.kind == TableOperationKind::Create
                        && op.table == drop.table
                        && op.line > drop.line
                })
            })
            .collect()
    }
}
