//! Moving row data between a database and `INSERT`-statement files.

pub mod export;
pub mod import;
pub mod statement;

pub use export::{DataExporter, ExportedTable};
pub use import::{
    ColumnPlan, DataImporter, ImportOptions, ImportSummary, TableImport, TableImportResult,
};
pub use statement::{render_value, split_sql_statements, InsertStatement};
