use super::{write_json, CommandContext};
use crate::database::{SchemaIntrospector, SqliteIntrospector};
use crate::transfer::{DataExporter, DataImporter, ExportedTable, ImportOptions, ImportSummary, TableImport};
use anyhow::{Context, Result};
use std::path::Path;

pub fn handle_export(ctx: &CommandContext, dir: &Path, tables: Vec<String>) -> Result<Vec<ExportedTable>> {
    let conn = ctx.open_database()?;
    let tables = if tables.is_empty() {
        SqliteIntrospector::new(&conn).list_tables()?
    } else {
        tables
    };

    let exported = DataExporter::new(&conn)
        .export_tables(&tables, dir)
        .with_context(|| format!("Failed to export into {}", dir.display()))?;
    write_json(&exported, None)?;
    Ok(exported)
}

pub fn handle_import(
    ctx: &CommandContext,
    dir: &Path,
    tables: Vec<String>,
    chunk_size: Option<usize>,
) -> Result<ImportSummary> {
    let tables = if tables.is_empty() {
        data_files_in(dir)?
    } else {
        tables
    };
    let imports: Vec<TableImport> = tables
        .iter()
        .map(|table| TableImport::new(table.clone(), dir.join(format!("{table}.sql"))))
        .collect();

    let conn = ctx.open_database()?;
    let options = ImportOptions {
        chunk_size: chunk_size
            .filter(|size| *size > 0)
            .unwrap_or(ctx.config.thresholds.import_chunk_size),
        dry_run: ctx.dry_run,
        replace_existing: true,
    };
    let summary = DataImporter::new(&conn, options).import(&imports)?;
    write_json(&summary, None)?;
    Ok(summary)
}

/// Table names of the `<table>.sql` files in `dir`, sorted.
fn data_files_in(dir: &Path) -> Result<Vec<String>> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tables.push(stem.to_string());
            }
        }
    }
    tables.sort();
    Ok(tables)
}
