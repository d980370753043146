use super::CommandContext;
use crate::cli::BackupAction;
use crate::database::SqliteIntrospector;
use crate::mapping::Backup;
use crate::transfer::DataExporter;
use anyhow::{Context, Result};
use colored::*;
use comfy_table::Table;

pub fn handle_backup(ctx: &CommandContext, action: BackupAction) -> Result<()> {
    match action {
        BackupAction::Create => {
            let backup = create_backup(ctx)?;
            println!(
                "{} Created {} ({} tables, {} rows)",
                "✓".green(),
                backup.backup_id.bold(),
                backup.manifest.tables.len(),
                backup.manifest.total_rows()
            );
        }
        BackupAction::Validate { backup_id } => {
            let manifest = ctx
                .backup_manager()
                .validate_backup(&backup_id)
                .with_context(|| format!("Backup {backup_id} failed validation"))?;
            println!(
                "{} {} is intact ({} tables)",
                "✓".green(),
                backup_id.bold(),
                manifest.tables.len()
            );
        }
        BackupAction::List => {
            let manifests = ctx.backup_manager().list_backups()?;
            if manifests.is_empty() {
                println!("No backups in {}", ctx.layout.backups.display());
                return Ok(());
            }
            let mut table = Table::new();
            table.set_header(vec!["Backup", "Created", "Tables", "Rows"]);
            for manifest in &manifests {
                table.add_row(vec![
                    manifest.backup_id.clone(),
                    manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    manifest.tables.len().to_string(),
                    manifest.total_rows().to_string(),
                ]);
            }
            println!("{table}");
        }
        BackupAction::Cleanup { max_age_days } => {
            let max_age = max_age_days.unwrap_or(ctx.config.thresholds.backup_max_age_days);
            let cleanup = ctx.backup_manager().cleanup_old_backups(max_age)?;
            let verb = if cleanup.dry_run { "Would remove" } else { "Removed" };
            println!(
                "{verb} {} backup(s) older than {max_age} days, kept {}",
                cleanup.removed.len(),
                cleanup.kept
            );
            for id in &cleanup.removed {
                println!("  - {id}");
            }
        }
    }
    Ok(())
}

/// Snapshot every table of the configured database.
pub fn create_backup(ctx: &CommandContext) -> Result<Backup> {
    let conn = ctx.open_database()?;
    let introspector = SqliteIntrospector::new(&conn);
    let exporter = DataExporter::new(&conn);
    ctx.backup_manager()
        .create_backup_with_metadata(&introspector, &exporter, &ctx.database_label())
        .context("Failed to create backup")
}
