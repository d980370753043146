use super::CommandContext;
use crate::cleanup::{CleanupReport, MigrationCleaner};
use anyhow::Result;

pub fn handle_cleanup_migrations(ctx: &CommandContext) -> Result<CleanupReport> {
    let report = MigrationCleaner::new(&ctx.layout.migrations, &ctx.layout.backups)
        .with_dry_run(ctx.dry_run)
        .cleanup()?;

    if report.groups.is_empty() {
        println!("No redundant migrations found");
        return Ok(report);
    }

    for group in &report.groups {
        println!("{} (keeping {})", group.name, ctx.layout.relative(&group.kept).display());
        for path in &group.redundant {
            let verb = if report.dry_run { "would remove" } else { "removed" };
            println!("  {verb} {}", ctx.layout.relative(path).display());
        }
    }
    if let Some(dir) = &report.backup_dir {
        println!("Backed up removed migrations to {}", dir.display());
    }
    Ok(report)
}
