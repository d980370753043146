use super::backup::create_backup;
use super::migrations::analyze_migrations;
use super::{write_json, CommandContext};
use crate::mapping::{
    create_data_mapping_strategy, ExecutionResult, ExecutorOptions, MappingExecutor,
    MappingStrategy, RollbackResult,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Analyze the migrations and derive a strategy against `backup_id`, taking a
/// fresh backup when none is given.
pub fn handle_strategy(
    ctx: &CommandContext,
    backup_id: Option<String>,
    output: Option<PathBuf>,
) -> Result<MappingStrategy> {
    let report = analyze_migrations(ctx, None);
    if let Some(error) = &report.error {
        anyhow::bail!("Migration analysis failed: {error}");
    }

    let backup_id = match backup_id {
        Some(id) => {
            ctx.backup_manager()
                .validate_backup(&id)
                .with_context(|| format!("Backup {id} failed validation"))?;
            id
        }
        None => create_backup(ctx)?.backup_id,
    };

    let strategy = create_data_mapping_strategy(&report, &backup_id);
    info!(
        backup_id = %strategy.backup_id,
        risk = %strategy.risk_assessment.overall_risk,
        mappings_required = strategy.mappings_required,
        "Built data mapping strategy"
    );
    match output.as_deref() {
        Some(path) => strategy
            .save(path)
            .with_context(|| format!("Failed to save strategy to {}", path.display()))?,
        None => write_json(&strategy, None)?,
    }
    Ok(strategy)
}

pub fn handle_execute(
    ctx: &CommandContext,
    strategy_path: &Path,
    chunk_size: Option<usize>,
) -> Result<ExecutionResult> {
    let strategy = MappingStrategy::load(strategy_path)
        .with_context(|| format!("Failed to load strategy {}", strategy_path.display()))?;
    let conn = ctx.open_database()?;
    let executor = MappingExecutor::new(&conn, ctx.backup_manager(), options(ctx, chunk_size));

    let result = executor.execute_data_mapping(&strategy);
    write_json(&result, None)?;
    if !result.success {
        anyhow::bail!("Data mapping failed: {}", result.errors.join("; "));
    }
    if result.dry_run {
        warn!("Dry run: no changes were committed");
    }
    Ok(result)
}

pub fn handle_rollback(ctx: &CommandContext, backup_id: &str) -> Result<RollbackResult> {
    let conn = ctx.open_database()?;
    let executor = MappingExecutor::new(&conn, ctx.backup_manager(), options(ctx, None));
    let result = executor
        .rollback(backup_id)
        .with_context(|| format!("Rollback to {backup_id} failed"))?;
    write_json(&result, None)?;
    Ok(result)
}

fn options(ctx: &CommandContext, chunk_size: Option<usize>) -> ExecutorOptions {
    ExecutorOptions {
        chunk_size: chunk_size
            .filter(|size| *size > 0)
            .unwrap_or(ctx.config.thresholds.import_chunk_size),
        dry_run: ctx.dry_run,
    }
}
