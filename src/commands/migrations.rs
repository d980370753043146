use super::CommandContext;
use crate::cli;
use crate::criticality::{CriticalityAnalyzer, CriticalityReport};
use crate::io::output::create_writer;
use crate::observability::{set_phase, Phase};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub fn analyze_migrations(ctx: &CommandContext, dir: Option<&Path>) -> CriticalityReport {
    let analyzer = CriticalityAnalyzer::new((&ctx.config.thresholds).into());
    analyzer.analyze_directory(dir.unwrap_or(&ctx.layout.migrations))
}

pub fn handle_migrations(
    ctx: &CommandContext,
    dir: Option<PathBuf>,
    format: cli::OutputFormat,
    output: Option<PathBuf>,
) -> Result<CriticalityReport> {
    let report = analyze_migrations(ctx, dir.as_deref());

    let _phase = set_phase(Phase::OutputGeneration);
    let mut writer = create_writer(format.into(), output.as_deref())?;
    writer.write_criticality(&report)?;

    if let Some(error) = &report.error {
        anyhow::bail!("Migration analysis failed: {error}");
    }
    Ok(report)
}
