use super::CommandContext;
use crate::checkers::CheckerOrchestrator;
use crate::cli;
use crate::core::ApplyOutcome;
use crate::io::output::create_writer;
use crate::ledger::IssueLedger;
use crate::observability::{set_phase, Phase};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct CheckConfig {
    pub checker: Option<String>,
    pub disable: Vec<String>,
    pub fix: bool,
    pub format: cli::OutputFormat,
    pub output: Option<PathBuf>,
}

pub fn handle_check(ctx: &CommandContext, config: CheckConfig) -> Result<IssueLedger> {
    let mut orchestrator = CheckerOrchestrator::with_defaults(ctx.layout.clone(), &ctx.config);
    for name in &config.disable {
        if !orchestrator.disable(name) {
            warn!(checker = %name, "No checker with this name");
        }
    }

    let ledger = match &config.checker {
        Some(query) => {
            let name = orchestrator
                .find_checker(query)
                .map(|c| c.name().to_string())
                .ok_or_else(|| anyhow::anyhow!("No checker matches '{query}'"))?;
            orchestrator.run_check(&name).unwrap_or_default()
        }
        None => orchestrator.run_all_checks(),
    };

    if config.fix {
        apply_fixes(&ledger, ctx.dry_run)?;
    }

    let _phase = set_phase(Phase::OutputGeneration);
    let mut writer = create_writer(config.format.into(), config.output.as_deref())?;
    writer.write_issues(&ledger)?;
    Ok(ledger)
}

fn apply_fixes(ledger: &IssueLedger, dry_run: bool) -> Result<()> {
    let mut applied = 0;
    for improvement in ledger.fixable_improvements() {
        match improvement.apply(dry_run)? {
            ApplyOutcome::Applied { replacements } => {
                applied += 1;
                info!(file = %improvement.file.display(), replacements, title = %improvement.title, "Applied fix");
            }
            ApplyOutcome::WouldApply { replacements } => {
                warn!(file = %improvement.file.display(), replacements, title = %improvement.title, "Dry run: would apply fix");
            }
            ApplyOutcome::Skipped { reason } => {
                warn!(file = %improvement.file.display(), reason = %reason, "Skipped fix");
            }
        }
    }
    info!(applied, "Auto-fix pass finished");
    Ok(())
}
