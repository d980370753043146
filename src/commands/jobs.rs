use super::{write_json, CommandContext};
use crate::checkers::CheckerOrchestrator;
use crate::cli::JobAction;
use crate::jobs::{fail_job, run_check_job, JobStore};
use anyhow::{Context, Result};

pub fn handle_job(ctx: &CommandContext, action: JobAction) -> Result<()> {
    let store = JobStore::new(&ctx.layout.jobs);
    match action {
        JobAction::Start => {
            let job_id = store.create()?;
            println!("{job_id}");
            let orchestrator = CheckerOrchestrator::with_defaults(ctx.layout.clone(), &ctx.config);
            if let Err(e) = run_check_job(&store, &job_id, &orchestrator) {
                fail_job(&store, &job_id, e.to_string())?;
                return Err(e).context(format!("Job {job_id} failed"));
            }
        }
        JobAction::Status { job_id } => {
            let record = store
                .load(&job_id)
                .with_context(|| format!("Unknown job {job_id}"))?;
            write_json(&record, None)?;
        }
    }
    Ok(())
}
