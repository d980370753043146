//! File-backed status records for long-running check passes.
//!
//! A job is one JSON file at `<jobs_dir>/<job_id>.json`, rewritten after
//! every checker so another process can poll it.

use crate::checkers::CheckerOrchestrator;
use crate::errors::{GuardResult, IoResultExt};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    /// Percentage, 0 to 100
    pub progress: u8,
    pub message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn job_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }

    /// Register a pending job and return its id.
    pub fn create(&self) -> GuardResult<String> {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let job_id = format!("job_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), suffix);
        self.save(&JobRecord {
            job_id: job_id.clone(),
            status: JobStatus::Pending,
            progress: 0,
            message: "Queued".into(),
            updated_at: Utc::now(),
            result: None,
        })?;
        info!(job_id = %job_id, "Created job");
        Ok(job_id)
    }

    pub fn load(&self, job_id: &str) -> GuardResult<JobRecord> {
        let path = self.job_path(job_id);
        let contents = std::fs::read_to_string(&path).with_path(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, record: &JobRecord) -> GuardResult<()> {
        std::fs::create_dir_all(&self.dir).with_path(&self.dir)?;
        let path = self.job_path(&record.job_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(record)?).with_path(&tmp)?;
        std::fs::rename(&tmp, &path).with_path(&path)
    }

    fn update(&self, job_id: &str, status: JobStatus, progress: u8, message: String) {
        let record = JobRecord {
            job_id: job_id.to_string(),
            status,
            progress,
            message,
            updated_at: Utc::now(),
            result: None,
        };
        if let Err(e) = self.save(&record) {
            warn!(job_id, error = %e, "Failed to update job status");
        }
    }
}

/// Run every enabled checker for `job_id`, recording progress after each one.
/// The finished record carries the issue statistics as its result.
pub fn run_check_job(
    store: &JobStore,
    job_id: &str,
    orchestrator: &CheckerOrchestrator,
) -> GuardResult<JobRecord> {
    // Fails early for an unknown job.
    store.load(job_id)?;
    store.update(job_id, JobStatus::Running, 0, "Running checkers".into());

    let ledger = orchestrator.run_all_checks_with_progress(|done, total, name| {
        let progress = percent(done, total);
        store.update(job_id, JobStatus::Running, progress, format!("Finished {name}"));
    });

    let record = JobRecord {
        job_id: job_id.to_string(),
        status: JobStatus::Completed,
        progress: 100,
        message: format!("Found {} issues", ledger.len()),
        updated_at: Utc::now(),
        result: Some(serde_json::to_value(ledger.stats())?),
    };
    store.save(&record)?;
    info!(job_id, issues = ledger.len(), "Job completed");
    Ok(record)
}

/// Mark a job as failed with `message`.
pub fn fail_job(store: &JobStore, job_id: &str, message: impl Into<String>) -> GuardResult<()> {
    let mut record = store.load(job_id)?;
    record.status = JobStatus::Failed;
    record.message = message.into();
    record.updated_at = Utc::now();
    store.save(&record)
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}
