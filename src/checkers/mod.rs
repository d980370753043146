//! Project checkers and the orchestrator that runs them.
//!
//! Each checker owns its enabled flag and reports into a fresh
//! [`IssueLedger`]; the orchestrator concatenates ledgers in registration
//! order.

pub mod migration;
pub mod model;
pub mod orchestrator;
pub mod performance;
pub mod security;

pub use migration::MigrationChecker;
pub use model::ModelChecker;
pub use orchestrator::CheckerOrchestrator;
pub use performance::PerformanceChecker;
pub use security::SecurityChecker;

use crate::config::ProjectLayout;
use crate::core::{IssueData, Severity};
use crate::ledger::IssueLedger;
use std::path::Path;
use tracing::warn;

pub trait Checker {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn check(&self, layout: &ProjectLayout) -> IssueLedger;
}

/// Issue data pointing at a line of a project file.
pub(crate) fn file_issue(
    layout: &ProjectLayout,
    path: &Path,
    line: usize,
    message: impl Into<String>,
    severity: Severity,
) -> IssueData {
    IssueData::new(message)
        .with_severity(severity)
        .with_context("file", layout.relative(path).display().to_string())
        .with_context("line", line)
}

/// Read a source file, recording an issue instead of failing when it cannot
/// be read.
pub(crate) fn read_source(
    layout: &ProjectLayout,
    path: &Path,
    category: &str,
    ledger: &mut IssueLedger,
) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to read file");
            ledger.add_issue(
                category,
                "unreadable_file",
                file_issue(layout, path, 0, format!("Failed to read file: {e}"), Severity::High),
            );
            None
        }
    }
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}
