// Export modules for library usage
pub mod checkers;
pub mod cleanup;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod criticality;
pub mod database;
pub mod errors;
pub mod extract;
pub mod io;
pub mod jobs;
pub mod ledger;
pub mod mapping;
pub mod observability;
pub mod transfer;

// Re-export commonly used types
pub use crate::core::{
    ApplyOutcome, Improvement, Issue, IssueData, IssueDraft, Severity, SuggestedChange,
};

pub use crate::ledger::{IssueLedger, IssueStats};

pub use crate::errors::{GuardError, GuardResult};

pub use crate::checkers::{Checker, CheckerOrchestrator};

pub use crate::criticality::{
    CriticalityAnalyzer, CriticalityFinding, CriticalityLevel, CriticalityReport, FindingKind,
    RerunRisk,
};

pub use crate::mapping::{
    create_data_mapping_strategy, BackupManager, MappingExecutor, MappingStrategy,
};

pub use crate::io::output::{create_writer, OutputFormat, ReportWriter};
