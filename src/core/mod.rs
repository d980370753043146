//! Core issue model shared by checkers, the ledger and the output writers.

pub mod improvement;
pub mod issue;

pub use improvement::{ApplyOutcome, Improvement, SuggestedChange};
pub use issue::{Issue, IssueContext, IssueData, IssueDraft, Severity};
