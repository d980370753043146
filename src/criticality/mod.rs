//! Migration criticality analysis.
//!
//! Findings are bucketed into five tiers. The report's derived fields
//! (rerun risk, data-mapping flag, recommendations) are computed once, after
//! the cross-file pass and the integrity roll-ups.

pub mod analyzer;
pub mod finding;
pub mod report;

pub use analyzer::{AnalyzerSettings, CriticalityAnalyzer};
pub use finding::{
    ColumnOperation, CriticalityFinding, CriticalityLevel, FindingKind, FindingSubject,
};
pub use report::{
    rerun_risk, CriticalityReport, Recommendation, RecommendationPriority, RerunRisk,
};
