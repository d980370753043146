use super::finding::{CriticalityFinding, CriticalityLevel, FindingKind, FindingSubject};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationPriority {
    Immediate,
    High,
    Medium,
    Low,
}

impl RecommendationPriority {
    pub fn label(&self) -> &'static str {
        match self {
            RecommendationPriority::Immediate => "IMMEDIATE",
            RecommendationPriority::High => "HIGH",
            RecommendationPriority::Medium => "MEDIUM",
            RecommendationPriority::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub action: String,
    pub reason: String,
}

/// Overall verdict on re-running the analysed migrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RerunRisk {
    Extreme,
    High,
    Medium,
    Low,
    #[default]
    Minimal,
}

impl RerunRisk {
    pub fn label(&self) -> &'static str {
        match self {
            RerunRisk::Extreme => "EXTREME",
            RerunRisk::High => "HIGH",
            RerunRisk::Medium => "MEDIUM",
            RerunRisk::Low => "LOW",
            RerunRisk::Minimal => "MINIMAL",
        }
    }
}

impl fmt::Display for RerunRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalityReport {
    pub critical: Vec<CriticalityFinding>,
    pub high: Vec<CriticalityFinding>,
    pub medium: Vec<CriticalityFinding>,
    pub low: Vec<CriticalityFinding>,
    pub least: Vec<CriticalityFinding>,
    pub migration_count: usize,
    pub issues_found: usize,
    pub recommendations: Vec<Recommendation>,
    pub data_mapping_required: bool,
    pub rerun_risk_level: RerunRisk,
    /// Set when the analysis could not run at all; the buckets are then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CriticalityReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn bucket(&self, level: CriticalityLevel) -> &[CriticalityFinding] {
        match level {
            CriticalityLevel::Critical => &self.critical,
            CriticalityLevel::High => &self.high,
            CriticalityLevel::Medium => &self.medium,
            CriticalityLevel::Low => &self.low,
            CriticalityLevel::Least => &self.least,
        }
    }

    fn bucket_mut(&mut self, level: CriticalityLevel) -> &mut Vec<CriticalityFinding> {
        match level {
            CriticalityLevel::Critical => &mut self.critical,
            CriticalityLevel::High => &mut self.high,
            CriticalityLevel::Medium => &mut self.medium,
            CriticalityLevel::Low => &mut self.low,
            CriticalityLevel::Least => &mut self.least,
        }
    }

    pub fn push(&mut self, finding: CriticalityFinding) {
        self.bucket_mut(finding.level).push(finding);
    }

    /// Every finding, most severe bucket first.
    pub fn findings(&self) -> impl Iterator<Item = &CriticalityFinding> {
        CriticalityLevel::DESCENDING
            .into_iter()
            .flat_map(move |level| self.bucket(level).iter())
    }

    pub fn has_kind(&self, kind: FindingKind) -> bool {
        self.findings().any(|f| f.kind == kind)
    }

    pub fn highest_level(&self) -> Option<CriticalityLevel> {
        CriticalityLevel::DESCENDING
            .into_iter()
            .find(|level| !self.bucket(*level).is_empty())
    }

    /// Append the integrity roll-ups and compute every derived field.
    pub(crate) fn finalize(&mut self) {
        if !self.critical.is_empty() {
            let count = self.critical.len();
            self.push(CriticalityFinding::new(
                CriticalityLevel::Critical,
                FindingKind::DataIntegrityCritical,
                format!("{count} critical issue(s) threaten data integrity if migrations are rerun"),
                FindingSubject::default(),
            ));
        }
        if !self.high.is_empty() {
            let count = self.high.len();
            self.push(CriticalityFinding::new(
                CriticalityLevel::High,
                FindingKind::DataIntegrityHigh,
                format!("{count} high-risk issue(s) may cause data loss on rerun"),
                FindingSubject::default(),
            ));
        }

        self.rerun_risk_level = rerun_risk(self.highest_level());
        let data_mapping_required = self.findings().any(|f| f.kind.requires_data_mapping());
        let issues_found = self.findings().count();
        self.data_mapping_required = data_mapping_required;
        self.issues_found = issues_found;
        self.recommendations = recommendations(self);
    }
}

/// Least-only findings still count as a minimal rerun risk.
pub fn rerun_risk(highest: Option<CriticalityLevel>) -> RerunRisk {
    match highest {
        Some(CriticalityLevel::Critical) => RerunRisk::Extreme,
        Some(CriticalityLevel::High) => RerunRisk::High,
        Some(CriticalityLevel::Medium) => RerunRisk::Medium,
        Some(CriticalityLevel::Low) => RerunRisk::Low,
        Some(CriticalityLevel::Least) | None => RerunRisk::Minimal,
    }
}

fn recommendations(report: &CriticalityReport) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if !report.critical.is_empty() {
        out.push(Recommendation {
            priority: RecommendationPriority::Immediate,
            action: "Do not rerun migrations".into(),
            reason: "Critical issues detected that could cause data loss or corruption".into(),
        });
    }
    if !report.high.is_empty() {
        out.push(Recommendation {
            priority: RecommendationPriority::High,
            action: "Create a full database backup before any migration".into(),
            reason: "High-risk operations may lose data".into(),
        });
    }
    if report.data_mapping_required {
        out.push(Recommendation {
            priority: RecommendationPriority::Medium,
            action: "Implement data mapping before rerunning migrations".into(),
            reason: "Schema changes require row data to be preserved and remapped".into(),
        });
    }
    out.push(Recommendation {
        priority: RecommendationPriority::Low,
        action: "Review migration code quality".into(),
        reason: "Improves maintainability and reduces future risk".into(),
    });

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(level: CriticalityLevel, kind: FindingKind) -> CriticalityFinding {
        CriticalityFinding::new(level, kind, "x", FindingSubject::migration("m.php"))
    }

    #[test]
    fn test_empty_report_is_minimal_with_low_recommendation() {
        let mut report = CriticalityReport::default();
        report.finalize();
        assert_eq!(report.rerun_risk_level, RerunRisk::Minimal);
        assert!(!report.data_mapping_required);
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].priority, RecommendationPriority::Low);
    }

    #[test]
    fn test_least_alone_is_minimal() {
        let mut report = CriticalityReport::default();
        report.push(finding(CriticalityLevel::Least, FindingKind::CodeQuality));
        report.finalize();
        assert_eq!(report.rerun_risk_level, RerunRisk::Minimal);
        assert_eq!(report.issues_found, 1);
    }

    #[test]
    fn test_critical_adds_rollup_and_immediate_first() {
        let mut report = CriticalityReport::default();
        report.push(finding(CriticalityLevel::Critical, FindingKind::SyntaxError));
        report.push(finding(CriticalityLevel::High, FindingKind::DataLoss));
        report.finalize();

        assert_eq!(report.rerun_risk_level, RerunRisk::Extreme);
        assert_eq!(report.critical.len(), 2);
        assert_eq!(report.critical[1].kind, FindingKind::DataIntegrityCritical);
        assert_eq!(report.high[1].kind, FindingKind::DataIntegrityHigh);
        assert_eq!(report.issues_found, 4);

        let priorities: Vec<_> = report.recommendations.iter().map(|r| r.priority).collect();
        assert_eq!(
            priorities,
            vec![
                RecommendationPriority::Immediate,
                RecommendationPriority::High,
                RecommendationPriority::Medium,
                RecommendationPriority::Low,
            ]
        );
    }

    #[test]
    fn test_data_mapping_required_follows_kinds() {
        for (kind, expected) in [
            (FindingKind::MissingIndex, true),
            (FindingKind::ForeignKey, true),
            (FindingKind::NamingConvention, false),
            (FindingKind::DependencyConflict, false),
        ] {
            let mut report = CriticalityReport::default();
            report.push(finding(CriticalityLevel::Medium, kind));
            report.finalize();
            assert_eq!(report.data_mapping_required, expected, "{kind}");
            assert_eq!(report.rerun_risk_level, RerunRisk::Medium);
        }
    }
}
