//! Append-only issue store with incrementally maintained statistics.

use crate::core::{Improvement, Issue, IssueData, IssueDraft, Severity};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueStats {
    pub total_issues: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    /// Only issues that declared a severity are counted here.
    pub by_severity: BTreeMap<Severity, usize>,
}

impl IssueStats {
    fn record(&mut self, issue: &Issue) {
        self.total_issues += 1;
        *self.by_category.entry(issue.category.clone()).or_default() += 1;
        *self.by_type.entry(issue.issue_type.clone()).or_default() += 1;
        if let Some(severity) = issue.severity {
            *self.by_severity.entry(severity).or_default() += 1;
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IssueLedger {
    issues: Vec<Issue>,
    stats: IssueStats,
}

impl IssueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, category: &str, issue_type: &str, data: IssueData) {
        let issue = Issue {
            category: category.to_string(),
            issue_type: issue_type.to_string(),
            message: data.message,
            severity: data.severity,
            context: data.context,
            improvement: None,
            timestamp: Utc::now(),
        };
        self.stats.record(&issue);
        self.issues.push(issue);
    }

    /// Add every well-formed draft; drafts without a category or a type are
    /// dropped without error. Returns how many were added.
    pub fn add_issues(&mut self, drafts: impl IntoIterator<Item = IssueDraft>) -> usize {
        let mut added = 0;
        for draft in drafts {
            if !draft.is_well_formed() {
                debug!(message = %draft.data.message, "Dropping issue without category/type");
                continue;
            }
            let (Some(category), Some(issue_type)) = (draft.category, draft.issue_type) else {
                continue;
            };
            self.add_issue(&category, &issue_type, draft.data);
            added += 1;
        }
        added
    }

    /// Append an already-stamped issue, keeping its timestamp and improvement.
    fn push_issue(&mut self, issue: Issue) {
        self.stats.record(&issue);
        self.issues.push(issue);
    }

    /// Append all issues of `other`, preserving their order.
    pub fn merge(&mut self, other: IssueLedger) {
        for issue in other.issues {
            self.push_issue(issue);
        }
    }

    /// Attach a fix to the most recently added issue. No-op when empty.
    pub fn attach_improvement_to_last_issue(&mut self, improvement: Improvement) {
        if let Some(last) = self.issues.last_mut() {
            last.improvement = Some(improvement);
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn stats(&self) -> &IssueStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues_by_category(&self, category: &str) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.category == category).collect()
    }

    pub fn issues_by_type(&self, issue_type: &str) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| i.issue_type == issue_type)
            .collect()
    }

    pub fn issues_by_severity(&self, severity: Severity) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| i.effective_severity() == severity)
            .collect()
    }

    /// Issues carrying an auto-fixable improvement.
    pub fn fixable_improvements(&self) -> impl Iterator<Item = &Improvement> {
        self.issues
            .iter()
            .filter_map(|i| i.improvement.as_ref())
            .filter(|imp| imp.can_auto_fix)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(Issue::effective_severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn data(sev: Option<Severity>) -> IssueData {
        IssueData {
            message: "m".into(),
            severity: sev,
            context: Default::default(),
        }
    }

    #[test]
    fn test_add_issue_updates_every_counter() {
        let mut ledger = IssueLedger::new();
        ledger.add_issue("models", "mass_assignment", data(Some(Severity::High)));
        ledger.add_issue("models", "mass_assignment", data(None));
        ledger.add_issue("security", "sql_injection", data(Some(Severity::Critical)));

        let stats = ledger.stats();
        assert_eq!(stats.total_issues, 3);
        assert_eq!(stats.by_category["models"], 2);
        assert_eq!(stats.by_type["sql_injection"], 1);
        assert_eq!(stats.by_severity.get(&Severity::High), Some(&1));
        assert_eq!(stats.by_severity.get(&Severity::Medium), None);
        assert_eq!(stats.by_severity.values().sum::<usize>(), 2);
    }

    #[test]
    fn test_missing_severity_filters_as_medium() {
        let mut ledger = IssueLedger::new();
        ledger.add_issue("a", "t", data(None));
        ledger.add_issue("a", "t", data(Some(Severity::Low)));
        assert_eq!(ledger.issues_by_severity(Severity::Medium).len(), 1);
        assert_eq!(ledger.issues_by_severity(Severity::Low).len(), 1);
        assert_eq!(ledger.issues_by_category("a").len(), 2);
        assert_eq!(ledger.issues_by_type("t").len(), 2);
    }

    #[test]
    fn test_malformed_drafts_are_dropped_silently() {
        let mut ledger = IssueLedger::new();
        let drafts = vec![
            IssueDraft::new("views", "unescaped_output", data(None)),
            IssueDraft {
                category: None,
                issue_type: Some("orphan".into()),
                data: data(None),
            },
            IssueDraft {
                category: None,
                issue_type: None,
                data: data(None),
            },
        ];
        assert_eq!(ledger.add_issues(drafts), 1);
        assert_eq!(ledger.stats().total_issues, 1);
    }

    #[test]
    fn test_attach_on_empty_ledger_is_noop() {
        let mut ledger = IssueLedger::new();
        let fix = Improvement::new("f.php", "t", Severity::Low, "t", "d", "a", "b");
        ledger.attach_improvement_to_last_issue(fix);
        assert!(ledger.is_empty());
        assert_eq!(ledger.stats().total_issues, 0);
    }

    #[test]
    fn test_attach_targets_last_issue_only() {
        let mut ledger = IssueLedger::new();
        ledger.add_issue("a", "first", data(None));
        ledger.add_issue("a", "second", data(None));
        let fix = Improvement::new("f.php", "t", Severity::Low, "t", "d", "a", "b");
        ledger.attach_improvement_to_last_issue(fix);

        assert!(ledger.issues()[0].improvement.is_none());
        assert!(ledger.issues()[1].improvement.is_some());
        assert_eq!(ledger.fixable_improvements().count(), 1);
    }

    #[test]
    fn test_merge_keeps_order_and_stats() {
        let mut left = IssueLedger::new();
        left.add_issue("a", "one", data(Some(Severity::Low)));
        let mut right = IssueLedger::new();
        right.add_issue("b", "two", data(Some(Severity::High)));

        left.merge(right);
        let types: Vec<_> = left.issues().iter().map(|i| i.issue_type.as_str()).collect();
        assert_eq!(types, vec!["one", "two"]);
        assert_eq!(left.stats().total_issues, 2);
        assert_eq!(left.highest_severity(), Some(Severity::High));
    }

    proptest! {
        #[test]
        fn test_total_counts_only_well_formed(good in 0usize..40, bad in 0usize..40) {
            let mut ledger = IssueLedger::new();
            let mut drafts = Vec::new();
            for i in 0..good {
                drafts.push(IssueDraft::new("cat", format!("t{}", i % 3), data(None)));
            }
            for _ in 0..bad {
                drafts.push(IssueDraft { category: Some("cat".into()), issue_type: None, data: data(None) });
            }
            ledger.add_issues(drafts);
            prop_assert_eq!(ledger.stats().total_issues, good);
            prop_assert_eq!(ledger.len(), good);
            prop_assert_eq!(ledger.stats().by_type.values().sum::<usize>(), good);
        }
    }
}
