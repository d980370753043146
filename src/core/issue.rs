use super::improvement::Improvement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Free-form key/value context attached to an issue (file, line, table...).
pub type IssueContext = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Payload of an issue before the ledger stamps category, type and time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IssueData {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: IssueContext,
}

impl IssueData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// An issue as handed over by a checker or an external source. Drafts lacking
/// a category or a type are rejected by [`crate::ledger::IssueLedger::add_issues`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IssueDraft {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub issue_type: Option<String>,
    #[serde(flatten)]
    pub data: IssueData,
}

impl IssueDraft {
    pub fn new(category: impl Into<String>, issue_type: impl Into<String>, data: IssueData) -> Self {
        Self {
            category: Some(category.into()),
            issue_type: Some(issue_type.into()),
            data,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.category.as_deref().is_some_and(|c| !c.is_empty())
            && self.issue_type.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub category: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: IssueContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<Improvement>,
    pub timestamp: DateTime<Utc>,
}

impl Issue {
    /// Severity used for filtering and display; absent severity counts as medium.
    pub fn effective_severity(&self) -> Severity {
        self.severity.unwrap_or_default()
    }

    pub fn file(&self) -> Option<&str> {
        self.context.get("file").and_then(|v| v.as_str())
    }

    pub fn line(&self) -> Option<u64> {
        self.context.get("line").and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_is_totally_ordered() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::default(), Severity::Medium);
    }

    #[test]
    fn test_severity_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_drafts_need_category_and_type() {
        let data = IssueData::new("msg");
        assert!(IssueDraft::new("models", "mass_assignment", data.clone()).is_well_formed());

        let missing_type = IssueDraft {
            category: Some("models".into()),
            issue_type: None,
            data: data.clone(),
        };
        assert!(!missing_type.is_well_formed());

        let empty_category = IssueDraft {
            category: Some(String::new()),
            issue_type: Some("x".into()),
            data,
        };
        assert!(!empty_category.is_well_formed());
    }

    #[test]
    fn test_draft_deserializes_from_loose_json() {
        let draft: IssueDraft = serde_json::from_str(
            r#"{"category":"security","type":"sql_injection","message":"raw query","severity":"high"}"#,
        )
        .unwrap();
        assert!(draft.is_well_formed());
        assert_eq!(draft.data.severity, Some(Severity::High));
    }
}
