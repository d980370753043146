use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How dangerous it is to re-run a migration that produced a finding.
///
/// Declared from least to most severe so the derived `Ord` gives
/// `Critical > High > Medium > Low > Least`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticalityLevel {
    Least,
    Low,
    Medium,
    High,
    Critical,
}

impl CriticalityLevel {
    /// All levels, most severe first.
    pub const DESCENDING: [CriticalityLevel; 5] = [
        CriticalityLevel::Critical,
        CriticalityLevel::High,
        CriticalityLevel::Medium,
        CriticalityLevel::Low,
        CriticalityLevel::Least,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CriticalityLevel::Critical => "CRITICAL",
            CriticalityLevel::High => "HIGH",
            CriticalityLevel::Medium => "MEDIUM",
            CriticalityLevel::Low => "LOW",
            CriticalityLevel::Least => "LEAST",
        }
    }
}

impl fmt::Display for CriticalityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SyntaxError,
    UnsafeOperation,
    UnreadableFile,
    DataLoss,
    ForeignKey,
    MissingIndex,
    NamingConvention,
    Performance,
    CodeQuality,
    DependencyConflict,
    DataIntegrityCritical,
    DataIntegrityHigh,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::SyntaxError => "syntax_error",
            FindingKind::UnsafeOperation => "unsafe_operation",
            FindingKind::UnreadableFile => "unreadable_file",
            FindingKind::DataLoss => "data_loss",
            FindingKind::ForeignKey => "foreign_key",
            FindingKind::MissingIndex => "missing_index",
            FindingKind::NamingConvention => "naming_convention",
            FindingKind::Performance => "performance",
            FindingKind::CodeQuality => "code_quality",
            FindingKind::DependencyConflict => "dependency_conflict",
            FindingKind::DataIntegrityCritical => "data_integrity_critical",
            FindingKind::DataIntegrityHigh => "data_integrity_high",
        }
    }

    /// Kinds whose presence means row data has to be carried across a re-run.
    pub fn requires_data_mapping(&self) -> bool {
        matches!(
            self,
            FindingKind::DataLoss | FindingKind::ForeignKey | FindingKind::MissingIndex
        )
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the column a data-loss finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOperation {
    Drop,
    Rename,
    TypeChange,
}

/// What a finding is about, captured when the finding is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSubject {
    /// Migration file name (several, comma separated, for cross-file findings)
    pub migration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<ColumnOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl FindingSubject {
    pub fn migration(migration: impl Into<String>) -> Self {
        Self {
            migration: migration.into(),
            ..Default::default()
        }
    }

    pub fn table(mut self, table: Option<impl Into<String>>) -> Self {
        self.table = table.map(Into::into);
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn renamed_to(mut self, to: impl Into<String>) -> Self {
        self.renamed_to = Some(to.into());
        self.operation = Some(ColumnOperation::Rename);
        self
    }

    pub fn operation(mut self, operation: ColumnOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalityFinding {
    pub level: CriticalityLevel,
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub description: String,
    pub subject: FindingSubject,
    pub timestamp: DateTime<Utc>,
}

impl CriticalityFinding {
    pub fn new(
        level: CriticalityLevel,
        kind: FindingKind,
        description: impl Into<String>,
        subject: FindingSubject,
    ) -> Self {
        Self {
            level,
            kind,
            description: description.into(),
            subject,
            timestamp: Utc::now(),
        }
    }
}
