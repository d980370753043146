//! Proposed automatic fixes and their best-effort application.
//!
//! Applying an improvement is a literal substring replacement in the target
//! file. Nothing here understands PHP; a fix that no longer matches the file
//! is skipped rather than treated as an error.

use super::issue::Severity;
use crate::errors::{GuardResult, IoResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestedChange {
    pub search: String,
    pub replace: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Improvement {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(rename = "type")]
    pub improvement_type: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub can_auto_fix: bool,
    pub original_code: String,
    pub improved_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_changes: Option<SuggestedChange>,
}

/// What happened when an improvement was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The file was rewritten; `replacements` occurrences were substituted.
    Applied { replacements: usize },
    /// Dry-run: the file would have been rewritten.
    WouldApply { replacements: usize },
    /// Nothing was written.
    Skipped { reason: String },
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ApplyOutcome::Skipped { .. })
    }
}

impl Improvement {
    /// Build an improvement; `can_auto_fix` is derived from the code pair and
    /// the search/replace suggestion mirrors it.
    pub fn new(
        file: impl Into<PathBuf>,
        improvement_type: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        original_code: impl Into<String>,
        improved_code: impl Into<String>,
    ) -> Self {
        let original_code = original_code.into();
        let improved_code = improved_code.into();
        let can_auto_fix = !original_code.is_empty() && !improved_code.is_empty();
        let suggested_changes = can_auto_fix.then(|| SuggestedChange {
            search: original_code.clone(),
            replace: improved_code.clone(),
        });

        Self {
            file: file.into(),
            line: None,
            improvement_type: improvement_type.into(),
            severity,
            title: title.into(),
            description: description.into(),
            can_auto_fix,
            original_code,
            improved_code,
            suggested_changes,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Replace every occurrence of `original_code` with `improved_code` in the
    /// target file. In dry-run mode the file is left untouched.
    pub fn apply(&self, dry_run: bool) -> GuardResult<ApplyOutcome> {
        if !self.can_auto_fix {
            return Ok(skipped("improvement is not auto-fixable"));
        }
        if !self.file.is_file() {
            warn!(file = %self.file.display(), "Improvement target missing");
            return Ok(skipped(format!("file {} not found", self.file.display())));
        }

        let content = std::fs::read_to_string(&self.file).with_path(&self.file)?;
        let replacements = content.matches(self.original_code.as_str()).count();
        if replacements == 0 {
            debug!(file = %self.file.display(), title = %self.title, "Original code not found");
            return Ok(skipped("original code not found in file"));
        }

        if dry_run {
            return Ok(ApplyOutcome::WouldApply { replacements });
        }

        let updated = content.replace(self.original_code.as_str(), &self.improved_code);
        write_atomically(&self.file, &updated)?;
        Ok(ApplyOutcome::Applied { replacements })
    }
}

fn skipped(reason: impl Into<String>) -> ApplyOutcome {
    ApplyOutcome::Skipped {
        reason: reason.into(),
    }
}

fn write_atomically(path: &Path, content: &str) -> GuardResult<()> {
    let tmp = path.with_extension("schemaguard.tmp");
    std::fs::write(&tmp, content).with_path(&tmp)?;
    std::fs::rename(&tmp, path).with_path(path)
}
