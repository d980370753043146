use super::Checker;
use crate::config::ProjectLayout;
use crate::core::{Improvement, IssueData, Severity};
use crate::criticality::{
    AnalyzerSettings, CriticalityAnalyzer, CriticalityFinding, CriticalityLevel, FindingKind,
};
use crate::ledger::IssueLedger;
use tracing::warn;

const CATEGORY: &str = "migrations";

/// Reports criticality findings for the migration directory as issues.
pub struct MigrationChecker {
    enabled: bool,
    analyzer: CriticalityAnalyzer,
}

impl MigrationChecker {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self {
            enabled: true,
            analyzer: CriticalityAnalyzer::new(settings),
        }
    }
}

impl Checker for MigrationChecker {
    fn name(&self) -> &str {
        "Migration Checker"
    }

    fn description(&self) -> &str {
        "Flags destructive, unindexed or fragile schema migrations"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn check(&self, layout: &ProjectLayout) -> IssueLedger {
        let mut ledger = IssueLedger::new();
        let report = self.analyzer.analyze_directory(&layout.migrations);
        if let Some(error) = &report.error {
            warn!(error = %error, "Skipping migration checks");
            return ledger;
        }

        for finding in report.findings() {
            if matches!(
                finding.kind,
                FindingKind::DataIntegrityCritical | FindingKind::DataIntegrityHigh
            ) {
                continue;
            }
            ledger.add_issue(CATEGORY, finding.kind.as_str(), issue_data(layout, finding));
            if let Some(improvement) = index_improvement(layout, finding) {
                ledger.attach_improvement_to_last_issue(improvement);
            }
        }
        ledger
    }
}

fn severity_for(level: CriticalityLevel) -> Severity {
    match level {
        CriticalityLevel::Critical => Severity::Critical,
        CriticalityLevel::High => Severity::High,
        CriticalityLevel::Medium => Severity::Medium,
        CriticalityLevel::Low | CriticalityLevel::Least => Severity::Low,
    }
}

fn issue_data(layout: &ProjectLayout, finding: &CriticalityFinding) -> IssueData {
    let subject = &finding.subject;
    let file = layout.migrations.join(&subject.migration);
    let mut data = IssueData::new(finding.description.clone())
        .with_severity(severity_for(finding.level))
        .with_context("file", layout.relative(&file).display().to_string())
        .with_context("criticality", finding.level.label());
    if let Some(line) = subject.line {
        data = data.with_context("line", line);
    }
    if let Some(table) = &subject.table {
        data = data.with_context("table", table.as_str());
    }
    if let Some(column) = &subject.column {
        data = data.with_context("column", column.as_str());
    }
    data
}

/// Chain `->index()` onto an unindexed column declaration.
fn index_improvement(layout: &ProjectLayout, finding: &CriticalityFinding) -> Option<Improvement> {
    if finding.kind != FindingKind::MissingIndex {
        return None;
    }
    let snippet = finding.subject.snippet.as_deref()?;
    let column = finding.subject.column.as_deref().unwrap_or("column");
    let improvement = Improvement::new(
        layout.migrations.join(&finding.subject.migration),
        "add_index",
        Severity::Medium,
        format!("Index `{column}`"),
        format!("Add an index to `{column}` so lookups and joins on it stay fast"),
        format!("{snippet};"),
        format!("{snippet}->index();"),
    );
    Some(match finding.subject.line {
        Some(line) => improvement.at_line(line),
        None => improvement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaGuardConfig;
    use crate::core::ApplyOutcome;
    use indoc::indoc;

    const ORDERS: &str = indoc! {r#"
        <?php

        return new class extends Migration
        {
            public function up(): void
            {
                Schema::create('orders', function (Blueprint $table) {
                    $table->id();
                    $table->unsignedBigInteger('customer_id');
                    $table->timestamps();
                });
            }

            public function down(): void
            {
                Schema::dropIfExists('orders');
            }
        };
    "#};

    fn project(source: &str) -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path(), &SchemaGuardConfig::default());
        std::fs::create_dir_all(&layout.migrations).unwrap();
        std::fs::write(
            layout.migrations.join("2024_01_01_000000_create_orders_table.php"),
            source,
        )
        .unwrap();
        (dir, layout)
    }

    #[test]
    fn test_missing_index_gets_an_applicable_fix() {
        let (_dir, layout) = project(ORDERS);
        let checker = MigrationChecker::new(AnalyzerSettings::default());
        let ledger = checker.check(&layout);

        let issues = ledger.issues_by_type("missing_index");
        assert_eq!(issues.len(), 1);
        let issue = issues[0];
        assert_eq!(
            issue.file(),
            Some("database/migrations/2024_01_01_000000_create_orders_table.php")
        );
        assert_eq!(issue.effective_severity(), Severity::Medium);

        let improvement = issue.improvement.as_ref().unwrap();
        assert!(improvement.can_auto_fix);
        assert_eq!(
            improvement.apply(false).unwrap(),
            ApplyOutcome::Applied { replacements: 1 }
        );

        let rewritten = std::fs::read_to_string(&improvement.file).unwrap();
        assert!(rewritten.contains("$table->unsignedBigInteger('customer_id')->index();"));
        assert!(checker.check(&layout).issues_by_type("missing_index").is_empty());
    }

    #[test]
    fn test_integrity_rollups_are_not_reported_as_issues() {
        let (_dir, layout) = project(indoc! {r#"
            <?php
            return new class extends Migration
            {
                public function up(): void
                {
                    DB::table('orders')->truncate();
                }
            };
        "#});
        let ledger = MigrationChecker::new(AnalyzerSettings::default()).check(&layout);

        assert_eq!(ledger.issues_by_type("unsafe_operation").len(), 1);
        assert!(ledger.issues_by_type("data_integrity_critical").is_empty());
        assert_eq!(ledger.highest_severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_missing_directory_yields_no_issues() {
        let layout = ProjectLayout::new("/no/such/project", &SchemaGuardConfig::default());
        let ledger = MigrationChecker::new(AnalyzerSettings::default()).check(&layout);
        assert!(ledger.is_empty());
    }
}
