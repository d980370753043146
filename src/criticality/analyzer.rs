use super::finding::{
    ColumnOperation, CriticalityFinding, CriticalityLevel, FindingKind, FindingSubject,
};
use super::report::CriticalityReport;
use crate::config::ThresholdsConfig;
use crate::extract::{DestructiveKind, MigrationExtractor, MigrationFacts, RegexMigrationExtractor};
use crate::observability::{increment_processed, set_current_file, set_phase, set_progress, Phase};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static MIGRATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}_\d{2}_\d{2}_\d{6}_[a-z0-9_]+\.php$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerSettings {
    pub max_migration_lines: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from(&ThresholdsConfig::default())
    }
}

impl From<&ThresholdsConfig> for AnalyzerSettings {
    fn from(thresholds: &ThresholdsConfig) -> Self {
        Self {
            max_migration_lines: thresholds.max_migration_lines,
        }
    }
}

/// Grades migration files by how dangerous it would be to run them again.
pub struct CriticalityAnalyzer<E = RegexMigrationExtractor> {
    extractor: E,
    settings: AnalyzerSettings,
}

impl CriticalityAnalyzer<RegexMigrationExtractor> {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self::with_extractor(RegexMigrationExtractor::new(), settings)
    }
}

impl<E: MigrationExtractor> CriticalityAnalyzer<E> {
    pub fn with_extractor(extractor: E, settings: AnalyzerSettings) -> Self {
        Self {
            extractor,
            settings,
        }
    }

    /// Analyse every `*.php` file directly inside `dir`, in file-name order.
    pub fn analyze_directory(&self, dir: &Path) -> CriticalityReport {
        let _phase = set_phase(Phase::MigrationAnalysis);

        let files = match list_migrations(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Migration directory unavailable");
                return CriticalityReport::failed(format!(
                    "Migration directory not found: {} ({e})",
                    dir.display()
                ));
            }
        };

        info!(count = files.len(), dir = %dir.display(), "Analyzing migrations");
        set_progress(0, files.len());

        let mut report = CriticalityReport {
            migration_count: files.len(),
            ..Default::default()
        };
        let mut touched: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for path in &files {
            let _file = set_current_file(path.clone());
            let name = file_name(path);

            match std::fs::read_to_string(path) {
                Ok(source) => {
                    let facts = self.extractor.extract(&source);
                    for table in facts.touched_tables() {
                        touched.entry(table.to_string()).or_default().insert(name.clone());
                    }
                    for finding in self.analyze_facts(&name, &facts) {
                        report.push(finding);
                    }
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to read migration");
                    report.push(CriticalityFinding::new(
                        CriticalityLevel::Critical,
                        FindingKind::UnreadableFile,
                        format!("Failed to read migration file: {e}"),
                        FindingSubject::migration(&name),
                    ));
                }
            }
            increment_processed();
        }

        for finding in dependency_conflicts(&touched) {
            report.push(finding);
        }

        report.finalize();
        debug!(
            issues = report.issues_found,
            risk = %report.rerun_risk_level,
            "Criticality analysis complete"
        );
        report
    }

    /// Findings for one migration's source text, without cross-file checks.
    pub fn analyze_source(&self, migration: &str, source: &str) -> Vec<CriticalityFinding> {
        self.analyze_facts(migration, &self.extractor.extract(source))
    }

    fn analyze_facts(&self, migration: &str, facts: &MigrationFacts) -> Vec<CriticalityFinding> {
        let mut findings = Vec::new();
        critical_checks(migration, facts, &mut findings);
        data_loss_checks(migration, facts, &mut findings);
        foreign_key_checks(migration, facts, &mut findings);
        index_checks(migration, facts, &mut findings);
        naming_checks(migration, &mut findings);
        performance_checks(migration, facts, &mut findings);
        self.quality_checks(migration, facts, &mut findings);
        findings
    }

    fn quality_checks(
        &self,
        migration: &str,
        facts: &MigrationFacts,
        out: &mut Vec<CriticalityFinding>,
    ) {
        if facts.line_count > self.settings.max_migration_lines {
            out.push(CriticalityFinding::new(
                CriticalityLevel::Least,
                FindingKind::CodeQuality,
                format!(
                    "Migration is {} lines long (limit {}); consider splitting it",
                    facts.line_count, self.settings.max_migration_lines
                ),
                FindingSubject::migration(migration),
            ));
        }

        if !facts.has_comments {
            if let Some(change) = facts.columns.iter().find(|c| c.is_change) {
                out.push(CriticalityFinding::new(
                    CriticalityLevel::Least,
                    FindingKind::CodeQuality,
                    "Column modification without an explanatory comment",
                    FindingSubject::migration(migration)
                        .table(change.table.as_deref())
                        .column(&change.name)
                        .at(change.line),
                ));
            }
        }
    }
}

fn list_migrations(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "php"))
        .collect();
    files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn critical_checks(migration: &str, facts: &MigrationFacts, out: &mut Vec<CriticalityFinding>) {
    if let Some(err) = &facts.syntax_error {
        out.push(CriticalityFinding::new(
            CriticalityLevel::Critical,
            FindingKind::SyntaxError,
            format!("Syntax error: {}", err.message),
            FindingSubject::migration(migration).at(err.line),
        ));
    }

    if !facts.has_data_migration {
        for drop in facts.dropped_then_recreated() {
            out.push(CriticalityFinding::new(
                CriticalityLevel::Critical,
                FindingKind::UnsafeOperation,
                format!(
                    "Table '{}' is dropped and recreated without preserving its data",
                    drop.table
                ),
                FindingSubject::migration(migration)
                    .table(Some(&drop.table))
                    .at(drop.line),
            ));
        }
    }

    for stmt in &facts.destructive_statements {
        let what = match stmt.kind {
            DestructiveKind::Truncate => "Unconditional TRUNCATE",
            DestructiveKind::DeleteAll => "DELETE without a WHERE clause",
        };
        out.push(CriticalityFinding::new(
            CriticalityLevel::Critical,
            FindingKind::UnsafeOperation,
            format!("{what} removes every row"),
            FindingSubject::migration(migration)
                .table(stmt.table.as_deref())
                .at(stmt.line)
                .snippet(&stmt.snippet),
        ));
    }
}

fn data_loss_checks(migration: &str, facts: &MigrationFacts, out: &mut Vec<CriticalityFinding>) {
    for column in facts.columns.iter().filter(|c| c.is_change) {
        out.push(CriticalityFinding::new(
            CriticalityLevel::High,
            FindingKind::DataLoss,
            format!(
                "Column '{}' type change to {} may truncate or reject existing values",
                column.name, column.column_type
            ),
            FindingSubject::migration(migration)
                .table(column.table.as_deref())
                .column(&column.name)
                .operation(ColumnOperation::TypeChange)
                .at(column.line)
                .snippet(&column.snippet),
        ));
    }

    for dropped in &facts.dropped_columns {
        out.push(CriticalityFinding::new(
            CriticalityLevel::High,
            FindingKind::DataLoss,
            format!("Column drop: '{}' and its data are removed", dropped.column),
            FindingSubject::migration(migration)
                .table(dropped.table.as_deref())
                .column(&dropped.column)
                .operation(ColumnOperation::Drop)
                .at(dropped.line)
                .snippet(&dropped.snippet),
        ));
    }

    if !facts.has_data_migration {
        for rename in &facts.renamed_columns {
            out.push(CriticalityFinding::new(
                CriticalityLevel::High,
                FindingKind::DataLoss,
                format!(
                    "Column rename '{}' -> '{}' without a data migration step",
                    rename.from, rename.to
                ),
                FindingSubject::migration(migration)
                    .table(rename.table.as_deref())
                    .column(&rename.from)
                    .renamed_to(&rename.to)
                    .at(rename.line)
                    .snippet(&rename.snippet),
            ));
        }
    }
}

fn foreign_key_checks(migration: &str, facts: &MigrationFacts, out: &mut Vec<CriticalityFinding>) {
    for fk in &facts.foreign_keys {
        let mut problems = Vec::new();
        if !fk.named {
            problems.push("no explicit constraint name");
        }
        if !fk.on_delete {
            problems.push("no ON DELETE policy");
        }
        if !fk.on_update {
            problems.push("no ON UPDATE policy");
        }
        if problems.is_empty() {
            continue;
        }

        out.push(CriticalityFinding::new(
            CriticalityLevel::High,
            FindingKind::ForeignKey,
            format!(
                "Foreign key on '{}' has {}",
                fk.column,
                problems.join(", ")
            ),
            FindingSubject::migration(migration)
                .table(fk.table.as_deref())
                .column(&fk.column)
                .at(fk.line)
                .snippet(&fk.snippet),
        ));
    }
}

fn index_checks(migration: &str, facts: &MigrationFacts, out: &mut Vec<CriticalityFinding>) {
    let mut reported: BTreeSet<(Option<&str>, &str)> = BTreeSet::new();

    // Only column declarations carry a snippet; an index can be chained onto
    // them but not onto a `foreign(...)` statement.
    let candidates = facts
        .columns
        .iter()
        .filter(|c| c.is_foreign_key_style() && !c.is_change)
        .map(|c| (c.table.as_deref(), c.name.as_str(), c.line, Some(c.snippet.as_str())))
        .chain(
            facts
                .foreign_keys
                .iter()
                .map(|fk| (fk.table.as_deref(), fk.column.as_str(), fk.line, None)),
        );

    for (table, column, line, snippet) in candidates {
        if facts.is_indexed(table, column) || !reported.insert((table, column)) {
            continue;
        }
        let mut subject = FindingSubject::migration(migration)
            .table(table)
            .column(column)
            .at(line);
        subject.snippet = snippet.map(str::to_string);
        out.push(CriticalityFinding::new(
            CriticalityLevel::Medium,
            FindingKind::MissingIndex,
            format!("Foreign key column '{column}' has no index"),
            subject,
        ));
    }
}

fn naming_checks(migration: &str, out: &mut Vec<CriticalityFinding>) {
    if !MIGRATION_NAME.is_match(migration) {
        out.push(CriticalityFinding::new(
            CriticalityLevel::Medium,
            FindingKind::NamingConvention,
            "Migration file name does not follow YYYY_MM_DD_HHMMSS_description.php",
            FindingSubject::migration(migration),
        ));
    }
}

fn performance_checks(migration: &str, facts: &MigrationFacts, out: &mut Vec<CriticalityFinding>) {
    for update in &facts.bulk_updates {
        out.push(CriticalityFinding::new(
            CriticalityLevel::Low,
            FindingKind::Performance,
            "Bulk update without chunking may lock the table",
            FindingSubject::migration(migration)
                .table(update.table.as_deref())
                .at(update.line)
                .snippet(&update.snippet),
        ));
    }

    for column in facts
        .columns
        .iter()
        .filter(|c| c.in_alter && !c.is_change && !c.nullable && !c.has_default)
    {
        out.push(CriticalityFinding::new(
            CriticalityLevel::Low,
            FindingKind::Performance,
            format!(
                "Column '{}' added without a default or nullable; existing rows need a rewrite",
                column.name
            ),
            FindingSubject::migration(migration)
                .table(column.table.as_deref())
                .column(&column.name)
                .at(column.line)
                .snippet(&column.snippet),
        ));
    }
}

fn dependency_conflicts(touched: &BTreeMap<String, BTreeSet<String>>) -> Vec<CriticalityFinding> {
    touched
        .iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(table, files)| {
            let files: Vec<&str> = files.iter().map(String::as_str).collect();
            CriticalityFinding::new(
                CriticalityLevel::Medium,
                FindingKind::DependencyConflict,
                format!(
                    "Table '{table}' is modified by {} migrations: {}",
                    files.len(),
                    files.join(", ")
                ),
                FindingSubject::migration(files.join(", ")).table(Some(table)),
            )
        })
        .collect()
}
