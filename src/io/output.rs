use crate::core::{Issue, Severity};
use crate::criticality::{CriticalityLevel, CriticalityReport, RecommendationPriority, RerunRisk};
use crate::ledger::IssueLedger;
use colored::*;
use comfy_table::{Cell, Table};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
    Terminal,
}

pub trait ReportWriter {
    fn write_issues(&mut self, ledger: &IssueLedger) -> anyhow::Result<()>;

    fn write_criticality(&mut self, report: &CriticalityReport) -> anyhow::Result<()>;
}

pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ReportWriter for JsonWriter<W> {
    fn write_issues(&mut self, ledger: &IssueLedger) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, ledger)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_criticality(&mut self, report: &CriticalityReport) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, report)?;
        writeln!(self.writer)?;
        Ok(())
    }
}

pub struct MarkdownWriter<W: Write> {
    writer: W,
}

impl<W: Write> MarkdownWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_issue_summary(&mut self, ledger: &IssueLedger) -> anyhow::Result<()> {
        let stats = ledger.stats();
        writeln!(self.writer, "## Summary")?;
        writeln!(self.writer)?;
        writeln!(self.writer, "| Category | Issues |")?;
        writeln!(self.writer, "|----------|--------|")?;
        for (category, count) in &stats.by_category {
            writeln!(self.writer, "| {category} | {count} |")?;
        }
        writeln!(self.writer, "| **Total** | **{}** |", stats.total_issues)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_issue_list(&mut self, ledger: &IssueLedger) -> anyhow::Result<()> {
        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
            let issues = ledger.issues_by_severity(severity);
            if issues.is_empty() {
                continue;
            }
            writeln!(self.writer, "### {} ({})", capitalize(severity.as_str()), issues.len())?;
            writeln!(self.writer)?;
            for issue in issues {
                let fix = if issue.improvement.as_ref().is_some_and(|i| i.can_auto_fix) {
                    " (auto-fix available)"
                } else {
                    ""
                };
                writeln!(
                    self.writer,
                    "- [ ] `{}` {} [{}]{fix}",
                    location(issue),
                    issue.message,
                    issue.issue_type
                )?;
            }
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

impl<W: Write> ReportWriter for MarkdownWriter<W> {
    fn write_issues(&mut self, ledger: &IssueLedger) -> anyhow::Result<()> {
        writeln!(self.writer, "# Schemaguard Issue Report")?;
        writeln!(self.writer)?;
        if ledger.is_empty() {
            writeln!(self.writer, "No issues found.")?;
            return Ok(());
        }
        self.write_issue_summary(ledger)?;
        self.write_issue_list(ledger)
    }

    fn write_criticality(&mut self, report: &CriticalityReport) -> anyhow::Result<()> {
        writeln!(self.writer, "# Migration Criticality Report")?;
        writeln!(self.writer)?;
        if let Some(error) = &report.error {
            writeln!(self.writer, "Analysis failed: {error}")?;
            return Ok(());
        }

        writeln!(self.writer, "| Metric | Value |")?;
        writeln!(self.writer, "|--------|-------|")?;
        writeln!(self.writer, "| Migrations | {} |", report.migration_count)?;
        writeln!(self.writer, "| Findings | {} |", report.issues_found)?;
        writeln!(self.writer, "| Rerun risk | {} |", report.rerun_risk_level)?;
        writeln!(
            self.writer,
            "| Data mapping required | {} |",
            if report.data_mapping_required { "yes" } else { "no" }
        )?;
        writeln!(self.writer)?;

        for level in CriticalityLevel::DESCENDING {
            let findings = report.bucket(level);
            if findings.is_empty() {
                continue;
            }
            writeln!(self.writer, "## {} ({})", level.label(), findings.len())?;
            writeln!(self.writer)?;
            for finding in findings {
                let subject = &finding.subject;
                let place = match subject.line {
                    Some(line) => format!("{}:{line}", subject.migration),
                    None => subject.migration.clone(),
                };
                if place.is_empty() {
                    writeln!(self.writer, "- **{}** {}", finding.kind, finding.description)?;
                } else {
                    writeln!(
                        self.writer,
                        "- **{}** `{place}` {}",
                        finding.kind, finding.description
                    )?;
                }
            }
            writeln!(self.writer)?;
        }

        writeln!(self.writer, "## Recommendations")?;
        writeln!(self.writer)?;
        for (i, rec) in report.recommendations.iter().enumerate() {
            writeln!(
                self.writer,
                "{}. **{}**: {} ({})",
                i + 1,
                rec.priority.label(),
                rec.action,
                rec.reason
            )?;
        }
        Ok(())
    }
}

pub struct TerminalWriter<W: Write> {
    writer: W,
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ReportWriter for TerminalWriter<W> {
    fn write_issues(&mut self, ledger: &IssueLedger) -> anyhow::Result<()> {
        writeln!(self.writer, "{}", "Schemaguard Issue Report".bold().blue())?;
        writeln!(self.writer, "{}", "========================".blue())?;
        writeln!(self.writer)?;

        if ledger.is_empty() {
            writeln!(self.writer, "{} No issues found", "✓".green())?;
            return Ok(());
        }

        let mut table = Table::new();
        table.set_header(vec!["Severity", "Category", "Type", "Location", "Message"]);
        for issue in ledger.issues() {
            table.add_row(vec![
                Cell::new(issue.effective_severity().as_str()),
                Cell::new(&issue.category),
                Cell::new(&issue.issue_type),
                Cell::new(location(issue)),
                Cell::new(&issue.message),
            ]);
        }
        writeln!(self.writer, "{table}")?;
        writeln!(self.writer)?;

        let fixable = ledger.fixable_improvements().count();
        let total = ledger.len().to_string();
        let total = match ledger.highest_severity() {
            Some(Severity::Critical) | Some(Severity::High) => total.red(),
            Some(Severity::Medium) => total.yellow(),
            _ => total.green(),
        };
        writeln!(self.writer, "Total issues: {total} ({fixable} auto-fixable)")?;
        Ok(())
    }

    fn write_criticality(&mut self, report: &CriticalityReport) -> anyhow::Result<()> {
        writeln!(self.writer, "{}", "Migration Criticality Report".bold().blue())?;
        writeln!(self.writer, "{}", "============================".blue())?;
        writeln!(self.writer)?;

        if let Some(error) = &report.error {
            writeln!(self.writer, "{} {error}", "✗".red())?;
            return Ok(());
        }

        writeln!(self.writer, "  Migrations analysed: {}", report.migration_count)?;
        writeln!(self.writer, "  Findings: {}", report.issues_found)?;
        writeln!(self.writer, "  Rerun risk: {}", colored_risk(report.rerun_risk_level))?;
        writeln!(
            self.writer,
            "  Data mapping required: {}",
            if report.data_mapping_required { "yes".yellow() } else { "no".green() }
        )?;
        writeln!(self.writer)?;

        if report.issues_found > 0 {
            let mut table = Table::new();
            table.set_header(vec!["Level", "Type", "Migration", "Line", "Description"]);
            for finding in report.findings() {
                table.add_row(vec![
                    Cell::new(finding.level.label()),
                    Cell::new(finding.kind.as_str()),
                    Cell::new(&finding.subject.migration),
                    Cell::new(finding.subject.line.map(|l| l.to_string()).unwrap_or_default()),
                    Cell::new(&finding.description),
                ]);
            }
            writeln!(self.writer, "{table}")?;
            writeln!(self.writer)?;
        }

        writeln!(self.writer, "{}", "Recommendations:".bold())?;
        for rec in &report.recommendations {
            let priority = match rec.priority {
                RecommendationPriority::Immediate => rec.priority.label().red().bold(),
                RecommendationPriority::High => rec.priority.label().red(),
                RecommendationPriority::Medium => rec.priority.label().yellow(),
                RecommendationPriority::Low => rec.priority.label().normal(),
            };
            writeln!(self.writer, "  [{priority}] {} - {}", rec.action, rec.reason)?;
        }
        Ok(())
    }
}

fn colored_risk(risk: RerunRisk) -> ColoredString {
    match risk {
        RerunRisk::Extreme => risk.label().red().bold(),
        RerunRisk::High => risk.label().red(),
        RerunRisk::Medium => risk.label().yellow(),
        RerunRisk::Low | RerunRisk::Minimal => risk.label().green(),
    }
}

fn location(issue: &Issue) -> String {
    match (issue.file(), issue.line()) {
        (Some(file), Some(line)) if line > 0 => format!("{file}:{line}"),
        (Some(file), _) => file.to_string(),
        _ => "-".to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Writer for `format`, targeting `output` when given and stdout otherwise.
pub fn create_writer(
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<Box<dyn ReportWriter>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    Ok(match format {
        OutputFormat::Json => Box::new(JsonWriter::new(sink)),
        OutputFormat::Markdown => Box::new(MarkdownWriter::new(sink)),
        OutputFormat::Terminal => Box::new(TerminalWriter::new(sink)),
    })
}
