use crate::criticality::{
    ColumnOperation, CriticalityFinding, CriticalityLevel, CriticalityReport, FindingKind,
    RerunRisk,
};
use crate::errors::{GuardResult, IoResultExt};
use crate::transfer::ColumnPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationAction {
    BackupAndRestore,
    ValidateReferences,
    AddIndexes,
}

impl TransformationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationAction::BackupAndRestore => "backup_and_restore",
            TransformationAction::ValidateReferences => "validate_references",
            TransformationAction::AddIndexes => "add_indexes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformation {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub migration: String,
    pub table: Option<String>,
    pub column: Option<String>,
    pub action: TransformationAction,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub table: String,
    pub preserve_data: bool,
    pub migrations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub table: String,
    pub column: String,
    pub renamed_to: Option<String>,
    pub action: ColumnOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationTime {
    Fast,
    Moderate,
    Slow,
    VerySlow,
}

impl fmt::Display for MigrationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationTime::Fast => "FAST",
            MigrationTime::Moderate => "MODERATE",
            MigrationTime::Slow => "SLOW",
            MigrationTime::VerySlow => "VERY_SLOW",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: RerunRisk,
    pub data_loss_potential: bool,
    pub constraint_violations: bool,
    pub performance_impact: bool,
    pub estimated_migration_time: MigrationTime,
}

impl RiskAssessment {
    fn from_report(report: &CriticalityReport) -> Self {
        let performance_impact = report
            .findings()
            .any(|f| matches!(f.kind, FindingKind::Performance | FindingKind::MissingIndex));

        let (overall_risk, data_loss_potential, constraint_violations, estimated_migration_time) =
            match report.highest_level() {
                Some(CriticalityLevel::Critical) => {
                    (RerunRisk::Extreme, true, false, MigrationTime::VerySlow)
                }
                Some(CriticalityLevel::High) => (RerunRisk::High, false, true, MigrationTime::Slow),
                Some(CriticalityLevel::Medium) => {
                    (RerunRisk::Medium, false, false, MigrationTime::Moderate)
                }
                _ => (RerunRisk::Low, false, false, MigrationTime::Fast),
            };

        Self {
            overall_risk,
            data_loss_potential,
            constraint_violations,
            performance_impact,
            estimated_migration_time,
        }
    }
}

/// Plan for carrying row data across a migration re-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStrategy {
    pub backup_id: String,
    pub mappings_required: bool,
    pub table_mappings: BTreeMap<String, TableMapping>,
    pub column_mappings: Vec<ColumnMapping>,
    pub data_transformations: Vec<DataTransformation>,
    pub risk_assessment: RiskAssessment,
}

impl MappingStrategy {
    /// Renames and drops to apply per table when re-importing rows.
    pub fn column_plans(&self) -> BTreeMap<String, ColumnPlan> {
        let mut plans: BTreeMap<String, ColumnPlan> = BTreeMap::new();
        for mapping in &self.column_mappings {
            let plan = plans.entry(mapping.table.clone()).or_default();
            match (mapping.action, &mapping.renamed_to) {
                (ColumnOperation::Rename, Some(to)) => {
                    plan.renames.insert(mapping.column.clone(), to.clone());
                }
                (ColumnOperation::Drop, _) => {
                    plan.drops.insert(mapping.column.clone());
                }
                _ => {}
            }
        }
        plans.retain(|_, plan| !plan.is_empty());
        plans
    }

    pub fn load(path: &Path) -> GuardResult<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> GuardResult<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?).with_path(path)
    }
}

/// Derive a mapping strategy from a criticality report.
pub fn create_data_mapping_strategy(report: &CriticalityReport, backup_id: &str) -> MappingStrategy {
    let mut table_mappings: BTreeMap<String, TableMapping> = BTreeMap::new();
    let mut column_mappings = Vec::new();
    let mut data_transformations = Vec::new();

    for finding in report.findings() {
        let action = match finding.kind {
            FindingKind::DataLoss => {
                record_data_loss(finding, &mut table_mappings, &mut column_mappings);
                TransformationAction::BackupAndRestore
            }
            FindingKind::ForeignKey => TransformationAction::ValidateReferences,
            FindingKind::MissingIndex => TransformationAction::AddIndexes,
            _ => continue,
        };
        data_transformations.push(DataTransformation {
            kind: finding.kind,
            migration: finding.subject.migration.clone(),
            table: finding.subject.table.clone(),
            column: finding.subject.column.clone(),
            action,
            reason: finding.description.clone(),
        });
    }

    let mappings_required = !table_mappings.is_empty()
        || !column_mappings.is_empty()
        || !data_transformations.is_empty();

    let strategy = MappingStrategy {
        backup_id: backup_id.to_string(),
        mappings_required,
        table_mappings,
        column_mappings,
        data_transformations,
        risk_assessment: RiskAssessment::from_report(report),
    };
    debug!(
        backup_id,
        transformations = strategy.data_transformations.len(),
        risk = %strategy.risk_assessment.overall_risk,
        "Data mapping strategy created"
    );
    strategy
}

fn record_data_loss(
    finding: &CriticalityFinding,
    tables: &mut BTreeMap<String, TableMapping>,
    columns: &mut Vec<ColumnMapping>,
) {
    let subject = &finding.subject;
    let Some(table) = &subject.table else {
        return;
    };

    let mapping = tables.entry(table.clone()).or_insert_with(|| TableMapping {
        table: table.clone(),
        preserve_data: true,
        migrations: Vec::new(),
    });
    if !mapping.migrations.contains(&subject.migration) {
        mapping.migrations.push(subject.migration.clone());
    }

    if let Some(column) = &subject.column {
        let action = subject.operation.unwrap_or(if subject.renamed_to.is_some() {
            ColumnOperation::Rename
        } else {
            ColumnOperation::Drop
        });
        columns.push(ColumnMapping {
            table: table.clone(),
            column: column.clone(),
            renamed_to: subject.renamed_to.clone(),
            action,
        });
    }
}
