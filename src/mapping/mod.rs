//! Backup, data-mapping strategy and strategy execution.
//!
//! The usual flow is: analyse migrations, create a backup, derive a
//! [`MappingStrategy`] from the report, re-run the migrations, then execute
//! the strategy to carry rows across. [`MappingExecutor::rollback`] restores a
//! backup verbatim when something goes wrong.

pub mod backup;
pub mod executor;
pub mod strategy;

pub use backup::{hash_file, Backup, BackupCleanup, BackupManager, BackupManifest, TableBackup};
pub use executor::{
    ExecutionResult, ExecutionStep, ExecutorOptions, MappingExecutor, RollbackResult,
};
pub use strategy::{
    create_data_mapping_strategy, ColumnMapping, DataTransformation, MappingStrategy,
    MigrationTime, RiskAssessment, TableMapping, TransformationAction,
};
