//! Thread-local operation context for crash reports.
//!
//! Records which phase schemaguard is in and which file or table it is
//! working on, so a panic report can say where it happened. Guards restore
//! the previous context on drop.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static ITEMS_PROCESSED: AtomicUsize = AtomicUsize::new(0);
static ITEMS_TOTAL: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_CONTEXT: RefCell<OperationContext> = const { RefCell::new(OperationContext::new()) };
}

#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub phase: Option<Phase>,
    pub current_file: Option<PathBuf>,
    pub current_table: Option<String>,
}

impl OperationContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            current_file: None,
            current_table: None,
        }
    }
}

/// Major stages of a schemaguard run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Running checker plugins over the project tree
    Checking,
    /// Scanning migration files for criticality findings
    MigrationAnalysis,
    /// Dumping tables into a backup
    Backup,
    /// Building or executing a data-mapping strategy
    DataMapping,
    /// Applying data statements to the database
    Import,
    /// Removing redundant migrations
    Cleanup,
    /// Writing reports
    OutputGeneration,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checking => write!(f, "checking"),
            Self::MigrationAnalysis => write!(f, "migration_analysis"),
            Self::Backup => write!(f, "backup"),
            Self::DataMapping => write!(f, "data_mapping"),
            Self::Import => write!(f, "import"),
            Self::Cleanup => write!(f, "cleanup"),
            Self::OutputGeneration => write!(f, "output_generation"),
        }
    }
}

pub struct ContextGuard {
    previous: OperationContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = self.previous.clone();
        });
    }
}

fn update_context(apply: impl FnOnce(&mut OperationContext)) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        apply(&mut ctx.borrow_mut());
        ContextGuard { previous }
    })
}

/// Set the current phase until the guard drops.
#[must_use]
pub fn set_phase(phase: Phase) -> ContextGuard {
    update_context(|ctx| ctx.phase = Some(phase))
}

#[must_use]
pub fn set_current_file(path: impl Into<PathBuf>) -> ContextGuard {
    let path = path.into();
    update_context(|ctx| ctx.current_file = Some(path))
}

#[must_use]
pub fn set_current_table(table: impl Into<String>) -> ContextGuard {
    let table = table.into();
    update_context(|ctx| ctx.current_table = Some(table))
}

pub fn set_progress(processed: usize, total: usize) {
    ITEMS_PROCESSED.store(processed, Ordering::Relaxed);
    ITEMS_TOTAL.store(total, Ordering::Relaxed);
}

pub fn increment_processed() {
    ITEMS_PROCESSED.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn get_current_context() -> OperationContext {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

#[must_use]
pub fn get_progress() -> (usize, usize) {
    (
        ITEMS_PROCESSED.load(Ordering::Relaxed),
        ITEMS_TOTAL.load(Ordering::Relaxed),
    )
}

pub fn reset_context() {
    CURRENT_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = OperationContext::new();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_guard_restores_previous() {
        reset_context();

        let _outer = set_phase(Phase::MigrationAnalysis);
        {
            let _inner = set_phase(Phase::Backup);
            assert_eq!(get_current_context().phase, Some(Phase::Backup));
        }
        assert_eq!(get_current_context().phase, Some(Phase::MigrationAnalysis));
    }

    #[test]
    fn test_nested_file_and_table() {
        reset_context();

        let _phase = set_phase(Phase::Import);
        let _file = set_current_file("/backups/b1/users.sql");
        let _table = set_current_table("users");

        let ctx = get_current_context();
        assert_eq!(ctx.phase, Some(Phase::Import));
        assert_eq!(ctx.current_file, Some(PathBuf::from("/backups/b1/users.sql")));
        assert_eq!(ctx.current_table.as_deref(), Some("users"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::MigrationAnalysis.to_string(), "migration_analysis");
        assert_eq!(Phase::DataMapping.to_string(), "data_mapping");
    }

    #[test]
    fn test_empty_context_by_default() {
        reset_context();
        let ctx = get_current_context();
        assert!(ctx.phase.is_none());
        assert!(ctx.current_file.is_none());
        assert!(ctx.current_table.is_none());
    }
}
