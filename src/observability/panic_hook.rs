//! Custom panic hook producing a structured crash report.
//!
//! The report names the phase, file and table that were being processed so a
//! crash during a backup or import can be traced to its input.

use super::context::{get_current_context, get_progress, OperationContext};
use std::panic::PanicHookInfo;
use tracing::Span;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const RULE: &str = "════════════════════════════════════════════════════════════════════════════════";

/// Install the crash-report hook. Call early in `main`.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        print_crash_report(info);
    }));
}

fn print_crash_report(info: &PanicHookInfo<'_>) {
    let context = get_current_context();
    let (processed, total) = get_progress();

    eprintln!();
    eprintln!("{RULE}");
    eprintln!("  SCHEMAGUARD CRASH REPORT");
    eprintln!("  Version: {VERSION}");
    eprintln!("  Platform: {}", std::env::consts::OS);
    eprintln!(
        "  Time: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    eprintln!("{RULE}");
    print_panic_details(info);
    print_context_section(&context, processed, total);

    if std::env::var("RUST_BACKTRACE").is_ok() {
        eprintln!("{}", std::backtrace::Backtrace::capture());
    } else {
        eprintln!("  Run with RUST_BACKTRACE=1 for stack trace");
    }
    eprintln!("{RULE}");
}

fn print_panic_details(info: &PanicHookInfo<'_>) {
    eprintln!("  PANIC: {}", truncate(&extract_panic_message(info), 68));
    if let Some(location) = info.location() {
        eprintln!(
            "  Location: {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
    }
}

fn print_context_section(context: &OperationContext, processed: usize, total: usize) {
    eprintln!("  OPERATION CONTEXT:");
    match &context.phase {
        Some(phase) => eprintln!("    Phase: {phase}"),
        None => eprintln!("    Phase: (not set)"),
    }

    let current_span = Span::current();
    if let Some(metadata) = current_span.metadata() {
        eprintln!("    Span: {}", truncate(metadata.name(), 67));
    }
    if let Some(file) = &context.current_file {
        eprintln!("    File: {}", file.display());
    }
    if let Some(table) = &context.current_table {
        eprintln!("    Table: {table}");
    }
    if total > 0 {
        let pct = (processed as f64 / total as f64 * 100.0) as usize;
        eprintln!("    Progress: {processed} / {total} ({pct}%)");
    }
}

fn extract_panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
