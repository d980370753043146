//! Logging setup and crash-report context.
//!
//! Install the panic hook and the subscriber at startup:
//!
//! ```ignore
//! use schemaguard::observability::{init_logging, install_panic_hook};
//!
//! fn main() {
//!     install_panic_hook();
//!     init_logging(1);
//! }
//! ```
//!
//! Track context during long operations:
//!
//! ```ignore
//! use schemaguard::observability::{set_current_table, set_phase, Phase};
//!
//! let _phase = set_phase(Phase::Backup);
//! for table in tables {
//!     let _table = set_current_table(&table);
//!     dump_table(&table)?;
//! }
//! ```

pub mod context;
pub mod logging;
pub mod panic_hook;

pub use context::{
    get_current_context, get_progress, increment_processed, set_current_file, set_current_table,
    set_phase, set_progress, ContextGuard, OperationContext, Phase,
};
pub use logging::init_logging;
pub use panic_hook::install_panic_hook;
