pub mod output;
pub mod walker;

pub use output::{create_writer, OutputFormat, ReportWriter};
pub use walker::FileWalker;
