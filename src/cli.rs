use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "schemaguard")]
#[command(about = "Migration criticality analyzer and schema-safety toolkit", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project root to analyze
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file (defaults to the nearest .schemaguard.toml)
    #[arg(short, long, global = true, env = "SCHEMAGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Describe what would change without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the project checkers
    Check {
        /// Run only the checker whose name contains this text
        #[arg(long)]
        checker: Option<String>,

        /// Checkers to disable for this run (exact names)
        #[arg(long, value_delimiter = ',')]
        disable: Vec<String>,

        /// Apply auto-fixable improvements
        #[arg(long)]
        fix: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify migrations by how dangerous they are to rerun
    Migrations {
        /// Migration directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create, validate, list and prune database backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Build a data-mapping strategy from the migration analysis
    Strategy {
        /// Backup the strategy restores from (creates a new backup when omitted)
        #[arg(long)]
        backup_id: Option<String>,

        /// Where to write the strategy JSON (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Execute a saved data-mapping strategy
    Execute {
        /// Strategy JSON written by `strategy`
        strategy: PathBuf,

        /// Rows inserted per batch
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Restore every table of a backup verbatim
    Rollback {
        backup_id: String,
    },

    /// Export tables as INSERT statements
    Export {
        /// Destination directory
        #[arg(long)]
        dir: PathBuf,

        /// Tables to export (defaults to all)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },

    /// Import `<table>.sql` files produced by `export`
    Import {
        /// Directory holding the data files
        #[arg(long)]
        dir: PathBuf,

        /// Tables to import (defaults to every data file in the directory)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Rows inserted per batch
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Remove migrations duplicated under a newer timestamp
    CleanupMigrations,

    /// Background check jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Initialize a new schemaguard configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupAction {
    /// Dump every table with its schema and a hashed manifest
    Create,
    /// Verify a backup's data files against its manifest
    Validate { backup_id: String },
    /// List backups, newest first
    List,
    /// Remove backups older than the age limit
    Cleanup {
        /// Defaults to `thresholds.backup_max_age_days`
        #[arg(long)]
        max_age_days: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobAction {
    /// Run a full check pass, recording progress in a job file
    Start,
    /// Print a job's status record
    Status { job_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
    Terminal,
}

impl From<OutputFormat> for crate::io::output::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => crate::io::output::OutputFormat::Json,
            OutputFormat::Markdown => crate::io::output::OutputFormat::Markdown,
            OutputFormat::Terminal => crate::io::output::OutputFormat::Terminal,
        }
    }
}
