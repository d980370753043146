use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::{SchemaGuardConfig, ThresholdsConfig};
use crate::errors::{GuardError, GuardResult};

pub const CONFIG_FILE_NAME: &str = ".schemaguard.toml";

/// Read config file contents
pub(crate) fn read_config_file(path: &Path) -> Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse and validate config from a TOML string
pub fn parse_and_validate_config(contents: &str) -> Result<SchemaGuardConfig, String> {
    let mut config = toml::from_str::<SchemaGuardConfig>(contents)
        .map_err(|e| format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))?;

    // Zero thresholds would disable chunking or flag every migration
    let defaults = ThresholdsConfig::default();
    if config.thresholds.import_chunk_size == 0 {
        tracing::warn!(
            "import_chunk_size must be positive. Using {}.",
            defaults.import_chunk_size
        );
        config.thresholds.import_chunk_size = defaults.import_chunk_size;
    }
    if config.thresholds.max_migration_lines == 0 {
        tracing::warn!(
            "max_migration_lines must be positive. Using {}.",
            defaults.max_migration_lines
        );
        config.thresholds.max_migration_lines = defaults.max_migration_lines;
    }

    Ok(config)
}

/// Try loading config from a specific path
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<SchemaGuardConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            handle_read_error(config_path, &e);
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            tracing::warn!("{}. Using defaults.", e);
            None
        }
    }
}

/// Handle file read errors with appropriate logging
pub(crate) fn handle_read_error(config_path: &Path, error: &std::io::Error) {
    // Only log actual errors, not "file not found"
    if error.kind() != std::io::ErrorKind::NotFound {
        tracing::warn!(
            "Failed to read config file {}: {}",
            config_path.display(),
            error
        );
    }
}

/// Generate directory ancestors up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Search `start` and its ancestors for `.schemaguard.toml`.
pub fn load_config_from(start: &Path) -> SchemaGuardConfig {
    const MAX_TRAVERSAL_DEPTH: usize = 10;

    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            tracing::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            SchemaGuardConfig::default()
        })
}

pub fn load_config() -> SchemaGuardConfig {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(&dir),
        Err(e) => {
            tracing::warn!(
                "Failed to get current directory: {}. Using default config.",
                e
            );
            SchemaGuardConfig::default()
        }
    }
}

/// Load an explicitly requested config file. Unlike discovery, failures are
/// errors here because the user named the file.
pub fn load_config_from_path_result(path: &Path) -> GuardResult<SchemaGuardConfig> {
    let contents = read_config_file(path).map_err(|source| GuardError::io(path, source))?;
    parse_and_validate_config(&contents).map_err(|message| GuardError::Config {
        message,
        path: Some(path.to_path_buf()),
    })
}
