use crate::config::CONFIG_FILE_NAME;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"# Schemaguard Configuration

[paths]
migrations = "database/migrations"
models = "app/Models"
controllers = "app/Http/Controllers"
views = "resources/views"
app = "app"
backups = "storage/schemaguard/backups"
jobs = "storage/schemaguard/jobs"

[database]
driver = "sqlite"
path = "database/database.sqlite"

[thresholds]
max_migration_lines = 300
import_chunk_size = 1000
backup_max_age_days = 30

[checkers]
disabled = []

[ignore]
patterns = [
    "vendor/**",
    "node_modules/**",
    "storage/**",
]
"#;

pub fn init_config(project: &Path, force: bool) -> Result<PathBuf> {
    let config_path = project.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created {CONFIG_FILE_NAME} configuration file");

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_and_validate_config, SchemaGuardConfig};

    #[test]
    fn test_default_config_parses_to_defaults_plus_ignores() {
        let config = parse_and_validate_config(DEFAULT_CONFIG).unwrap();
        let defaults = SchemaGuardConfig::default();
        assert_eq!(config.paths, defaults.paths);
        assert_eq!(config.database, defaults.database);
        assert_eq!(config.thresholds, defaults.thresholds);
        assert_eq!(config.get_ignore_patterns().len(), 3);
    }

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        assert!(init_config(dir.path(), false).is_err());
        assert!(init_config(dir.path(), true).is_ok());
    }
}
