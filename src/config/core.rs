use serde::{Deserialize, Serialize};

/// Root configuration structure for schemaguard
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SchemaGuardConfig {
    /// Project-relative locations of the framework's conventional directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Database used for backups and data mapping
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Thresholds for analysis and the import/backup workflow
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Checker enable/disable configuration
    #[serde(default)]
    pub checkers: CheckersConfig,

    /// Ignore patterns
    #[serde(default)]
    pub ignore: Option<IgnoreConfig>,
}

impl SchemaGuardConfig {
    /// Get ignore patterns from configuration
    ///
    /// Returns the glob patterns excluded from checker file walks, or an
    /// empty vector when none are configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use schemaguard::config::SchemaGuardConfig;
    /// let config = SchemaGuardConfig::default();
    /// assert!(config.get_ignore_patterns().is_empty());
    /// ```
    pub fn get_ignore_patterns(&self) -> Vec<String> {
        self.ignore
            .as_ref()
            .map(|ig| ig.patterns.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub migrations: String,
    pub models: String,
    pub controllers: String,
    pub views: String,
    pub app: String,
    pub backups: String,
    pub jobs: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            migrations: "database/migrations".into(),
            models: "app/Models".into(),
            controllers: "app/Http/Controllers".into(),
            views: "resources/views".into(),
            app: "app".into(),
            backups: "storage/schemaguard/backups".into(),
            jobs: "storage/schemaguard/jobs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// One of `sqlite`, `mysql`, `pgsql`
    pub driver: String,
    /// SQLite database file, relative to the project root
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "sqlite".into(),
            path: "database/database.sqlite".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Migration files longer than this are flagged as a code-quality finding
    pub max_migration_lines: usize,
    /// Rows inserted per batch when re-importing backed-up data
    pub import_chunk_size: usize,
    /// Backups older than this are removed by `backup cleanup`
    pub backup_max_age_days: u32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            max_migration_lines: 300,
            import_chunk_size: 1000,
            backup_max_age_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckersConfig {
    /// Checker names disabled at startup (exact match)
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IgnoreConfig {
    pub patterns: Vec<String>,
}
