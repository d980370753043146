// Core configuration types
mod core;
mod layout;
mod loader;

// Re-export core types
pub use self::core::{
    CheckersConfig, DatabaseConfig, IgnoreConfig, PathsConfig, SchemaGuardConfig,
    ThresholdsConfig,
};

pub use layout::ProjectLayout;

// Re-export loader functions
pub use loader::{
    directory_ancestors, load_config, load_config_from, load_config_from_path_result,
    parse_and_validate_config, CONFIG_FILE_NAME,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_ignore_patterns_with_patterns() {
        let config = SchemaGuardConfig {
            ignore: Some(IgnoreConfig {
                patterns: vec!["vendor/**".to_string(), "*.min.js".to_string()],
            }),
            ..Default::default()
        };
        let patterns = config.get_ignore_patterns();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.contains(&"vendor/**".to_string()));
    }

    #[test]
    fn test_get_ignore_patterns_without_ignore_config() {
        let config = SchemaGuardConfig::default();
        assert!(config.get_ignore_patterns().is_empty());
    }
}
