//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::HlinkConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HlinkConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: HlinkConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlink.toml");
        std::fs::write(&path, "").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.transaction.port, crate::proto::TRANSACTION_PORT);
        assert_eq!(config.http.port, crate::proto::HTTP_PORT);
        assert!(config.titles.is_empty());
    }

    #[test]
    fn test_titles_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlink.toml");
        std::fs::write(
            &path,
            r#"
[[titles]]
id = 4097
name = "First"
installed = "/title/1001"

[[titles]]
id = 4098
name = "Second"
media = "nand"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.titles.len(), 2);
        assert_eq!(config.titles[0].id, 4097);
        assert!(config.titles[0].location().is_some());
        assert!(config.titles[1].location().is_none());
    }

    #[test]
    fn test_validation_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlink.toml");
        std::fs::write(&path, "[transaction]\nread_timeout_ms = 0\n").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/hlink.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
