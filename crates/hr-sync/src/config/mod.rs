//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
source:
  host: mssql.internal
  database: hr
  user: sa
  password: secret
target:
  host: pg.internal
  database: hr_combined
  user: postgres
  password: secret
"#;

    #[test]
    fn test_minimal_yaml_gets_defaults() {
        let config = Config::from_yaml(MINIMAL_YAML).unwrap();

        assert_eq!(config.source.r#type, "mssql");
        assert_eq!(config.source.port, 1433);
        assert_eq!(config.source.schema, "dbo");
        assert!(config.source.encrypt);
        assert!(!config.source.trust_server_cert);

        assert_eq!(config.target.r#type, "postgres");
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");

        assert_eq!(config.sync.query_timeout_secs, 3600);
        assert_eq!(config.sync.workers, 1);
    }

    #[test]
    fn test_sync_section_overrides() {
        let yaml = format!("{}\nsync:\n  workers: 4\n  query_timeout_secs: 120\n", MINIMAL_YAML);
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.sync.workers, 4);
        assert_eq!(config.sync.query_timeout_secs, 120);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(Config::from_yaml("source: [").is_err());
    }

    #[test]
    fn test_missing_sections_rejected() {
        assert!(Config::from_yaml("source:\n  host: x\n").is_err());
    }
}
