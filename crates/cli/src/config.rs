use anyhow::{Context, Result};
use sigma_rules::validation::ValidationConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CliError;

/// Environment variable naming a validation configuration file.
pub const VALIDATION_CONFIG_ENV: &str = "SIGMA_VALIDATION_CONFIG";

const VALIDATION_CONFIG_FILE: &str = "validation.yml";

/// Locations of persisted CLI configuration.
pub struct CliConfig;

impl CliConfig {
    /// Return the default config directory path: ~/.config/sigma-cli/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("sigma-cli");
        Ok(config_dir)
    }

    /// Return the default validation config file path.
    pub fn default_validation_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join(VALIDATION_CONFIG_FILE))
    }

    /// Pick the validation config to use, if any.
    /// Priority: explicit path (flag or env var) > default file when it exists.
    pub fn locate_validation_config(explicit: Option<&Path>) -> Option<PathBuf> {
        let default = match Self::default_validation_config_path() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(error = %e, "no default validation config location");
                None
            }
        };
        Self::locate_in(explicit, default)
    }

    fn locate_in(explicit: Option<&Path>, default: Option<PathBuf>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        match default {
            Some(path) if path.is_file() => {
                debug!(?path, "Using default validation config");
                Some(path)
            }
            _ => None,
        }
    }

    /// Load and parse a validation config file.
    pub fn load_validation_config(path: &Path) -> Result<ValidationConfig> {
        debug!(?path, "Loading validation config");
        let config = ValidationConfig::from_file(path)
            .map_err(CliError::ValidationConfig)
            .with_context(|| format!("failed to load validation config: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("validation.yml");
        fs::write(&default, "validators: [all]\n").unwrap();

        let explicit = Path::new("custom.yml");
        assert_eq!(
            CliConfig::locate_in(Some(explicit), Some(default)),
            Some(PathBuf::from("custom.yml"))
        );
    }

    #[test]
    fn test_default_used_only_when_present() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("validation.yml");
        assert_eq!(CliConfig::locate_in(None, Some(default.clone())), None);

        fs::write(&default, "validators: [all]\n").unwrap();
        assert_eq!(CliConfig::locate_in(None, Some(default.clone())), Some(default));
        assert_eq!(CliConfig::locate_in(None, None), None);
    }

    #[test]
    fn test_load_validation_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validation.yml");
        fs::write(
            &path,
            "validators:\n  - all\n  - -date_existence\nexclusions:\n  rule-1: attack_tag\n",
        )
        .unwrap();

        let config = CliConfig::load_validation_config(&path).unwrap();
        assert_eq!(config.validators, vec!["all", "-date_existence"]);
        assert_eq!(config.exclusions.len(), 1);
    }

    #[test]
    fn test_invalid_config_is_a_usage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validation.yml");
        fs::write(&path, "validators: [all]\nunknown_key: 1\n").unwrap();

        let err = CliConfig::load_validation_config(&path).unwrap_err();
        let cli = err.downcast_ref::<CliError>().unwrap();
        assert_eq!(cli.exit_code(), crate::error::EXIT_USAGE);
    }

    #[test]
    fn test_default_dir_name() {
        if let Ok(dir) = CliConfig::default_config_dir() {
            assert!(dir.ends_with("sigma-cli"));
        }
    }
}
