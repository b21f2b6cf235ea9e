//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Harness configuration loading and validation."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

/// Address every harness publishes events on unless configured otherwise.
pub const DEFAULT_EVENTS_ADDRESS: &str = "events";

fn default_events_address() -> String {
    DEFAULT_EVENTS_ADDRESS.to_owned()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Top-level configuration consumed by harness instances and runner tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Channel address carrying test events in both directions.
    #[serde(default = "default_events_address")]
    pub events_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`HarnessConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedHarnessConfig {
    pub config: HarnessConfig,
    pub source: PathBuf,
}

impl HarnessConfig {
    pub const ENV_CONFIG_PATH: &str = "TESTBUS_CONFIG";

    /// Load configuration from disk, respecting the `TESTBUS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedHarnessConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<HarnessConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.events_address.trim().is_empty() {
            return Err(anyhow!("events_address must not be empty"));
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            events_address: default_events_address(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for HarnessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HarnessConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Where and how log records are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directory for the daily rolling JSON log. `None` keeps logs on stdout only.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: HarnessConfig = "".parse().expect("parse empty config");
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.events_address, DEFAULT_EVENTS_ADDRESS);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn parses_address_and_logging_section() {
        let config: HarnessConfig = r#"
events_address = "suite.events"

[logging]
format = "structured-json"
directory = "target/test-logs"
file_prefix = "suite"
"#
        .parse()
        .expect("parse config");
        assert_eq!(config.events_address, "suite.events");
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert_eq!(
            config.logging.directory.as_deref(),
            Some(Path::new("target/test-logs"))
        );
        assert_eq!(config.logging.file_prefix.as_deref(), Some("suite"));
    }

    #[test]
    fn blank_address_is_rejected() {
        let err = "events_address = \"  \"".parse::<HarnessConfig>().unwrap_err();
        assert!(err.to_string().contains("events_address"));
    }

    #[test]
    fn load_picks_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("harness.toml");
        fs::write(&present, "events_address = \"from-file\"\n").expect("write config");

        let loaded =
            HarnessConfig::load_with_source(&[missing, present.clone()]).expect("load config");
        assert_eq!(loaded.source, present);
        assert_eq!(loaded.config.events_address, "from-file");
    }

    #[test]
    fn load_reports_inspected_paths_when_nothing_exists() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope.toml");
        let err = HarnessConfig::load(&[missing]).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
