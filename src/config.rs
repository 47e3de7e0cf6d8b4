//! Run configuration: where records go and how the executor merges inputs and rules.
//!
//! Loaded from a `.json` or `.toon` file; every field has a default, CLI flags override.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::rules::MergePolicy;

pub const DEFAULT_REGISTRATION_HOST: &str = "http://typed-pid-maker.datamanager.kit.edu/preview";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("unsupported config file {0}, expected .json or .toon")]
    UnsupportedExtension(PathBuf),
}

/// How inputs are handed to designs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputDistribution {
    /// Designs consume the inputs that are still left; the first design takes them all.
    #[default]
    Drain,
    /// Every design sees every input.
    Broadcast,
}

impl FromStr for InputDistribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drain" => Ok(InputDistribution::Drain),
            "broadcast" => Ok(InputDistribution::Broadcast),
            other => Err(format!("unknown input distribution '{other}', expected drain or broadcast")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub host: String,
    /// Ask the service to validate without creating identifiers.
    pub dryrun: bool,
    pub timeout_secs: u64,
    /// Skip the service and map every record to its own provisional pid.
    pub offline: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REGISTRATION_HOST.to_string(),
            dryrun: false,
            timeout_secs: 60,
            offline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registration: RegistrationConfig,
    /// Directory for `records.json`, `mappings.json` and `api_response.json`.
    pub output_dir: PathBuf,
    pub merge_policy: MergePolicy,
    pub input_distribution: InputDistribution,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registration: RegistrationConfig::default(),
            output_dir: PathBuf::from("."),
            merge_policy: MergePolicy::default(),
            input_distribution: InputDistribution::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |message: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?,
            Some("toon") => toon_format::decode_default(&text).map_err(|e| invalid(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedExtension(path.to_path_buf())),
        };
        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_preview_service() {
        let c = Config::default();
        assert_eq!(c.registration.host, DEFAULT_REGISTRATION_HOST);
        assert!(!c.registration.dryrun);
        assert!(!c.registration.offline);
        assert_eq!(c.merge_policy, MergePolicy::LastWriteWins);
        assert_eq!(c.input_distribution, InputDistribution::Drain);
        assert_eq!(c.output_dir, PathBuf::from("."));
    }

    #[test]
    fn partial_json_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{"merge_policy": "multi-valued", "registration": {"dryrun": true}}"#,
        )
        .unwrap();

        let c = Config::load(&path).unwrap();
        assert_eq!(c.merge_policy, MergePolicy::MultiValued);
        assert!(c.registration.dryrun);
        assert_eq!(c.registration.host, DEFAULT_REGISTRATION_HOST);
        assert_eq!(c.input_distribution, InputDistribution::Drain);
    }

    #[test]
    fn toon_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toon");
        fs::write(
            &path,
            r#"output_dir: "out"
merge_policy: "reject-on-conflict"
input_distribution: "broadcast"
registration:
  dryrun: true
  offline: true
"#,
        )
        .unwrap();

        let c = Config::load(&path).unwrap();
        assert_eq!(c.output_dir, PathBuf::from("out"));
        assert_eq!(c.merge_policy, MergePolicy::RejectOnConflict);
        assert_eq!(c.input_distribution, InputDistribution::Broadcast);
        assert!(c.registration.dryrun);
        assert!(c.registration.offline);
        assert_eq!(c.registration.host, DEFAULT_REGISTRATION_HOST);
        assert_eq!(c.registration.timeout_secs, 60);
    }

    #[test]
    fn input_distribution_parses_config_spelling() {
        assert_eq!("drain".parse(), Ok(InputDistribution::Drain));
        assert_eq!("broadcast".parse(), Ok(InputDistribution::Broadcast));
        assert!("all".parse::<InputDistribution>().is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        fs::write(&path, "a: 1").unwrap();
        assert!(matches!(
            Config::load(&path).unwrap_err(),
            ConfigError::UnsupportedExtension(_)
        ));
    }
}
