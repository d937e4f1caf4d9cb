//! Configuration structure for fhirut
//!
//! ## Example Configuration (fhirut.yaml)
//!
//! ```yaml
//! validator:
//!   java: java
//!   jar: lib/validator_cli.jar
//!   fhirVersion: 4.0.1
//!   timeoutSecs: 30
//!   env:
//!     JAVA_TOOL_OPTIONS: -Dfile.encoding=UTF-8
//!
//! runner:
//!   jobs: 1
//!   testDir: .
//!   definitionsDir: test-definitions
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FhirutError;
use crate::result::Result;

/// FHIR version the validator is pinned to unless configured otherwise
pub const DEFAULT_FHIR_VERSION: &str = "4.0.1";

/// Wall-clock budget for a single validator run
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment override that forces the JVM to emit UTF-8
pub const UTF8_ENV_VAR: &str = "JAVA_TOOL_OPTIONS";
pub const UTF8_ENV_VALUE: &str = "-Dfile.encoding=UTF-8";

/// Top-level fhirut configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FhirutConfig {
    /// How to launch the external validator
    pub validator: ValidatorConfig,

    /// How test batches are discovered and scheduled
    pub runner: RunnerConfig,
}

/// External validator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    /// Java launcher
    pub java: String,

    /// Path to the HL7 validator_cli.jar
    pub jar: PathBuf,

    /// Arguments passed to the JVM before `-jar`
    pub jvm_args: Vec<String>,

    /// Value of the `-version` flag
    pub fhir_version: String,

    pub timeout_secs: u64,

    /// Variables merged over the caller's environment
    pub env: BTreeMap<String, String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            jar: PathBuf::from("lib/validator_cli.jar"),
            jvm_args: vec![UTF8_ENV_VALUE.to_string()],
            fhir_version: DEFAULT_FHIR_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            env: BTreeMap::from([(UTF8_ENV_VAR.to_string(), UTF8_ENV_VALUE.to_string())]),
        }
    }
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch scheduling and discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Maximum number of validator processes in flight
    pub jobs: usize,

    /// Directory searched when no tests are named explicitly
    pub test_dir: PathBuf,

    /// Preferred subdirectory of `test_dir` holding the definitions
    pub definitions_dir: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            test_dir: PathBuf::from("."),
            definitions_dir: "test-definitions".to_string(),
        }
    }
}

impl FhirutConfig {
    /// Load configuration from file
    ///
    /// The format is chosen from the extension: `.yaml`/`.yml`, `.json` or `.toml`.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| FhirutError::io_error(path, e))?;
        let ext = path.extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| FhirutError::configuration(format!("{}: {e}", path.display())))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| FhirutError::configuration(format!("{}: {e}", path.display())))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| FhirutError::configuration(format!("{}: {e}", path.display())))?,
            _ => {
                return Err(FhirutError::configuration(format!(
                    "Unsupported config file extension for '{}' (expected .yaml, .yml, .json or .toml)",
                    path.display()
                )));
            }
        };

        config.validate()?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    /// Resolve relative `validator.jar` and `runner.testDir` against `base`
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.validator.jar.is_relative() {
            self.validator.jar = base.join(&self.validator.jar);
        }
        if self.runner.test_dir.is_relative() {
            self.runner.test_dir = base.join(&self.runner.test_dir);
        }
        self
    }

    /// Reject settings the runner cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.validator.timeout_secs == 0 {
            return Err(FhirutError::configuration(
                "validator.timeoutSecs must be greater than zero",
            ));
        }
        if self.runner.jobs == 0 {
            return Err(FhirutError::configuration(
                "runner.jobs must be greater than zero",
            ));
        }
        if self.validator.java.trim().is_empty() {
            return Err(FhirutError::configuration("validator.java must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_validator_setup() {
        let config = FhirutConfig::default();
        assert_eq!(config.validator.java, "java");
        assert_eq!(config.validator.jar, PathBuf::from("lib/validator_cli.jar"));
        assert_eq!(config.validator.fhir_version, "4.0.1");
        assert_eq!(config.validator.timeout(), Duration::from_secs(30));
        assert_eq!(
            config.validator.env.get("JAVA_TOOL_OPTIONS").map(String::as_str),
            Some("-Dfile.encoding=UTF-8")
        );
        assert_eq!(config.runner.jobs, 1);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fhirut.yaml");
        fs::write(&path, "validator:\n  timeoutSecs: 5\n").unwrap();

        let config = FhirutConfig::load(&path).unwrap();
        assert_eq!(config.validator.timeout_secs, 5);
        assert_eq!(config.validator.fhir_version, DEFAULT_FHIR_VERSION);
        assert_eq!(config.runner.jobs, 1);
        assert_eq!(config.runner.definitions_dir, "test-definitions");
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fhirut.yaml");
        fs::write(
            &path,
            "validator:\n  jar: tools/validator_cli.jar\nrunner:\n  testDir: tests\n",
        )
        .unwrap();

        let config = FhirutConfig::load(&path).unwrap();
        assert_eq!(
            config.validator.jar,
            temp_dir.path().join("tools").join("validator_cli.jar")
        );
        assert_eq!(config.runner.test_dir, temp_dir.path().join("tests"));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let jar = std::env::temp_dir().join("validator_cli.jar");
        let mut config = FhirutConfig::default();
        config.validator.jar = jar.clone();
        let config = config.relative_to(Path::new("/somewhere/else"));
        assert_eq!(config.validator.jar, jar);
        assert_eq!(config.runner.test_dir, Path::new("/somewhere/else").join("."));
    }

    #[test]
    fn test_load_toml_and_json() {
        let temp_dir = TempDir::new().unwrap();

        let toml_path = temp_dir.path().join("fhirut.toml");
        fs::write(&toml_path, "[runner]\njobs = 4\n").unwrap();
        assert_eq!(FhirutConfig::load(&toml_path).unwrap().runner.jobs, 4);

        let json_path = temp_dir.path().join("fhirut.json");
        fs::write(&json_path, r#"{"validator": {"fhirVersion": "5.0.0"}}"#).unwrap();
        assert_eq!(
            FhirutConfig::load(&json_path).unwrap().validator.fhir_version,
            "5.0.0"
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fhirut.yaml");
        fs::write(&path, "validator:\n  timeoutSecs: 0\n").unwrap();

        let err = FhirutConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeoutSecs"));
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fhirut.ini");
        fs::write(&path, "jobs=1").unwrap();
        assert!(FhirutConfig::load(&path).is_err());
    }
}
