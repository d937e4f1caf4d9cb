//! Configuration file discovery and loading

use super::fhirut_config::FhirutConfig;
use crate::error::FhirutError;
use crate::result::Result;
use std::path::{Path, PathBuf};

/// Config file names in lookup priority order
pub const CONFIG_FILE_NAMES: &[&str] = &["fhirut.yaml", "fhirut.yml", "fhirut.json", "fhirut.toml"];

/// Configuration loader for discovering and loading config files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Auto-discover config file by traversing upward from start_path
    ///
    /// Starts from the given directory and moves up the directory tree until
    /// a config is found or the filesystem root is reached.
    pub fn auto_discover(start_path: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_path
            .canonicalize()
            .map_err(|e| FhirutError::configuration(format!("Invalid path: {e}")))?;

        loop {
            for filename in CONFIG_FILE_NAMES {
                let config_path = current.join(filename);
                if config_path.is_file() {
                    tracing::debug!("Found config: {}", config_path.display());
                    return Ok(Some(config_path));
                }
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<FhirutConfig> {
        if !path.exists() {
            return Err(FhirutError::configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        FhirutConfig::load(path)
    }

    /// Load config from path or auto-discover, falling back to defaults
    pub fn load(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<FhirutConfig> {
        if let Some(path) = custom_path {
            return Self::load_from_file(path);
        }

        let search_dir = start_dir.unwrap_or_else(|| Path::new("."));
        match Self::auto_discover(search_dir)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(FhirutConfig::default())
            }
        }
    }

    /// Whether a file name belongs to a fhirut config file
    pub fn is_config_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| CONFIG_FILE_NAMES.contains(&name))
    }
}
