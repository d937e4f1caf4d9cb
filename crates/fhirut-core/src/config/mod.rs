//! Configuration system for fhirut
//!
//! Configuration is a single value loaded once and injected into the
//! validator invoker and the test runner. Supported files, searched upward
//! from the working directory:
//! - `fhirut.yaml` / `fhirut.yml`
//! - `fhirut.json`
//! - `fhirut.toml`
//!
//! Every field has a default, so an absent file behaves like an empty one.

mod fhirut_config;
mod loader;

pub use fhirut_config::{
    DEFAULT_FHIR_VERSION, DEFAULT_TIMEOUT_SECS, FhirutConfig, RunnerConfig, UTF8_ENV_VALUE,
    UTF8_ENV_VAR, ValidatorConfig,
};
pub use loader::{CONFIG_FILE_NAMES, ConfigLoader};
