//! Validator invocation
//!
//! Turns a [`TestDefinition`] into a validator command line and runs it
//! through a [`ProcessRunner`]. The command always has the same shape:
//!
//! ```text
//! java <jvm args> -jar <validator jar> -version <fhir version>
//!      [-ig <ig>]... [-profile <profile>]... [<resource>]... <instance>
//! ```

mod process;

pub use process::{CommandSpec, ProcessOutput, ProcessRunner, TokioProcessRunner};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::FhirutError;
use crate::model::TestDefinition;
use crate::result::Result;

/// Builds and runs validator commands
pub struct ValidatorInvoker {
    config: ValidatorConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl ValidatorInvoker {
    /// Create an invoker that spawns real processes
    pub fn new(config: ValidatorConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner::new()))
    }

    pub fn with_runner(config: ValidatorConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Build the validator command for a test definition.
    ///
    /// Fails before anything is spawned when the validator jar or the
    /// instance resource does not exist.
    pub fn build_command(&self, definition: &TestDefinition) -> Result<CommandSpec> {
        if !self.config.jar.exists() {
            return Err(FhirutError::configuration(format!(
                "Validator jar not found at '{}'. Download validator_cli.jar from HL7 and point validator.jar at it",
                absolute(&self.config.jar).display()
            )));
        }

        let instance = &definition.instance_path;
        if instance.as_os_str().is_empty() || !instance.exists() {
            return Err(FhirutError::configuration(format!(
                "Instance file not found: '{}'",
                instance.display()
            )));
        }

        let mut command = CommandSpec::new(&self.config.java)
            .args(self.config.jvm_args.iter().cloned())
            .arg("-jar")
            .arg(path_arg(&self.config.jar))
            .arg("-version")
            .arg(&self.config.fhir_version);

        for ig in &definition.context.igs {
            command = command.arg("-ig").arg(ig);
        }

        for profile in &definition.context.profiles {
            command = command.arg("-profile").arg(profile);
        }

        for resource in &definition.context.resources {
            if resource.exists() {
                command = command.arg(path_arg(&absolute(resource)));
            } else {
                debug!(
                    "Skipping missing context resource for '{}': {}",
                    definition.test_id,
                    resource.display()
                );
            }
        }

        command = command.arg(path_arg(&absolute(instance)));

        for (key, value) in &self.config.env {
            command = command.env(key, value);
        }

        Ok(command)
    }

    /// Run the validator once for a test definition
    pub async fn invoke(&self, definition: &TestDefinition) -> Result<ProcessOutput> {
        let command = self.build_command(definition)?;
        debug!("Running validator for '{}': {}", definition.test_id, command);

        let output = self.runner.run(&command, self.config.timeout()).await?;
        debug!(
            "Validator for '{}' exited with code {} ({} bytes of output)",
            definition.test_id,
            output.exit_code,
            output.output.len()
        );
        Ok(output)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpectedResults, TestContext};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: ValidatorConfig,
        instance: PathBuf,
        resource: PathBuf,
        root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let jar = root.join("validator_cli.jar");
        let instance = root.join("patient.json");
        let resource = root.join("valueset.json");
        fs::write(&jar, b"").unwrap();
        fs::write(&instance, "{}").unwrap();
        fs::write(&resource, "{}").unwrap();

        let config = ValidatorConfig {
            jar,
            ..ValidatorConfig::default()
        };

        Fixture {
            _dir: dir,
            config,
            instance,
            resource,
            root,
        }
    }

    #[test]
    fn test_argument_order() {
        let fx = fixture();
        let definition = TestDefinition::new("t1", &fx.instance, ExpectedResults::success())
            .with_context(TestContext {
                igs: vec!["hl7.fhir.us.core#6.1.0".into(), "local-ig".into()],
                profiles: vec!["http://example.org/StructureDefinition/p1".into()],
                resources: vec![fx.resource.clone(), fx.root.join("missing.json")],
            });

        let invoker = ValidatorInvoker::new(fx.config.clone());
        let command = invoker.build_command(&definition).unwrap();

        assert_eq!(command.program, "java");
        let expected: Vec<String> = vec![
            "-Dfile.encoding=UTF-8".into(),
            "-jar".into(),
            path_arg(&fx.config.jar),
            "-version".into(),
            "4.0.1".into(),
            "-ig".into(),
            "hl7.fhir.us.core#6.1.0".into(),
            "-ig".into(),
            "local-ig".into(),
            "-profile".into(),
            "http://example.org/StructureDefinition/p1".into(),
            path_arg(&fx.resource),
            path_arg(&fx.instance),
        ];
        assert_eq!(command.args, expected);
        assert_eq!(
            command.env,
            vec![(
                "JAVA_TOOL_OPTIONS".to_string(),
                "-Dfile.encoding=UTF-8".to_string()
            )]
        );
    }

    #[test]
    fn test_instance_is_last_argument() {
        let fx = fixture();
        let definition = TestDefinition::new("t1", &fx.instance, ExpectedResults::success());
        let command = ValidatorInvoker::new(fx.config).build_command(&definition).unwrap();
        assert_eq!(command.args.last().unwrap(), &path_arg(&fx.instance));
    }

    #[test]
    fn test_missing_instance_fails_before_spawn() {
        let fx = fixture();
        let definition = TestDefinition::new(
            "t1",
            fx.root.join("nope.json"),
            ExpectedResults::success(),
        );
        let err = ValidatorInvoker::new(fx.config)
            .build_command(&definition)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn test_missing_jar_names_the_jar() {
        let fx = fixture();
        let config = ValidatorConfig {
            jar: fx.root.join("lib").join("validator_cli.jar"),
            ..fx.config.clone()
        };
        let definition = TestDefinition::new("t1", &fx.instance, ExpectedResults::success());
        let err = ValidatorInvoker::new(config)
            .build_command(&definition)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(err.to_string().contains("validator_cli.jar"));
    }
}
