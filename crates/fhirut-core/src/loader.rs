//! Test definition loading and discovery
//!
//! Test definitions are YAML documents with snake_case keys:
//!
//! ```yaml
//! test_id: patient-missing-name
//! description: Patient without a name must fail us-core validation
//! context:
//!   igs: [hl7.fhir.us.core#6.1.0]
//!   profiles: [http://hl7.org/fhir/us/core/StructureDefinition/us-core-patient]
//!   resources: [../shared/valueset.json]
//! instance_path: instances/patient-no-name.json
//! expected_results:
//!   status: error
//!   errors:
//!     - Patient.name
//! ```
//!
//! Relative paths are resolved against the directory of the YAML file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::ConfigLoader;
use crate::error::FhirutError;
use crate::model::TestDefinition;
use crate::result::Result;

/// Load and validate a single test definition file
pub fn load_definition(path: &Path) -> Result<TestDefinition> {
    let content = fs::read_to_string(path).map_err(|e| FhirutError::definition(path, e.to_string()))?;
    if content.trim().is_empty() {
        return Err(FhirutError::definition(path, "file is empty"));
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| FhirutError::definition(path, e.to_string()))?;

    for field in ["test_id", "instance_path", "expected_results"] {
        if value.get(field).is_none_or(serde_yaml::Value::is_null) {
            return Err(FhirutError::definition(
                path,
                format!("field '{field}' is required"),
            ));
        }
    }

    let definition: TestDefinition =
        serde_yaml::from_value(value).map_err(|e| FhirutError::definition(path, e.to_string()))?;

    if definition.test_id.trim().is_empty() {
        return Err(FhirutError::definition(path, "field 'test_id' must not be empty"));
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let base = std::path::absolute(base).unwrap_or_else(|_| base.to_path_buf());
    let definition = definition.resolve_paths(&base).with_source(path);

    debug!(
        "Loaded test '{}' from {} (instance: {})",
        definition.test_id,
        path.display(),
        definition.instance_path.display()
    );
    Ok(definition)
}

/// Whether a path looks like a test definition file
pub fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
        && !ConfigLoader::is_config_file(path)
}

/// Recursively find test definition files.
///
/// When `root/definitions_dir` exists only that subtree is searched.
/// Results are sorted by path. An unreadable root or an empty result is an
/// error: there is nothing to run.
pub fn discover(root: &Path, definitions_dir: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(FhirutError::discovery(format!(
            "Test directory not found: {}",
            root.display()
        )));
    }

    let preferred = root.join(definitions_dir);
    let search_root = if !definitions_dir.is_empty() && preferred.is_dir() {
        preferred
    } else {
        root.to_path_buf()
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&search_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            FhirutError::discovery(format!(
                "Failed to read test directory {}: {e}",
                search_root.display()
            ))
        })?;
        if entry.file_type().is_file() && is_definition_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(FhirutError::discovery(format!(
            "No test files found in: {}",
            search_root.display()
        )));
    }

    debug!(
        "Discovered {} test definition(s) under {}",
        files.len(),
        search_root.display()
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_full_definition() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "tests/patient.yaml",
            r#"
test_id: patient-1
description: Patient example
context:
  igs: [hl7.fhir.us.core#6.1.0]
  profiles: [http://example.org/p]
  resources: [../shared/vs.json]
instance_path: instances/patient.json
expected_results:
  status: error
  errors: ["Patient.name"]
  warnings: ["narrative"]
  informations: ["info"]
  invariants:
    - expression: "name.exists()"
      expected: false
unknown_key: ignored
"#,
        );

        let definition = load_definition(&path).unwrap();
        let base = std::path::absolute(temp_dir.path()).unwrap();

        assert_eq!(definition.test_id, "patient-1");
        assert_eq!(definition.description.as_deref(), Some("Patient example"));
        assert_eq!(definition.context.igs, vec!["hl7.fhir.us.core#6.1.0"]);
        assert_eq!(
            definition.instance_path,
            base.join("tests").join("instances").join("patient.json")
        );
        assert_eq!(
            definition.context.resources,
            vec![base.join("shared").join("vs.json")]
        );
        assert_eq!(
            definition.expected_results.errors,
            Some(vec!["Patient.name".to_string()])
        );
        assert_eq!(definition.expected_results.invariants.as_ref().unwrap().len(), 1);
        assert_eq!(definition.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_context_is_optional() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "min.yml",
            "test_id: min\ninstance_path: p.json\nexpected_results:\n  status: success\n",
        );
        let definition = load_definition(&path).unwrap();
        assert!(definition.context.igs.is_empty());
        assert!(definition.expected_results.errors.is_none());
    }

    #[test]
    fn test_required_fields() {
        let temp_dir = TempDir::new().unwrap();
        let cases = [
            ("no-id.yaml", "instance_path: p.json\nexpected_results:\n  status: success\n", "test_id"),
            ("no-instance.yaml", "test_id: x\nexpected_results:\n  status: success\n", "instance_path"),
            ("no-expected.yaml", "test_id: x\ninstance_path: p.json\n", "expected_results"),
            ("blank-id.yaml", "test_id: ''\ninstance_path: p.json\nexpected_results:\n  status: success\n", "test_id"),
        ];

        for (name, content, field) in cases {
            let path = write(temp_dir.path(), name, content);
            let err = load_definition(&path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Definition, "{name}");
            assert!(err.to_string().contains(field), "{name}: {err}");
        }
    }

    #[test]
    fn test_missing_status_loads_and_never_matches() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "no-status.yaml",
            "test_id: no-status\ninstance_path: p.json\nexpected_results:\n  errors: [Patient.name]\n",
        );

        let definition = load_definition(&path).unwrap();
        assert!(definition.expected_results.status.is_empty());

        let diffs = crate::diff::compare(
            &crate::model::Outcome::default(),
            &definition.expected_results,
        );
        let kinds: Vec<_> = diffs.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::model::DiffKind::StatusMismatch,
                crate::model::DiffKind::MissingError
            ]
        );
    }

    #[test]
    fn test_empty_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "empty.yaml", "  \n");
        let err = load_definition(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_discover_prefers_definitions_dir() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "other.yaml", "x: 1");
        write(temp_dir.path(), "test-definitions/b.yml", "x: 1");
        write(temp_dir.path(), "test-definitions/nested/a.yaml", "x: 1");
        write(temp_dir.path(), "test-definitions/readme.md", "");

        let files = discover(temp_dir.path(), "test-definitions").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.yml", "a.yaml"]);
    }

    #[test]
    fn test_discover_skips_config_files() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "fhirut.yaml", "runner: {}");
        write(temp_dir.path(), "case.yaml", "x: 1");

        let files = discover(temp_dir.path(), "test-definitions").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("case.yaml"));
    }

    #[test]
    fn test_discover_empty_directory_is_hard_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = discover(temp_dir.path(), "test-definitions").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Discovery);
    }

    #[test]
    fn test_discover_missing_directory_is_hard_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = discover(&temp_dir.path().join("missing"), "test-definitions").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Discovery);
    }
}
