//! Settings file loading
//!
//! `stackpose.yaml` (or `.yml`) holds the source spec defaults, baseline
//! template data, and the data-file list. Unknown keys are collected as
//! non-fatal warnings rather than rejected, so a typo surfaces without
//! breaking the run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml_ng::{Mapping, Value};

use crate::error::{ComposeError, ComposeResult};
use crate::source::SourceSpec;

/// Settings file candidates tried in order; the first existing file wins.
pub const DEFAULT_SETTINGS_PATHS: [&str; 2] = ["./stackpose.yaml", "./stackpose.yml"];

/// Loaded settings (or the defaults when no settings file exists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Source spec defaults, overridable from the command line
    #[serde(default, alias = "source")]
    pub src: SourceSpec,

    /// Baseline template data, lowest precedence
    #[serde(default = "default_data", alias = "globals", alias = "values")]
    pub data: Value,

    /// External data files merged over everything else; missing entries
    /// are skipped
    #[serde(
        default = "default_data_files",
        alias = "data-files",
        alias = "globals_files",
        alias = "globals-files",
        alias = "values_files",
        alias = "values-files"
    )]
    pub data_files: Vec<PathBuf>,
}

fn default_data() -> Value {
    Value::Mapping(Mapping::new())
}

fn default_data_files() -> Vec<PathBuf> {
    [
        "data.yaml",
        "data.yml",
        "globals.yaml",
        "globals.yml",
        "values.yaml",
        "values.yml",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            src: SourceSpec::default(),
            data: default_data(),
            data_files: default_data_files(),
        }
    }
}

/// Non-fatal settings warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsWarning {
    /// Dotted path of the unrecognized key
    pub key: String,
    pub file: PathBuf,
}

/// Load the first existing candidate, or defaults when none exists.
pub fn load_settings(paths: &[PathBuf]) -> ComposeResult<(Settings, Vec<SettingsWarning>)> {
    for path in paths {
        if path.exists() {
            return load_with_warnings(path);
        }
    }
    Ok((Settings::default(), Vec::new()))
}

/// Parse one settings file, collecting unknown-key warnings.
pub fn load_with_warnings(path: &Path) -> ComposeResult<(Settings, Vec<SettingsWarning>)> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok((Settings::default(), Vec::new()));
    }

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = serde_yaml_ng::Deserializer::from_str(&content);

    let settings: Settings = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| ComposeError::Settings {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .into_iter()
        .map(|key| SettingsWarning {
            key,
            file: path.to_path_buf(),
        })
        .collect();

    Ok((settings, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_no_file_exists() {
        let (settings, warnings) =
            load_settings(&[PathBuf::from("no/such/stackpose.yaml")]).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(warnings.is_empty());
        assert_eq!(settings.src.dir, PathBuf::from("./compose"));
        assert_eq!(settings.data_files.len(), 6);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stackpose.yaml");
        fs::write(&path, "src:\n  dir: ./stacks\n").unwrap();

        let (settings, warnings) = load_settings(&[path]).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(settings.src.dir, PathBuf::from("./stacks"));
        assert_eq!(settings.src.glob, "**/*.*");
    }

    #[test]
    fn test_aliases_match_the_original_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stackpose.yaml");
        fs::write(
            &path,
            "source:\n  dir: ./stacks\nglobals:\n  env: prod\nvalues-files: [custom.yaml]\n",
        )
        .unwrap();

        let (settings, _) = load_settings(&[path]).unwrap();
        assert_eq!(settings.src.dir, PathBuf::from("./stacks"));
        assert_eq!(
            settings.data,
            serde_yaml_ng::from_str::<Value>("env: prod").unwrap()
        );
        assert_eq!(settings.data_files, vec![PathBuf::from("custom.yaml")]);
    }

    #[test]
    fn test_unknown_keys_warn_but_do_not_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stackpose.yaml");
        fs::write(&path, "src:\n  dir: ./stacks\n  globb: oops\n").unwrap();

        let (settings, warnings) = load_settings(&[path]).unwrap();
        assert_eq!(settings.src.dir, PathBuf::from("./stacks"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, "src.globb");
    }

    #[test]
    fn test_invalid_yaml_is_a_settings_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stackpose.yaml");
        fs::write(&path, "src: [unclosed\n").unwrap();

        let err = load_settings(&[path]).unwrap_err();
        assert!(matches!(err, ComposeError::Settings { .. }));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stackpose.yaml");
        fs::write(&path, "\n").unwrap();

        let (settings, _) = load_settings(&[path]).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("stackpose.yaml");
        let second = dir.path().join("stackpose.yml");
        fs::write(&first, "src: {dir: ./one}\n").unwrap();
        fs::write(&second, "src: {dir: ./two}\n").unwrap();

        let (settings, _) = load_settings(&[first, second]).unwrap();
        assert_eq!(settings.src.dir, PathBuf::from("./one"));
    }
}
