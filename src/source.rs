//! Source specification and file enumeration
//!
//! A [`SourceSpec`] names a directory of fragment files, the inclusion
//! glob, exclusion regex patterns, and the version constraints applied
//! during resolution. [`SourceSpec::list_files`] is pure enumeration; it
//! does not interpret file names.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, ComposeResult};
use crate::version::VersionSpec;

/// Where fragment files come from and which versions are eligible.
///
/// Immutable once constructed; defaults match a `./compose` directory of
/// dotted files with underscore-prefixed paths excluded and no version
/// restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Base directory to enumerate
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Inclusion glob, gitignore-style (`**/*.*`)
    #[serde(default = "default_glob")]
    pub glob: String,

    /// Regex patterns; any match on the slash-normalized path excludes
    /// the file
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Constraint applied to every versioned candidate
    #[serde(default)]
    pub version_spec: VersionSpec,

    /// Additional per-logical-name constraints; a candidate must satisfy
    /// both this and `version_spec`
    #[serde(default)]
    pub version_spec_mapping: BTreeMap<String, VersionSpec>,
}

fn default_dir() -> PathBuf {
    PathBuf::from("./compose")
}

fn default_glob() -> String {
    "**/*.*".to_string()
}

fn default_exclude_patterns() -> Vec<String> {
    vec![r"\/_".to_string()]
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            glob: default_glob(),
            exclude_patterns: default_exclude_patterns(),
            version_spec: VersionSpec::default(),
            version_spec_mapping: BTreeMap::new(),
        }
    }
}

impl SourceSpec {
    /// Enumerate files under `dir` matching the glob, minus exclusions,
    /// sorted by path.
    ///
    /// A missing base directory is an error; an empty match set is not.
    pub fn list_files(&self) -> ComposeResult<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(ComposeError::SourceDirNotFound {
                path: self.dir.clone(),
            });
        }

        let mut override_builder = OverrideBuilder::new(&self.dir);
        override_builder
            .add(&self.glob)
            .map_err(|e| ComposeError::InvalidGlob {
                pattern: self.glob.clone(),
                message: e.to_string(),
            })?;
        let overrides = override_builder
            .build()
            .map_err(|e| ComposeError::InvalidGlob {
                pattern: self.glob.clone(),
                message: e.to_string(),
            })?;

        let excludes = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ComposeError::InvalidExcludePattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<ComposeResult<Vec<_>>>()?;

        let mut files = Vec::new();
        let walk = WalkBuilder::new(&self.dir)
            .standard_filters(false)
            .overrides(overrides)
            .build();

        for entry in walk {
            let entry = entry.map_err(|e| ComposeError::Io(std::io::Error::other(e)))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.into_path();
            if excludes.iter().any(|re| re.is_match(&slash_path(&path))) {
                continue;
            }
            files.push(path);
        }

        files.sort();
        Ok(files)
    }
}

/// Path as a forward-slash string, so exclusion patterns behave the same
/// on every platform.
pub fn slash_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
