//! Version resolution over enumerated fragment files
//!
//! Turns the raw file set into one winning path per logical name. A file's
//! logical identity is its normalized path with the template suffix, the
//! real extension, and any trailing `v<version>` suffix stripped
//! (`stacks/web.v2.1.yaml.j2` has logical name `stacks/web` and version
//! `2.1`). Higher versions win, an explicit version always outranks no
//! version, and equal versions go to the first candidate in sorted-path
//! order, so resolution is reproducible regardless of filesystem
//! iteration order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ComposeError, ComposeResult};
use crate::source::{slash_path, SourceSpec};
use crate::version::{Version, VersionSpec};

/// File extension marking a file as a template (stripped before the
/// logical-name parse so it does not pollute identity).
pub const TEMPLATE_SUFFIX: &str = "j2";

/// Trailing version suffix: separators `.` `_` `:` `@` before a `v`,
/// then dotted digits and an optional pre-release tail.
const FILE_NAME_PATTERN: &str = r"^(?P<name>.+?)(?:[._:@]+v(?P<version>[0-9]+(?:\.[0-9]+)*[\w-]*))?$";

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FILE_NAME_PATTERN).unwrap_or_else(|_| unreachable!()))
}

/// One enumerated file with its derived identity. Ephemeral.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    /// Normalized path (relative to the working directory when possible)
    pub path: PathBuf,
    /// Version-stripped identity, directories included
    pub name: String,
    /// Parsed version; `None` means unversioned (compares as 0)
    pub version: Option<Version>,
}

/// A winning candidate for one logical name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub name: String,
    pub version: Option<Version>,
    pub path: PathBuf,
}

/// The winners, iterated in lexicographic order of their normalized
/// paths — the order the merge consumes them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFileSet {
    files: Vec<ResolvedFile>,
}

impl ResolvedFileSet {
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedFile> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Enumerate a source spec and resolve it in one step.
pub fn resolve(spec: &SourceSpec) -> ComposeResult<ResolvedFileSet> {
    let files = spec.list_files()?;
    resolve_files(&files, &spec.version_spec, &spec.version_spec_mapping)
}

/// Resolve an already-enumerated file list.
///
/// Versioned candidates must satisfy the global spec AND any
/// name-specific spec — both gates, not an override. Unversioned
/// candidates are never filtered by constraints.
pub fn resolve_files(
    files: &[PathBuf],
    version_spec: &VersionSpec,
    version_spec_mapping: &BTreeMap<String, VersionSpec>,
) -> ComposeResult<ResolvedFileSet> {
    let mut candidates = files
        .iter()
        .map(|path| parse_candidate(path))
        .collect::<ComposeResult<Vec<_>>>()?;
    // Deterministic encounter order, so equal-version ties are stable.
    candidates.sort_by(|a, b| a.path.cmp(&b.path));

    let mut index: BTreeMap<String, CandidateFile> = BTreeMap::new();
    for candidate in candidates {
        if let Some(version) = &candidate.version {
            if !version_spec.matches(version) {
                continue;
            }
            if let Some(named_spec) = version_spec_mapping.get(&candidate.name) {
                if !named_spec.matches(version) {
                    continue;
                }
            }
        }

        match index.get(&candidate.name) {
            None => {
                index.insert(candidate.name.clone(), candidate);
            }
            Some(existing) => {
                let replaces = match (&candidate.version, &existing.version) {
                    // Strictly greater replaces; equal keeps the first.
                    (Some(new), Some(old)) => new > old,
                    // Explicit version beats absence of version.
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if replaces {
                    index.insert(candidate.name.clone(), candidate);
                }
            }
        }
    }

    let mut files: Vec<ResolvedFile> = index
        .into_values()
        .map(|c| ResolvedFile {
            name: c.name,
            version: c.version,
            path: c.path,
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ResolvedFileSet { files })
}

/// Derive a candidate's identity from its path.
pub fn parse_candidate(path: &Path) -> ComposeResult<CandidateFile> {
    let normalized = normalize_path(path);
    let stem = slash_path(&strip_extensions(&normalized));
    let (name, version_token) = split_version_suffix(&stem);

    let version = match version_token {
        None => None,
        Some(token) => Some(token.parse::<Version>().map_err(|_| {
            ComposeError::MalformedVersion {
                path: normalized.clone(),
                token: token.to_string(),
            }
        })?),
    };

    Ok(CandidateFile {
        path: normalized,
        name,
        version,
    })
}

/// The logical stem of a single file name (no directories): used by the
/// plugin provider to map a marker file to its registered module.
pub fn logical_file_stem(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(Path::new)
        .unwrap_or_else(|| Path::new(""));
    let stem = slash_path(&strip_extensions(file_name));
    split_version_suffix(&stem).0
}

/// Relative to the working directory when possible, absolute otherwise.
fn normalize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        if let Ok(cwd) = std::env::current_dir() {
            if let Ok(relative) = path.strip_prefix(&cwd) {
                return relative.to_path_buf();
            }
        }
    }
    path.to_path_buf()
}

/// Drop the template suffix (if present) and then the real extension.
fn strip_extensions(path: &Path) -> PathBuf {
    let mut stripped = path.to_path_buf();
    if stripped
        .extension()
        .is_some_and(|ext| ext == TEMPLATE_SUFFIX)
    {
        stripped.set_extension("");
    }
    stripped.set_extension("");
    stripped
}

fn split_version_suffix(stem: &str) -> (String, Option<&str>) {
    match file_name_regex().captures(stem) {
        Some(captures) => {
            let name = captures
                .name("name")
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| stem.to_string());
            (name, captures.name("version").map(|m| m.as_str()))
        }
        None => (stem.to_string(), None),
    }
}

#[cfg(test)]
mod tests;
