//! Template data loading
//!
//! Builds the [`DataContext`] handed to every content provider: baseline
//! settings data, explicit `-d key=value` overrides, and external data
//! files, deep-merged in that order. String values are expanded first:
//! `@path` pulls in the named file's content, `@@literal` escapes a
//! leading `@`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};

use crate::error::{ComposeError, ComposeResult};
use crate::merge::deep_merge;

/// The merged, expansion-resolved variable mapping available to all
/// fragments in one run. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataContext(Mapping);

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    /// The whole context as a YAML value (for whole-context plugin
    /// parameters).
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.0.clone())
    }
}

/// Build the DataContext from explicit layers plus external data files.
///
/// Layers are lowest-precedence first. Configured data files that do not
/// exist are skipped; files referenced from values with `@` are not.
pub fn load_data(layers: Vec<Value>, data_files: &[PathBuf]) -> ComposeResult<DataContext> {
    let mut merged = Value::Mapping(Mapping::new());

    for layer in layers {
        // An empty settings `data:` key deserializes as null; nothing to add.
        if layer.is_null() {
            continue;
        }
        merged = deep_merge(merged, expand_values(layer)?);
    }

    for data_file in data_files {
        if !data_file.exists() {
            continue;
        }
        let content = load_file_content(data_file)?;
        if !content.is_mapping() {
            return Err(ComposeError::DataFileNotMapping {
                path: data_file.clone(),
            });
        }
        merged = deep_merge(merged, expand_values(content)?);
    }

    match merged {
        Value::Mapping(mapping) => Ok(DataContext(mapping)),
        // merge_all of mappings starting from a mapping stays a mapping
        _ => unreachable!("data layers always merge into a mapping"),
    }
}

/// Expand `@` file references in every string leaf, recursing through
/// mappings and sequences. Non-string leaves pass through unchanged.
pub fn expand_values(value: Value) -> ComposeResult<Value> {
    match value {
        Value::String(s) => expand_string(s),
        Value::Mapping(mapping) => {
            let mut expanded = Mapping::with_capacity(mapping.len());
            for (key, item) in mapping {
                expanded.insert(key, expand_values(item)?);
            }
            Ok(Value::Mapping(expanded))
        }
        Value::Sequence(items) => Ok(Value::Sequence(
            items
                .into_iter()
                .map(expand_values)
                .collect::<ComposeResult<Vec<_>>>()?,
        )),
        other => Ok(other),
    }
}

fn expand_string(s: String) -> ComposeResult<Value> {
    if let Some(rest) = s.strip_prefix("@@") {
        return Ok(Value::String(format!("@{}", rest)));
    }
    if let Some(path) = s.strip_prefix('@') {
        let path = Path::new(path);
        if !path.exists() {
            return Err(ComposeError::DataFileNotFound {
                path: path.to_path_buf(),
            });
        }
        return load_file_content(path);
    }
    Ok(Value::String(s))
}

/// Read one data file: YAML/JSON parse to structured data, `.txt` yields
/// its trimmed text, anything else is unsupported.
pub fn load_file_content(path: &Path) -> ComposeResult<Value> {
    if !path.exists() {
        return Err(ComposeError::DataFileNotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let content = std::fs::read_to_string(path)?;

    match extension.as_str() {
        "yaml" | "yml" => {
            serde_yaml_ng::from_str(&content).map_err(|e| ComposeError::FragmentParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
        "json" => {
            let json: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| ComposeError::FragmentParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            serde_yaml_ng::to_value(&json).map_err(|e| ComposeError::FragmentParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
        "txt" => Ok(Value::String(content.trim().to_string())),
        _ => Err(ComposeError::UnsupportedDataFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

/// Parse `-d key=value` overrides into a mapping layer.
///
/// Dotted keys nest (`db.port=5432` becomes `{db: {port: 5432}}`) and the
/// value side is read as a YAML scalar, so numbers and booleans come
/// through typed. A value that fails to parse is kept as a literal string.
pub fn parse_dotlist(items: &[String]) -> ComposeResult<Value> {
    let mut merged = Value::Mapping(Mapping::new());

    for item in items {
        let (key, raw_value) =
            item.split_once('=')
                .ok_or_else(|| ComposeError::InvalidDataOverride {
                    item: item.clone(),
                })?;
        if key.is_empty() {
            return Err(ComposeError::InvalidDataOverride { item: item.clone() });
        }

        let value = if raw_value.is_empty() {
            Value::Null
        } else {
            serde_yaml_ng::from_str(raw_value)
                .unwrap_or_else(|_| Value::String(raw_value.to_string()))
        };

        let nested = key.rsplit('.').fold(value, |acc, segment| {
            let mut mapping = Mapping::new();
            mapping.insert(Value::String(segment.to_string()), acc);
            Value::Mapping(mapping)
        });
        merged = deep_merge(merged, nested);
    }

    Ok(merged)
}

/// Convenience for callers holding plain maps.
pub fn context_from_pairs<I, K>(pairs: I) -> DataContext
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let map: BTreeMap<String, Value> = pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect();
    DataContext(
        map.into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn yaml(s: &str) -> Value {
        serde_yaml_ng::from_str(s).unwrap()
    }

    #[test]
    fn test_escape_keeps_single_at() {
        let expanded = expand_values(yaml("key: '@@keep'")).unwrap();
        assert_eq!(expanded, yaml("key: '@keep'"));
    }

    #[test]
    fn test_file_reference_txt_is_trimmed() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "hello\n").unwrap();

        let input = Value::String(format!("@{}", notes.display()));
        let expanded = expand_values(input).unwrap();
        assert_eq!(expanded, Value::String("hello".to_string()));
    }

    #[test]
    fn test_file_reference_yaml_is_structured() {
        let dir = tempdir().unwrap();
        let hosts = dir.path().join("hosts.yaml");
        fs::write(&hosts, "- a\n- b\n").unwrap();

        let input = yaml(&format!("hosts: '@{}'", hosts.display()));
        let expanded = expand_values(input).unwrap();
        assert_eq!(expanded, yaml("hosts: [a, b]"));
    }

    #[test]
    fn test_missing_file_reference_is_an_error() {
        let err = expand_values(Value::String("@does/not/exist.yaml".to_string())).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::DataFileNotFound { path } if path.ends_with("exist.yaml")
        ));
    }

    #[test]
    fn test_unsupported_reference_extension() {
        let dir = tempdir().unwrap();
        let ini = dir.path().join("conf.ini");
        fs::write(&ini, "x=1").unwrap();

        let err = expand_values(Value::String(format!("@{}", ini.display()))).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::UnsupportedDataFormat { extension, .. } if extension == "ini"
        ));
    }

    #[test]
    fn test_expansion_recurses_into_sequences() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "deep").unwrap();

        let input = yaml(&format!("outer: [[inner: '@{}']]", notes.display()));
        let expanded = expand_values(input).unwrap();
        assert_eq!(expanded, yaml("outer: [[inner: deep]]"));
    }

    #[test]
    fn test_layer_precedence() {
        let context = load_data(
            vec![yaml("a: 1\nb: {x: 1}"), yaml("b: {y: 2}\nc: 3")],
            &[],
        )
        .unwrap();
        assert_eq!(context.get("a"), Some(&yaml("1")));
        assert_eq!(context.get("b"), Some(&yaml("{x: 1, y: 2}")));
        assert_eq!(context.get("c"), Some(&yaml("3")));
    }

    #[test]
    fn test_missing_configured_data_file_is_skipped() {
        let context = load_data(
            vec![yaml("a: 1")],
            &[PathBuf::from("no/such/data.yaml")],
        )
        .unwrap();
        assert_eq!(context.get("a"), Some(&yaml("1")));
    }

    #[test]
    fn test_data_file_overrides_explicit_layers() {
        let dir = tempdir().unwrap();
        let values = dir.path().join("values.yaml");
        fs::write(&values, "a: from-file\n").unwrap();

        let context = load_data(vec![yaml("a: from-layer")], &[values]).unwrap();
        assert_eq!(context.get("a"), Some(&yaml("from-file")));
    }

    #[test]
    fn test_data_file_with_scalar_root_is_rejected() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("data.yaml");
        fs::write(&bad, "just a string\n").unwrap();

        let err = load_data(vec![], &[bad]).unwrap_err();
        assert!(matches!(err, ComposeError::DataFileNotMapping { .. }));
    }

    #[test]
    fn test_dotlist_nesting_and_scalars() {
        let layer = parse_dotlist(&[
            "hosts=a,b".to_string(),
            "db.port=5432".to_string(),
            "db.debug=true".to_string(),
        ])
        .unwrap();
        assert_eq!(layer, yaml("hosts: 'a,b'\ndb: {port: 5432, debug: true}"));
    }

    #[test]
    fn test_dotlist_rejects_missing_equals() {
        let err = parse_dotlist(&["oops".to_string()]).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidDataOverride { .. }));
    }
}
