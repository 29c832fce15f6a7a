//! The assembly pipeline
//!
//! Enumerate, resolve, render, merge, validate — strictly in resolved
//! order, one file at a time.

use serde_yaml_ng::{Mapping, Value};

use crate::compose::ComposeDocument;
use crate::data::DataContext;
use crate::error::{ComposeError, ComposeResult};
use crate::merge::deep_merge;
use crate::provider::{find_provider, ContentProvider, ProviderContext};
use crate::resolver::{resolve, ResolvedFileSet};
use crate::source::SourceSpec;

/// Pipeline knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    /// Skip files no provider understands instead of failing
    pub skip_unknown_formats: bool,
}

/// Assemble and validate the compose document for one source spec.
pub fn assemble(
    spec: &SourceSpec,
    providers: &[Box<dyn ContentProvider>],
    data: &DataContext,
    options: AssembleOptions,
) -> ComposeResult<ComposeDocument> {
    let resolved = resolve(spec)?;
    let merged = merge_fragments(&resolved, spec, providers, data, options)?;
    ComposeDocument::from_value(merged)
}

/// Fold every resolved file's fragment into one mapping.
pub fn merge_fragments(
    resolved: &ResolvedFileSet,
    spec: &SourceSpec,
    providers: &[Box<dyn ContentProvider>],
    data: &DataContext,
    options: AssembleOptions,
) -> ComposeResult<Value> {
    let ctx = ProviderContext {
        src_dir: &spec.dir,
        data,
    };

    let mut merged = Value::Mapping(Mapping::new());
    for file in resolved.iter() {
        let provider = match find_provider(providers, &file.path) {
            Some(provider) => provider,
            None if options.skip_unknown_formats => continue,
            None => {
                return Err(ComposeError::UnsupportedFormat {
                    path: file.path.clone(),
                })
            }
        };
        let fragment = provider.load(&file.path, &ctx)?;
        merged = deep_merge(merged, fragment);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::context_from_pairs;
    use crate::provider::{default_providers, FragmentSymbol, PluginRegistry};

    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn yaml(s: &str) -> Value {
        serde_yaml_ng::from_str(s).unwrap()
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn spec_for(dir: &Path) -> SourceSpec {
        SourceSpec {
            dir: dir.to_path_buf(),
            ..SourceSpec::default()
        }
    }

    #[test]
    fn test_end_to_end_template_merge() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "web.yaml",
            "services:\n  web:\n    image: \"nginx:latest\"\n",
        );
        write(
            dir.path(),
            "web.env.yaml",
            "services:\n  web:\n    environment:\n      HOSTS: \"{{ hosts }}\"\n",
        );

        let providers = default_providers(PluginRegistry::new());
        let data = context_from_pairs([("hosts", yaml("a,b"))]);
        let doc = assemble(
            &spec_for(dir.path()),
            &providers,
            &data,
            AssembleOptions::default(),
        )
        .unwrap();

        let web = &doc.services["web"];
        assert_eq!(web.image, "nginx:latest");
        assert_eq!(
            web.environment.as_ref().unwrap().get("HOSTS"),
            Some(&"a,b".to_string())
        );
    }

    #[test]
    fn test_version_resolution_feeds_the_merge() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "web.yaml",
            "services: {web: {image: 'nginx:1'}}\n",
        );
        write(
            dir.path(),
            "web.v2.yaml",
            "services: {web: {image: 'nginx:2'}}\n",
        );

        let providers = default_providers(PluginRegistry::new());
        let data = DataContext::new();
        let doc = assemble(
            &spec_for(dir.path()),
            &providers,
            &data,
            AssembleOptions::default(),
        )
        .unwrap();
        assert_eq!(doc.services["web"].image, "nginx:2");
    }

    #[test]
    fn test_unknown_format_fails_unless_lenient() {
        let dir = tempdir().unwrap();
        write(dir.path(), "web.yaml", "services: {web: {image: nginx}}\n");
        write(dir.path(), "notes.toml", "x = 1\n");

        let providers = default_providers(PluginRegistry::new());
        let data = DataContext::new();
        let spec = spec_for(dir.path());

        let err = assemble(&spec, &providers, &data, AssembleOptions::default()).unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedFormat { .. }));

        let doc = assemble(
            &spec,
            &providers,
            &data,
            AssembleOptions {
                skip_unknown_formats: true,
            },
        )
        .unwrap();
        assert_eq!(doc.services["web"].image, "nginx");
    }

    #[test]
    fn test_plugin_fragments_merge_with_templates() {
        let dir = tempdir().unwrap();
        write(dir.path(), "web.yaml", "services: {web: {image: nginx}}\n");
        write(dir.path(), "proxy.plug", "");

        let mut registry = PluginRegistry::new();
        registry.register(
            "proxy",
            "compose",
            FragmentSymbol::Value(yaml("services: {proxy: {image: 'traefik:v3'}}")),
        );
        let providers = default_providers(registry);
        let data = DataContext::new();
        let doc = assemble(
            &spec_for(dir.path()),
            &providers,
            &data,
            AssembleOptions::default(),
        )
        .unwrap();

        assert_eq!(doc.services.len(), 2);
        assert_eq!(doc.services["proxy"].image, "traefik:v3");
    }

    #[test]
    fn test_later_files_override_in_sorted_order() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.base.yaml",
            "services: {web: {image: nginx, ports: ['80:80', '443:443']}}\n",
        );
        write(
            dir.path(),
            "z.override.yaml",
            "services: {web: {ports: ['8080:80']}}\n",
        );

        let providers = default_providers(PluginRegistry::new());
        let data = DataContext::new();
        let doc = assemble(
            &spec_for(dir.path()),
            &providers,
            &data,
            AssembleOptions::default(),
        )
        .unwrap();

        // Sequences replace wholesale; the later file's ports win.
        assert_eq!(
            doc.services["web"].ports,
            Some(vec!["8080:80".to_string()])
        );
    }
}
