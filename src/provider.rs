//! Content providers
//!
//! A provider turns one resolved file into a structured fragment.
//! Providers declare the (possibly compound) extensions they handle and
//! are tried in registration order; the first match wins.
//!
//! Two providers are built in: [`TemplateProvider`] renders YAML files
//! through minijinja against the data context, and [`PluginProvider`]
//! serves fragments from statically registered plugin modules keyed by a
//! marker file's stem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use minijinja::{path_loader, Environment, UndefinedBehavior};
use serde_yaml_ng::Value;

use crate::data::DataContext;
use crate::error::{ComposeError, ComposeResult};
use crate::resolver::logical_file_stem;
use crate::source::slash_path;

/// Shared state handed to every provider call.
pub struct ProviderContext<'a> {
    /// Base directory of the current source spec (template loader root,
    /// plugin scope)
    pub src_dir: &'a Path,
    /// The merged template data for this run
    pub data: &'a DataContext,
}

/// Interprets a single resolved file into a structured fragment.
pub trait ContentProvider {
    /// Extensions handled, without the leading dot. Compound extensions
    /// (`yaml.j2`) are matched against the end of the file name.
    fn extensions(&self) -> &[&'static str];

    /// True when this provider handles the file.
    fn file_match(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        self.extensions().iter().any(|ext| {
            name.len() > ext.len() + 1
                && name.ends_with(ext)
                && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
        })
    }

    /// Produce the fragment for `path`.
    fn load(&self, path: &Path, ctx: &ProviderContext<'_>) -> ComposeResult<Value>;
}

/// First provider claiming the file, in registration order.
pub fn find_provider<'a>(
    providers: &'a [Box<dyn ContentProvider>],
    path: &Path,
) -> Option<&'a dyn ContentProvider> {
    providers
        .iter()
        .find(|p| p.file_match(path))
        .map(|p| p.as_ref())
}

/// The default provider stack: templates first, then plugins.
pub fn default_providers(plugins: PluginRegistry) -> Vec<Box<dyn ContentProvider>> {
    vec![
        Box::new(TemplateProvider),
        Box::new(PluginProvider::new(plugins)),
    ]
}

/// Renders a file through minijinja and parses the result as YAML.
///
/// Rendering is strict: referencing an undefined variable fails the run
/// instead of producing empty output. The loader is rooted at the source
/// directory, so templates can `{% include %}` siblings.
pub struct TemplateProvider;

impl ContentProvider for TemplateProvider {
    fn extensions(&self) -> &[&'static str] {
        &["yaml", "yml", "yaml.j2", "yml.j2"]
    }

    fn load(&self, path: &Path, ctx: &ProviderContext<'_>) -> ComposeResult<Value> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_loader(path_loader(ctx.src_dir));

        let name = template_name(path, ctx.src_dir);

        let rendered = env
            .get_template(&name)
            .and_then(|template| template.render(ctx.data.as_mapping()))
            .map_err(|e| ComposeError::TemplateRender {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        serde_yaml_ng::from_str(&rendered).map_err(|e| ComposeError::FragmentParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Template name relative to the loader root. Leading `./` components
/// are stripped from both sides so relative source dirs resolve.
fn template_name(path: &Path, src_dir: &Path) -> String {
    let path = path.strip_prefix(".").unwrap_or(path);
    let base = src_dir.strip_prefix(".").unwrap_or(src_dir);
    slash_path(path.strip_prefix(base).unwrap_or(path))
}

/// Symbol names tried, in priority order, when a plugin module is
/// evaluated.
pub const PLUGIN_SYMBOLS: [&str; 2] = ["compose", "COMPOSE"];

/// Declared type of a plugin parameter, used to coerce the bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Receives the entire data context as a mapping
    Context,
    String,
    Bool,
    Integer,
    Float,
    Sequence,
    Mapping,
    /// No coercion
    Any,
}

/// One declared parameter of a fragment function.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    required: bool,
}

impl ParamSpec {
    /// A parameter that must be bound from the data context.
    pub fn required(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    /// A parameter with a default: silently omitted when the context has
    /// no entry for it.
    pub fn optional(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Arguments bound against the data context for one fragment call.
/// Parameters that were omitted (optional, no context entry) are absent.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs(BTreeMap<String, Value>);

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn sequence(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(Value::as_sequence)
    }
}

type FragmentCallable = Box<dyn Fn(&BoundArgs) -> ComposeResult<Value> + Send + Sync>;

/// A callable fragment: declared parameters plus the function itself.
pub struct FragmentFn {
    params: Vec<ParamSpec>,
    func: FragmentCallable,
}

impl FragmentFn {
    pub fn new<F>(params: Vec<ParamSpec>, func: F) -> Self
    where
        F: Fn(&BoundArgs) -> ComposeResult<Value> + Send + Sync + 'static,
    {
        Self {
            params,
            func: Box::new(func),
        }
    }
}

/// What a registered symbol resolves to: a static structured value or a
/// fragment function.
pub enum FragmentSymbol {
    Value(Value),
    Function(FragmentFn),
}

type ModuleSymbols = BTreeMap<String, FragmentSymbol>;

/// Statically registered plugin modules.
///
/// Modules registered under a scope directory are only visible while that
/// directory is on the active search-path stack; global modules are
/// always visible. The stack is pushed for the duration of a single
/// file's evaluation and restored on every exit path.
#[derive(Default)]
pub struct PluginRegistry {
    global: BTreeMap<String, ModuleSymbols>,
    scoped: BTreeMap<PathBuf, BTreeMap<String, ModuleSymbols>>,
    search_paths: Mutex<Vec<PathBuf>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol visible to every source directory.
    pub fn register(&mut self, module: &str, symbol: &str, fragment: FragmentSymbol) {
        self.global
            .entry(module.to_string())
            .or_default()
            .insert(symbol.to_string(), fragment);
    }

    /// Register a symbol visible only while `dir` is the active scope.
    pub fn register_scoped(
        &mut self,
        dir: impl Into<PathBuf>,
        module: &str,
        symbol: &str,
        fragment: FragmentSymbol,
    ) {
        self.scoped
            .entry(dir.into())
            .or_default()
            .entry(module.to_string())
            .or_default()
            .insert(symbol.to_string(), fragment);
    }

    fn enter_scope(&self, dir: &Path) -> SearchPathGuard<'_> {
        self.lock_paths().push(dir.to_path_buf());
        SearchPathGuard { registry: self }
    }

    fn lookup(&self, module: &str, symbol: &str) -> Option<&FragmentSymbol> {
        let paths = self.lock_paths();
        for dir in paths.iter().rev() {
            if let Some(found) = self
                .scoped
                .get(dir.as_path())
                .and_then(|modules| modules.get(module))
                .and_then(|symbols| symbols.get(symbol))
            {
                return Some(found);
            }
        }
        drop(paths);
        self.global
            .get(module)
            .and_then(|symbols| symbols.get(symbol))
    }

    fn lock_paths(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        self.search_paths
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[cfg(test)]
    fn scope_depth(&self) -> usize {
        self.lock_paths().len()
    }
}

/// Restores the search-path stack when evaluation of one file ends,
/// whether it returned a fragment or an error.
struct SearchPathGuard<'a> {
    registry: &'a PluginRegistry,
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        let _ = self.registry.lock_paths().pop();
    }
}

/// Serves fragments for `.plug` marker files from the registry.
///
/// The marker file's version-stripped stem names the module; the symbols
/// `compose` then `COMPOSE` are tried in that order. The file content
/// itself is never read.
pub struct PluginProvider {
    registry: PluginRegistry,
}

impl PluginProvider {
    pub fn new(registry: PluginRegistry) -> Self {
        Self { registry }
    }

    fn eval(&self, module: &str, path: &Path, ctx: &ProviderContext<'_>) -> ComposeResult<Value> {
        for symbol in PLUGIN_SYMBOLS {
            let fragment = match self.registry.lookup(module, symbol) {
                Some(fragment) => fragment,
                None => continue,
            };
            return match fragment {
                FragmentSymbol::Value(value) => {
                    ensure_structured(value.clone(), path, "fragment value")
                }
                FragmentSymbol::Function(function) => {
                    let args = bind_params(&function.params, ctx.data, path)?;
                    let result = (function.func)(&args)?;
                    ensure_structured(result, path, "fragment return value")
                }
            };
        }

        Err(ComposeError::DynamicEvaluation {
            path: path.to_path_buf(),
            message: format!(
                "no fragment registered for module '{}' (tried symbols: {})",
                module,
                PLUGIN_SYMBOLS.join(", ")
            ),
        })
    }
}

impl ContentProvider for PluginProvider {
    fn extensions(&self) -> &[&'static str] {
        &["plug"]
    }

    fn load(&self, path: &Path, ctx: &ProviderContext<'_>) -> ComposeResult<Value> {
        let module = logical_file_stem(path);
        let _scope = self.registry.enter_scope(ctx.src_dir);
        self.eval(&module, path, ctx)
    }
}

fn ensure_structured(value: Value, path: &Path, what: &str) -> ComposeResult<Value> {
    if value.is_mapping() || value.is_sequence() {
        Ok(value)
    } else {
        Err(ComposeError::DynamicEvaluation {
            path: path.to_path_buf(),
            message: format!("{} must be a mapping or sequence", what),
        })
    }
}

fn bind_params(
    params: &[ParamSpec],
    data: &DataContext,
    path: &Path,
) -> ComposeResult<BoundArgs> {
    let mut bound = BTreeMap::new();
    for param in params {
        if param.ty == ParamType::Context || param.name == "data" {
            bound.insert(param.name.to_string(), data.to_value());
            continue;
        }
        match data.get(param.name) {
            Some(value) => {
                let coerced = coerce(value.clone(), param.ty).map_err(|message| {
                    ComposeError::DynamicEvaluation {
                        path: path.to_path_buf(),
                        message: format!("parameter '{}': {}", param.name, message),
                    }
                })?;
                bound.insert(param.name.to_string(), coerced);
            }
            None if param.required => {
                return Err(ComposeError::DynamicEvaluation {
                    path: path.to_path_buf(),
                    message: format!(
                        "required parameter '{}' not present in data context",
                        param.name
                    ),
                });
            }
            None => {} // optional, omitted
        }
    }
    Ok(BoundArgs(bound))
}

fn coerce(value: Value, ty: ParamType) -> Result<Value, String> {
    match ty {
        ParamType::Any | ParamType::Context => Ok(value),
        ParamType::String => match value {
            Value::String(_) => Ok(value),
            other => Err(format!("expected a string, got {}", kind_of(&other))),
        },
        ParamType::Bool => match value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("cannot read '{}' as a boolean", s)),
            },
            other => Err(format!("expected a boolean, got {}", kind_of(&other))),
        },
        ParamType::Integer => match value {
            Value::Number(ref n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => s
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| format!("cannot read '{}' as an integer", s)),
            other => Err(format!("expected an integer, got {}", kind_of(&other))),
        },
        ParamType::Float => match value {
            Value::Number(n) => Ok(Value::Number(n)),
            Value::String(s) => s
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("cannot read '{}' as a float", s)),
            other => Err(format!("expected a float, got {}", kind_of(&other))),
        },
        ParamType::Sequence => match value {
            Value::Sequence(_) => Ok(value),
            other => Err(format!("expected a sequence, got {}", kind_of(&other))),
        },
        ParamType::Mapping => match value {
            Value::Mapping(_) => Ok(value),
            other => Err(format!("expected a mapping, got {}", kind_of(&other))),
        },
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
