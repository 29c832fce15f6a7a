//! stackpose - assemble docker-compose files from versioned fragments
//!
//! stackpose builds a single compose document out of a directory of
//! templated, versioned source fragments plus externally supplied data:
//! enumerate the fragment files, pick the winning version of each
//! logically-named fragment, render each winner into structured data,
//! deep-merge the results in deterministic order, and validate the final
//! document.

pub mod assemble;
pub mod cli;
pub mod compose;
pub mod config;
pub mod data;
pub mod error;
pub mod merge;
pub mod provider;
pub mod resolver;
pub mod source;
pub mod ui;
pub mod version;

// Re-exports for convenience
pub use assemble::{assemble, merge_fragments, AssembleOptions};
pub use compose::{ComposeDocument, ServiceSpec};
pub use config::{load_settings, Settings, SettingsWarning};
pub use data::{load_data, parse_dotlist, DataContext};
pub use error::{ComposeError, ComposeResult};
pub use merge::{deep_merge, merge_all};
pub use provider::{
    default_providers, ContentProvider, FragmentFn, FragmentSymbol, ParamSpec, ParamType,
    PluginProvider, PluginRegistry, ProviderContext, TemplateProvider,
};
pub use resolver::{resolve, resolve_files, CandidateFile, ResolvedFile, ResolvedFileSet};
pub use source::SourceSpec;
pub use version::{Version, VersionSpec};
