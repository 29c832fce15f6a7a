//! Error types for stackpose
//!
//! Uses `thiserror` for library errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stackpose operations
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Main error type for stackpose operations
#[derive(Error, Debug)]
pub enum ComposeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Source directory does not exist
    #[error("source directory not found: {path}")]
    SourceDirNotFound { path: PathBuf },

    /// A data file referenced with `@path` does not exist
    #[error("data file not found: {path}")]
    DataFileNotFound { path: PathBuf },

    /// A data file has an extension no loader understands
    #[error("unsupported data file format '{extension}' for {path}")]
    UnsupportedDataFormat { path: PathBuf, extension: String },

    /// No content provider matched the file extension
    #[error("no provider found for file: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// A recognized version suffix failed to parse
    #[error("malformed version '{token}' in file name {path}")]
    MalformedVersion { path: PathBuf, token: String },

    /// A version constraint expression failed to parse
    #[error("invalid version constraint '{input}': {message}")]
    InvalidVersionSpec { input: String, message: String },

    /// An exclusion pattern failed to compile
    #[error("invalid exclude pattern '{pattern}': {message}")]
    InvalidExcludePattern { pattern: String, message: String },

    /// The inclusion glob failed to compile
    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Template rendering failed (syntax error or undefined variable)
    #[error("template error in {path}: {message}")]
    TemplateRender { path: PathBuf, message: String },

    /// Rendered or raw fragment is not valid YAML
    #[error("invalid fragment in {path}: {message}")]
    FragmentParse { path: PathBuf, message: String },

    /// Plugin evaluation failed (missing symbol, bad parameter, bad return)
    #[error("plugin error in {path}: {message}")]
    DynamicEvaluation { path: PathBuf, message: String },

    /// Settings file could not be parsed
    #[error("invalid settings in {path}: {message}")]
    Settings { path: PathBuf, message: String },

    /// A `-d`/`--data` override is not `key=value`
    #[error("invalid data override '{item}': expected key=value")]
    InvalidDataOverride { item: String },

    /// A data file parsed, but its root is not a mapping
    #[error("data file {path} must contain a mapping at the top level")]
    DataFileNotMapping { path: PathBuf },

    /// Merged document has no usable `services` mapping
    #[error("merged document: {message}")]
    MissingServices { message: String },

    /// A service entry violates the output schema
    #[error("service '{service}': field '{field}' {message}")]
    Validation {
        service: String,
        field: String,
        message: String,
    },
}
