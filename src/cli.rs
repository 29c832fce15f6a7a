use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// stackpose - assemble docker-compose files from versioned fragments
#[derive(Parser, Debug)]
#[command(name = "stackpose")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file candidates (first existing wins)
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    pub config: Vec<PathBuf>,

    /// Override the source directory
    #[arg(long, global = true, value_name = "DIR")]
    pub src_dir: Option<PathBuf>,

    /// Override the inclusion glob
    #[arg(long, global = true, value_name = "GLOB")]
    pub src_glob: Option<String>,

    /// Override the exclusion regex patterns
    #[arg(long = "src-exclude", global = true, value_name = "REGEX")]
    pub src_exclude_patterns: Vec<String>,

    /// Override the global version constraint
    #[arg(long, global = true, value_name = "SPEC")]
    pub src_version_spec: Option<String>,

    /// Override per-name version constraints (name=spec, repeatable)
    #[arg(long = "src-version-spec-map", global = true, value_name = "NAME=SPEC")]
    pub src_version_spec_mapping: Vec<String>,

    /// Skip source files no provider understands instead of failing
    #[arg(long, global = true)]
    pub lenient: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the assembled compose document to stdout
    Output {
        /// Additional template data (key=value, dotted keys nest)
        #[arg(short = 'd', long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Assemble the document and hand it to docker compose
    Compose {
        /// Additional template data (key=value, dotted keys nest)
        #[arg(short = 'd', long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Print the command without executing it
        #[arg(long)]
        dry_run: bool,

        /// Command and arguments passed through to docker compose
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}
