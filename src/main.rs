//! stackpose CLI - assemble docker-compose files from versioned fragments
//!
//! Usage: stackpose <COMMAND>
//!
//! Commands:
//!   output   Print the assembled compose document to stdout
//!   compose  Assemble the document and hand it to docker compose

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use anyhow::{bail, Context, Result};
use clap::Parser;

use stackpose::cli::{Cli, Commands, OutputFormat};
use stackpose::compose::ComposeDocument;
use stackpose::config::{self, Settings, DEFAULT_SETTINGS_PATHS};
use stackpose::data::{load_data, parse_dotlist, DataContext};
use stackpose::error::ComposeError;
use stackpose::provider::{default_providers, PluginRegistry};
use stackpose::source::SourceSpec;
use stackpose::version::VersionSpec;
use stackpose::{assemble, ui, AssembleOptions};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let candidates: Vec<PathBuf> = if cli.config.is_empty() {
        DEFAULT_SETTINGS_PATHS.iter().map(PathBuf::from).collect()
    } else {
        cli.config.clone()
    };

    let (settings, warnings) = config::load_settings(&candidates)?;
    for warning in &warnings {
        ui::warn(&format!(
            "unknown settings key '{}' in {}",
            warning.key,
            warning.file.display()
        ));
    }

    let src = apply_src_overrides(settings.src.clone(), &cli)?;

    match &cli.command {
        Commands::Output { data, format } => {
            let doc = assemble_document(&src, &settings, data, cli.lenient)?;
            match format {
                OutputFormat::Yaml => print!("{}", doc.to_yaml()?),
                OutputFormat::Json => println!("{}", doc.to_json()?),
            }
            Ok(())
        }
        Commands::Compose {
            data,
            dry_run,
            command,
        } => {
            let doc = assemble_document(&src, &settings, data, cli.lenient)?;
            run_compose(&doc, command, *dry_run)
        }
    }
}

fn assemble_document(
    src: &SourceSpec,
    settings: &Settings,
    data_overrides: &[String],
    lenient: bool,
) -> Result<ComposeDocument> {
    let layers = vec![settings.data.clone(), parse_dotlist(data_overrides)?];
    let context: DataContext = load_data(layers, &settings.data_files)?;

    let providers = default_providers(PluginRegistry::new());
    let doc = assemble(
        src,
        &providers,
        &context,
        AssembleOptions {
            skip_unknown_formats: lenient,
        },
    )?;
    Ok(doc)
}

fn apply_src_overrides(mut src: SourceSpec, cli: &Cli) -> Result<SourceSpec> {
    if let Some(dir) = &cli.src_dir {
        src.dir = dir.clone();
    }
    if let Some(glob) = &cli.src_glob {
        src.glob = glob.clone();
    }
    if !cli.src_exclude_patterns.is_empty() {
        src.exclude_patterns = cli.src_exclude_patterns.clone();
    }
    if let Some(spec) = &cli.src_version_spec {
        src.version_spec = parse_spec(spec)?;
    }
    if !cli.src_version_spec_mapping.is_empty() {
        let mut mapping = BTreeMap::new();
        for entry in &cli.src_version_spec_mapping {
            let (name, spec) = entry
                .split_once('=')
                .with_context(|| format!("expected name=spec, got '{entry}'"))?;
            mapping.insert(name.to_string(), parse_spec(spec)?);
        }
        src.version_spec_mapping = mapping;
    }
    Ok(src)
}

fn parse_spec(input: &str) -> Result<VersionSpec> {
    input
        .parse()
        .map_err(|e: stackpose::version::ParseVersionError| {
            ComposeError::InvalidVersionSpec {
                input: input.to_string(),
                message: e.to_string(),
            }
            .into()
        })
}

fn run_compose(doc: &ComposeDocument, command: &[String], dry_run: bool) -> Result<()> {
    let rendered = doc.to_yaml()?;

    let temp_file = tempfile::Builder::new()
        .prefix("docker-compose-")
        .suffix(".yaml")
        .tempfile_in(".")
        .context("failed to create temporary compose file")?;
    std::fs::write(temp_file.path(), rendered)?;

    let display_args: Vec<String> = ["compose", "-f"]
        .into_iter()
        .map(str::to_string)
        .chain(std::iter::once(temp_file.path().display().to_string()))
        .chain(command.iter().cloned())
        .collect();
    ui::status(&format!("Running 'docker {}'", display_args.join(" ")));

    if dry_run {
        ui::status("Dry run enabled, not executing command.");
        return Ok(());
    }

    let status = ProcessCommand::new("docker")
        .arg("compose")
        .arg("-f")
        .arg(temp_file.path())
        .args(command)
        .status()
        .context("failed to run docker compose")?;

    if !status.success() {
        bail!(
            "docker compose exited with status {}",
            status.code().unwrap_or(1)
        );
    }
    Ok(())
}
