//! Command-line driver for reflection registration
//!
//! `onda-aotreg run` executes the configured passes over a module path and
//! writes the reflection manifest; `onda-aotreg preview` runs the same
//! passes and prints what they would register without writing anything.

use anyhow::Context;
use clap::{Parser, Subcommand};
use onda_aotreg::{AotregConfig, ClassResolver, Pipeline, PipelineReport, ReflectionRegistry};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onda-aotreg")]
#[command(about = "Registers reflectively-reached classes for Onda native image builds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the registration passes and write the reflection manifest
    Run {
        /// Directory to scan for .onb artifacts (repeatable)
        #[arg(short = 'p', long = "module-path", required = true)]
        module_path: Vec<PathBuf>,

        /// Pass configuration file (TOML); overrides --app-prefix
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Application namespace prefix for the standard passes (repeatable)
        #[arg(long = "app-prefix")]
        app_prefixes: Vec<String>,

        /// Where to write the manifest
        #[arg(short, long, default_value = "reflect-manifest.json")]
        out: PathBuf,
    },

    /// Run the registration passes and print the selection without writing
    Preview {
        /// Directory to scan for .onb artifacts (repeatable)
        #[arg(short = 'p', long = "module-path", required = true)]
        module_path: Vec<PathBuf>,

        /// Pass configuration file (TOML); overrides --app-prefix
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Application namespace prefix for the standard passes (repeatable)
        #[arg(long = "app-prefix")]
        app_prefixes: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            module_path,
            config,
            app_prefixes,
            out,
        } => run(&module_path, config.as_deref(), &app_prefixes, &out),
        Commands::Preview {
            module_path,
            config,
            app_prefixes,
        } => preview(&module_path, config.as_deref(), &app_prefixes),
    }
}

fn load_config(path: Option<&Path>, app_prefixes: &[String]) -> anyhow::Result<AotregConfig> {
    match path {
        Some(path) => AotregConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(AotregConfig::standard(app_prefixes)),
    }
}

fn execute(
    module_path: &[PathBuf],
    config: Option<&Path>,
    app_prefixes: &[String],
) -> anyhow::Result<(ReflectionRegistry, PipelineReport)> {
    let config = load_config(config, app_prefixes)?;
    let pipeline = Pipeline::from_config(&config).context("Failed to build pass pipeline")?;
    let resolver =
        ClassResolver::from_module_path(module_path).context("Failed to index module path")?;
    let mut registry = ReflectionRegistry::new();
    let report = pipeline.run(module_path, &resolver, &mut registry)?;
    Ok((registry, report))
}

fn run(
    module_path: &[PathBuf],
    config: Option<&Path>,
    app_prefixes: &[String],
    out: &Path,
) -> anyhow::Result<()> {
    let (mut registry, report) = execute(module_path, config, app_prefixes)?;
    registry.seal();

    let manifest = registry.manifest();
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(out, json)
        .with_context(|| format!("Failed to write manifest to {}", out.display()))?;

    for pass in &report.passes {
        println!(
            "{}: {} matched, {} newly registered",
            pass.pass, pass.matched, pass.registered
        );
    }
    println!(
        "Wrote {} classes to {}",
        manifest.classes.len(),
        out.display()
    );
    Ok(())
}

fn preview(
    module_path: &[PathBuf],
    config: Option<&Path>,
    app_prefixes: &[String],
) -> anyhow::Result<()> {
    let (_registry, report) = execute(module_path, config, app_prefixes)?;
    for pass in &report.passes {
        println!("{} ({} matched):", pass.pass, pass.matched);
        for class in &pass.classes {
            println!("  {class}");
        }
    }
    println!(
        "{} classes would be registered",
        report.total_registered()
    );
    Ok(())
}
