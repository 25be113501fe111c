//! Command line front-end for rendering asset tags.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};
use asset_tags::{AssetPipeline, AssetType, Context, PipelineConfig, RenderMode};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "asset-tags", version, about = "Render stylesheet and script package tags")]
struct Cli {
  /// Directory containing the pipeline configuration.
  #[arg(long, global = true, default_value = ".")]
  config: PathBuf,

  /// Log level used when RUST_LOG is not set.
  #[arg(long, global = true, default_value = "warn")]
  log_level: String,

  /// Reference pre-built bundles regardless of configuration.
  #[arg(long, global = true, conflicts_with = "unbundled")]
  bundled: bool,

  /// Reference individual compiled sources regardless of configuration.
  #[arg(long, global = true)]
  unbundled: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Render the tags for a single package.
  Render {
    /// Package type.
    #[arg(value_enum)]
    kind: Kind,
    /// Package name, or a bare asset path.
    name: String,
  },
  /// Expand every asset tag in a page and print the result.
  Expand {
    /// Page to expand.
    page: PathBuf,
    /// Page variable as `key=value`; may be repeated.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
  Css,
  Js,
}

impl From<Kind> for AssetType {
  fn from(kind: Kind) -> Self {
    match kind {
      Kind::Css => AssetType::Style,
      Kind::Js => AssetType::Script,
    }
  }
}

fn initialize_tracing(level: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

fn load_pipeline(cli: &Cli) -> Result<AssetPipeline> {
  let pipeline = match PipelineConfig::find(&cli.config) {
    Some(path) => {
      let config = PipelineConfig::load(&path)?;
      tracing::debug!("loaded configuration from {}", path.display());
      AssetPipeline::from_config(&config, &cli.config)
    }
    None => {
      tracing::warn!(
        "no configuration found in {}, using defaults",
        cli.config.display()
      );
      AssetPipeline::discover(&cli.config)
    }
  };

  Ok(if cli.bundled {
    pipeline.with_mode(RenderMode::Bundled)
  } else if cli.unbundled {
    pipeline.with_mode(RenderMode::Unbundled)
  } else {
    pipeline
  })
}

fn parse_vars(vars: &[String]) -> Result<Context> {
  vars
    .iter()
    .map(|pair| {
      let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {pair:?}"))?;
      Ok((key.to_string(), serde_json::Value::String(value.to_string())))
    })
    .collect()
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  initialize_tracing(&cli.log_level);

  let pipeline = load_pipeline(&cli)?;
  let output = match &cli.command {
    Command::Render { kind, name } => pipeline
      .render((*kind).into(), name)
      .with_context(|| format!("failed to render package {name:?}"))?,
    Command::Expand { page, vars } => {
      let source = fs::read_to_string(page)
        .with_context(|| format!("failed to read {}", page.display()))?;
      pipeline
        .expand_page(&source, &parse_vars(vars)?)
        .with_context(|| format!("failed to expand {}", page.display()))?
    }
  };

  if !output.is_empty() {
    println!("{output}");
  }
  Ok(())
}
