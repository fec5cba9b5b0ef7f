//! Sonoscape CLI
//!
//! Command-line interface for the Sonoscape spatial audio renderer.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sonoscape::cli::commands;
use sonoscape::cli::{Cli, Commands};
use sonoscape::config::EngineConfig;
use sonoscape::render::ExportSettings;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Sonoscape v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref()).context("loading engine config")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Sonoscape v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &EngineConfig) -> Result<()> {
    match cmd {
        Commands::Render {
            scene,
            output,
            sample_rate,
            bit_depth,
            reverb,
            report,
        } => {
            let mut settings = ExportSettings::new(sample_rate, commands::parse_bit_depth(bit_depth)?);
            if let Some(level) = reverb {
                settings = settings.with_reverb_level(level);
            }
            commands::render(&scene, &output, settings, config, report.as_deref())
                .with_context(|| format!("rendering {}", scene.display()))
        }
        Commands::Inspect { scene } => Ok(commands::inspect(&scene)?),
        Commands::Trace {
            scene,
            source,
            step,
        } => Ok(commands::trace(&scene, &source, step)?),
        Commands::Preview {
            scene,
            tick_ms,
            sample_rate,
        } => Ok(commands::preview(&scene, tick_ms, sample_rate, config)?),
        Commands::InitConfig { path } => Ok(commands::init_config(&path)?),
    }
}
