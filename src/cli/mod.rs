//! CLI Module
//!
//! Command-line interface for rendering and inspecting Sonoscape scenes.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sonoscape - spatial audio timeline renderer
#[derive(Parser, Debug)]
#[command(name = "sonoscape")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a scene to a WAV file
    #[command(name = "render")]
    Render {
        /// Scene description (JSON)
        scene: PathBuf,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Bits per sample: 16, 24 or 32 (float)
        #[arg(long, default_value_t = 16)]
        bit_depth: u16,

        /// Override the scene's reverb level
        #[arg(long)]
        reverb: Option<f32>,

        /// Also write the export report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print a scene's sources and timeline
    #[command(name = "inspect")]
    Inspect {
        /// Scene description (JSON)
        scene: PathBuf,
    },

    /// Print one source's trajectory over its clip
    #[command(name = "trace")]
    Trace {
        /// Scene description (JSON)
        scene: PathBuf,

        /// Source name or id
        source: String,

        /// Sampling interval in seconds
        #[arg(long, default_value_t = 0.5)]
        step: f64,
    },

    /// Simulate live playback and print voice start/stop events
    #[command(name = "preview")]
    Preview {
        /// Scene description (JSON)
        scene: PathBuf,

        /// Simulated host tick in milliseconds
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,

        /// Preview sample rate in Hz
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },

    /// Write the default engine configuration
    #[command(name = "init-config")]
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}
