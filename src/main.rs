// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use detection_overlay::constants::{app_info, demo};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "detection-overlay")]
#[command(about = "Run the detection overlay pipeline on synthetic frames")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed generated frames through the pipeline and print detection events
    Run {
        /// Frame width in pixels
        #[arg(long, default_value_t = demo::DEFAULT_WIDTH)]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value_t = demo::DEFAULT_HEIGHT)]
        height: u32,

        /// Rotation tag attached to every frame (0, 90, 180, 270)
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        rotation: i32,

        /// Frames per second
        #[arg(long, default_value_t = demo::DEFAULT_FPS)]
        fps: u32,

        /// Number of frames to generate
        #[arg(short = 'n', long, default_value_t = demo::DEFAULT_FRAMES)]
        frames: u64,

        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disable drawing boxes into frames
        #[arg(long)]
        no_overlay: bool,

        /// Use the colour overlay instead of the luma stroke
        #[arg(long)]
        color: bool,

        /// Save the last output frame as PNG (file or directory)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=detection_overlay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            width,
            height,
            rotation,
            fps,
            frames,
            config,
            no_overlay,
            color,
            snapshot,
        } => cli::run(cli::RunOptions {
            width,
            height,
            rotation,
            fps,
            frames,
            config,
            no_overlay,
            color,
            snapshot,
        }),
        Commands::Config => cli::print_default_config(),
    }
}
