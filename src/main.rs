// SPDX-License-Identifier: GPL-3.0-only

use camera_detector::app::DetectMode;
use camera_detector::backends::camera::CameraPosition;
use camera_detector::backends::orientation::Orientation;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-detector")]
#[command(about = "Camera session controller with face and text detection")]
#[command(version = camera_detector::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Run live detection on the virtual camera
    Run {
        /// Detect mode (face, text-rect, text, ocr)
        #[arg(short, long)]
        mode: Option<DetectMode>,

        /// Camera position (front, back)
        #[arg(short, long)]
        position: Option<CameraPosition>,

        /// Stream this image instead of the test pattern
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Stop after this many detection passes
        #[arg(short, long)]
        frames: Option<u64>,

        /// Device orientation reported while running
        #[arg(short, long, default_value = "portrait")]
        orientation: Orientation,
    },

    /// Run one detection pass on an image file
    Detect {
        /// Image to process
        image: PathBuf,

        /// Detect mode (face, text-rect, text, ocr)
        #[arg(short, long)]
        mode: Option<DetectMode>,

        /// Device orientation the image was captured in
        #[arg(short, long, default_value = "portrait")]
        orientation: Orientation,

        /// Save cropped text regions (default: ~/Pictures/camera-detector)
        #[arg(short, long)]
        save_crops: Option<Option<PathBuf>>,
    },

    /// Show the configuration file path and effective settings
    Config {
        /// Write the effective settings to the configuration file
        #[arg(short, long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_detector=trace
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
        Commands::List => cli::list_cameras(),
        Commands::Run {
            mode,
            position,
            image,
            frames,
            orientation,
        } => {
            cli::run(cli::RunOptions {
                mode,
                position,
                image,
                frames,
                orientation,
            })
            .await
        }
        Commands::Detect {
            image,
            mode,
            orientation,
            save_crops,
        } => cli::detect_image(image, mode, orientation, save_crops).await,
        Commands::Config { write } => cli::show_config(write),
    }
}
