use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lightmode")]
#[command(about = "Dark-to-light video converter with live progress and logs", long_about = None)]
pub struct Cli {
    /// Video to preload in the TUI
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Start in fast mode (downscale to the pixel budget, fastest preset)
    #[arg(long, global = true)]
    pub fast: bool,

    /// Debug-level diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert one video and save the result
    Convert {
        /// Path to the video file
        file: PathBuf,

        /// Directory the output is saved into (defaults to current directory)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Print a JSON job summary instead of progress text
        #[arg(long)]
        json: bool,
    },

    /// Show the engine command for a video without running it (dry run)
    Plan {
        /// Path to the video file
        file: PathBuf,

        /// Skip probing and plan for these dimensions, e.g. 3840x2160
        #[arg(long, value_name = "WxH")]
        size: Option<String>,
    },

    /// Probe a video file for duration and dimensions
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Check if ffmpeg and ffprobe are installed
    CheckEngine,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Parse `WxH` (also accepts `X`).
pub fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
