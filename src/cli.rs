use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "syncwall")]
#[command(author, version, about = "Synchronized multi-stream HLS wall")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the transcoders and serve the playlists
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Source file or rtsp:// URL (overrides config)
        #[arg(short, long)]
        source: Option<String>,

        /// Number of streams (overrides config)
        #[arg(short = 'n', long)]
        streams: Option<u32>,
    },

    /// List the configured streams and their output locations
    Streams,

    /// Check that the transcoding engine is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Play every stream of a running server headlessly and keep them in sync
    Watch {
        /// Base URL of the server
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,

        /// Arm synchronization immediately
        #[arg(long)]
        arm: bool,
    },

    /// Display version information
    Version,
}
