//! Command line interface for `aidj-watch`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Follow aidj render jobs and manage uploaded audio.
#[derive(Debug, Parser)]
#[command(name = "aidj-watch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// WebSocket base URL. Overrides `AIDJ_WS_BASE_URL`.
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    /// HTTP API URL. Overrides `AIDJ_API_URL`.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream a job's progress until it completes, fails or is cancelled.
    Follow {
        /// Job identifier returned when the mix was requested.
        job_id: String,
    },

    /// Upload an MP3 file and print its public URL.
    Upload {
        /// Path to the `.mp3` file.
        path: PathBuf,
    },

    /// List uploaded files.
    Files,

    /// Delete an uploaded file.
    Delete {
        /// Stored file name, e.g. `song.mp3`.
        filename: String,
    },
}
