use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cloud-music-bot",
    about = "Cloud Music Bot - Send a song name on Telegram, get the audio file back",
    version,
    long_about = "A Telegram bot that searches for a song by name, downloads the best match with yt-dlp, converts it to audio with ffmpeg and replies with the file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "CLOUD_MUSIC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server and handle Telegram updates
    Serve {
        /// Address to bind (overrides config and HOST)
        #[arg(long, value_name = "ADDR")]
        host: Option<String>,

        /// Port to bind (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Search and download a track locally without Telegram
    Fetch {
        /// Song name to search for
        #[arg(value_name = "QUERY")]
        query: String,

        /// Directory to store the file in (defaults to the download directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that yt-dlp and ffmpeg are installed
    Doctor,
}
