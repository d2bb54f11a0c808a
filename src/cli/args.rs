//! CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};

use crate::domain::config::AppConfig;

/// deskrec - record the desktop and the microphone side by side
#[derive(Parser, Debug)]
#[command(name = "deskrec")]
#[command(version)]
#[command(about = "Record the primary display and an audio input into output.mp4 and output.wav")]
#[command(long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub record: RecordArgs,

    /// Log at debug level (overridden by DESKREC_LOG)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options for the default record action
#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// Directory receiving output.wav and output.mp4 (created if missing).
    /// Must be valid UTF-8.
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Audio input device index (see `deskrec devices`)
    #[arg(short = 'a', long, value_name = "INDEX")]
    pub audio_device: Option<usize>,

    /// Record audio only, no screen capture
    #[arg(long)]
    pub audio_only: bool,

    /// Stop automatically after this long (e.g., 30s, 5m, 1h30m)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,
}

impl RecordArgs {
    /// The part of the configuration given on the command line
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            output_dir: self.output_dir.clone(),
            audio_device: self.audio_device,
            audio_only: self.audio_only.then_some(true),
            duration: self.duration.clone(),
            ..AppConfig::empty()
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List audio input devices
    Devices,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "output_dir",
    "audio_device",
    "audio_only",
    "duration",
    "ffmpeg",
    "video.display",
    "video.width",
    "video.height",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
