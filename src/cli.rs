use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the media root and reconcile the subtitle index
    Scan,

    /// Translate the next batch of wanted entries
    Translate {
        /// Maximum number of entries to process (defaults to library.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Manage series/season auto-watch rules
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },

    /// Show series and seasons with file counts and watch status
    Series,

    /// Inspect and flag individual subtitle entries
    Entries {
        #[command(subcommand)]
        action: EntryAction,
    },

    /// Mark every entry of a series (or season) as wanted or unwanted
    Want {
        /// Series name
        series: String,

        /// Limit to one season
        #[arg(short, long)]
        season: Option<String>,

        /// Clear the wanted flag instead of setting it
        #[arg(long)]
        unset: bool,
    },

    /// Show library statistics
    Stats,

    /// Show or change application settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show API usage against the configured quotas
    Usage {
        /// Number of days of history to list
        #[arg(short, long, default_value = "1")]
        days: i64,

        /// Limit the history to one model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the subtitle streams of a video and the one that would be translated
    Streams {
        /// Video file
        file: PathBuf,
    },

    /// Send a test prompt to the configured Gemini model
    TestApi,

    /// Run scheduled scans and translations until interrupted
    Daemon,

    /// Write the current configuration to a TOML file
    InitConfig {
        /// Output path
        #[arg(default_value = "config.toml")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum WatchAction {
    /// List auto-watch rules
    List,

    /// Watch a series, or one season of it
    Add {
        series: String,

        #[arg(short, long)]
        season: Option<String>,
    },

    /// Stop watching a series or season; entries keep their wanted flag
    Remove {
        series: String,

        #[arg(short, long)]
        season: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum EntryAction {
    /// List entries
    List {
        /// Only entries that the next batch would pick up
        #[arg(long)]
        pending: bool,

        /// Only entries of this series
        #[arg(short, long)]
        series: Option<String>,
    },

    /// Set or clear the wanted flag of one entry
    Want {
        id: i64,

        #[arg(long)]
        unset: bool,
    },

    /// Queue one entry for translation regardless of its other flags
    Force {
        id: i64,

        #[arg(long)]
        unset: bool,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// List every setting
    List,

    /// Print one setting value
    Get { key: String },

    /// Change one setting value
    Set { key: String, value: String },
}
