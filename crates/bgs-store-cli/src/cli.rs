use std::path::PathBuf;

use bgs_logging::{BgsSubscriberBuilder, LogConfig};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bgs-store", about = "Provision and inspect the BGS event log store")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error); defaults to the preset's level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Human-readable logs instead of JSONL
    #[arg(long, global = true)]
    pub pretty: bool,
}

impl GlobalArgs {
    /// Subscriber for the command; logs go to stderr, stdout carries the output
    pub fn subscriber(&self) -> BgsSubscriberBuilder {
        let preset = if self.pretty {
            LogConfig::development()
        } else {
            LogConfig::default()
        };
        let builder = BgsSubscriberBuilder::new().with_config(preset).with_stderr();
        match &self.log_level {
            Some(level) => builder.with_level(level),
            None => builder,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the collections and indexes if missing
    Provision,
    /// Show size and capacity of every collection
    Stats,
    /// List the indexes of a collection
    Indexes {
        /// Collection name
        collection: String,
    },
    /// Print the newest chat messages of a room
    TailChat {
        #[arg(long)]
        room: String,
        #[arg(long, default_value_t = bgs_storage::DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Print the newest error reports of a user
    TailErrors {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = bgs_storage::DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Print the highest published version of a game
    LatestGame {
        #[arg(long)]
        game: String,
    },
}
