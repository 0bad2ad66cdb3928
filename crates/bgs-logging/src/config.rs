//! Configuration types for the logging system

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level (can be overridden by RUST_LOG)
    pub default_level: String,

    /// Console output configuration
    pub console: ConsoleConfig,

    /// File output configuration
    pub file: Option<FileConfig>,

    /// JSONL output configuration
    pub jsonl: JsonlConfig,

    /// Per-target level overrides, e.g. `redb = "warn"`
    pub targets: HashMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
            targets: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// Verbose, human-readable console output
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
                stderr: false,
            },
            ..Default::default()
        }
    }

    /// JSONL files only, rotated daily
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                enabled: false,
                pretty: false,
                ansi: false,
                stderr: false,
            },
            file: Some(FileConfig {
                directory: log_dir,
                max_files: Some(30),
                ..FileConfig::default()
            }),
            ..Default::default()
        }
    }

    /// Warnings and errors only
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Filter directives: the default level followed by the target overrides
    pub fn filter_directives(&self) -> String {
        let mut targets: Vec<_> = self.targets.iter().collect();
        targets.sort();

        let mut directives = vec![self.default_level.clone()];
        directives.extend(targets.into_iter().map(|(target, level)| format!("{target}={level}")));
        directives.join(",")
    }
}

/// Console output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Enable console output
    pub enabled: bool,
    /// Use pretty (human-readable) format
    pub pretty: bool,
    /// Include ANSI colors
    pub ansi: bool,
    /// Write to stderr instead of stdout
    #[serde(default)]
    pub stderr: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false, // JSONL by default
            ansi: false,
            stderr: false,
        }
    }
}

/// File output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Directory for log files
    pub directory: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// Rotation strategy
    pub rotation: RotationStrategy,
    /// Maximum files to retain
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "bgs".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

/// JSONL formatting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Flatten event fields to root level
    pub flatten_events: bool,
    /// Include span list in events
    pub include_spans: bool,
    /// Include file/line information
    pub include_location: bool,
    /// Include thread information
    pub include_thread_info: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: true,
            include_thread_info: false,
        }
    }
}
