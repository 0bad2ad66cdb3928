//! Structured JSONL logging for the BGS services
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines on the console (default)
//! - **Pretty Output**: human-readable console output for development
//! - **File Rotation**: daily/hourly JSONL files via tracing-appender
//! - **Service Context**: tag logs with the service name and instance id
//!
//! # Quick Start
//!
//! ```ignore
//! use bgs_logging::{BgsSubscriberBuilder, LogConfig, ServiceContextGuard};
//!
//! // JSONL to console, level from RUST_LOG or "info"
//! let _log_guard = BgsSubscriberBuilder::new().init()?;
//!
//! // Pretty output during development
//! let _log_guard = BgsSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//!
//! let _service = ServiceContextGuard::new("bgs-store");
//! tracing::info!("Provisioning collections");
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{ServiceContext, ServiceContextGuard};
pub use layers::{ServiceContextExtension, ServiceContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("Failed to create log file: {0}")]
    File(#[from] std::io::Error),

    #[error("Failed to create rolling appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps background log writers alive; drop it to flush on shutdown
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _writers: Vec<WorkerGuard>,
}

/// Builder for configuring and initializing the BGS logging subscriber
///
/// Console output is JSONL by default. Use [`LogConfig::development`] for
/// human-readable output.
pub struct BgsSubscriberBuilder {
    config: LogConfig,
}

impl BgsSubscriberBuilder {
    /// Create a builder with the default configuration (JSONL to console)
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Send console output to stderr, keeping stdout for program output
    pub fn with_stderr(mut self) -> Self {
        self.config.console.stderr = true;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// `RUST_LOG` takes precedence over the configured levels.
    pub fn init(self) -> Result<LoggingGuard, LogInitError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())?,
        };

        let mut layers: Vec<BoxedLayer> = vec![ServiceContextLayer::new().boxed()];
        let mut writers = Vec::new();

        if self.config.console.enabled {
            layers.push(self.console_layer());
        }

        if let Some(file_config) = &self.config.file {
            let (writer, guard) = file_writer(file_config)?;
            writers.push(guard);
            layers.push(self.jsonl_layer(writer));
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()?;

        Ok(LoggingGuard { _writers: writers })
    }

    fn console_layer(&self) -> BoxedLayer {
        let console = &self.config.console;
        match (console.pretty, console.stderr) {
            (true, false) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .boxed(),
            (true, true) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed(),
            (false, false) => self.jsonl_layer(std::io::stdout),
            (false, true) => self.jsonl_layer(std::io::stderr),
        }
    }

    fn jsonl_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
    {
        let jsonl = &self.config.jsonl;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_thread_ids(jsonl.include_thread_info)
            .with_thread_names(jsonl.include_thread_info)
            .with_writer(writer)
            .boxed()
    }
}

impl Default for BgsSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the file sink; `Never` truncates a single file, the others roll
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogInitError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Result<LoggingGuard, LogInitError> {
    BgsSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<LoggingGuard, LogInitError> {
    BgsSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for tests; repeated calls are ignored
pub fn init_testing() {
    let _ = BgsSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
