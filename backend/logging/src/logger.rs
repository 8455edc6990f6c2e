//! Structured Logger
//!
//! Wraps `tracing-subscriber`: an `EnvFilter` (`RUST_LOG` wins over the
//! configured level), a console layer, and an optional daily-rolling NDJSON file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "intentforge.log";

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub level: String,
    /// Directory for `intentforge.log.YYYY-MM-DD`. Console only when `None`.
    pub dir: Option<PathBuf>,
    /// JSON lines on the console instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// Keeps the file writer flushing; hold it for the life of the process.
pub struct LoggerGuard {
    _file: Option<WorkerGuard>,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber. A second call is a no-op.
pub fn init_logger(options: &LoggingOptions) -> Result<LoggerGuard> {
    let console_layer = if options.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let (file_layer, file_guard) = match &options.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(&options.level))
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(LoggerGuard { _file: file_guard })
}
