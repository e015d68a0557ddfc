//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber with one layer per sink
//! - Hand out `Logger` handles whose level can be changed at runtime
//!
//! # Design Decisions
//! - Each sink filters through its logger's level cell, so a level change
//!   mutates the logger in place instead of rebuilding the subscriber
//! - Named loggers share their parent's level cell
//! - JSON format for machine parsing, standard format for humans

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::error::ConfigurationError;

/// Recognized log levels, from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Whether an event at `level` passes this threshold.
    pub fn enables(self, level: &tracing::Level) -> bool {
        rank(level) >= self as u8
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

fn rank(level: &tracing::Level) -> u8 {
    match *level {
        tracing::Level::TRACE => 0,
        tracing::Level::DEBUG => 1,
        tracing::Level::INFO => 2,
        tracing::Level::WARN => 3,
        _ => 4,
    }
}

impl FromStr for LogLevel {
    type Err = ConfigurationError;

    /// Case-insensitive, surrounding whitespace ignored. Empty maps to info.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "notice" | "info" | "" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "err" | "error" => Ok(LogLevel::Error),
            _ => Err(ConfigurationError::UnknownLogLevel(s.to_string())),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Output format for log sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Standard,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "" => Ok(LogFormat::Standard),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigurationError::UnknownLogFormat(s.to_string())),
        }
    }
}

/// A named handle over a shared level cell.
///
/// Clones and named children observe the same level.
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
    level: Arc<AtomicU8>,
    span: tracing::Span,
}

impl Logger {
    pub fn new(name: &str, level: LogLevel) -> Self {
        Self {
            name: Arc::from(name),
            level: Arc::new(AtomicU8::new(level as u8)),
            span: tracing::info_span!("logger", logger = %name),
        }
    }

    /// Derive a child logger. The parent keeps its own name.
    pub fn named(&self, name: &str) -> Self {
        let full = format!("{}.{}", self.name, name);
        let span = tracing::info_span!("logger", logger = %full);
        Self {
            name: Arc::from(full.as_str()),
            level: Arc::clone(&self.level),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
        // Sink filters answer callsite interest from the level; drop the cached answers.
        tracing::callsite::rebuild_interest_cache();
    }

    pub fn enabled(&self, level: &tracing::Level) -> bool {
        self.level().enables(level)
    }

    /// Span carrying this logger's name, for scoping events.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Loggers for every installed sink, plus guards that flush file output on drop.
pub struct LoggingHandles {
    pub loggers: Vec<Logger>,
    _guards: Vec<WorkerGuard>,
}

/// Where the console sink writes.
fn console_writer(combine_logs: bool) -> fmt::writer::BoxMakeWriter {
    if combine_logs {
        fmt::writer::BoxMakeWriter::new(std::io::stdout)
    } else {
        fmt::writer::BoxMakeWriter::new(std::io::stderr)
    }
}

fn sink_layer(
    logger: &Logger,
    format: LogFormat,
    writer: fmt::writer::BoxMakeWriter,
    ansi: bool,
) -> Box<dyn Layer<Registry> + Send + Sync> {
    let filter_logger = logger.clone();
    let filter = filter_fn(move |meta| filter_logger.enabled(meta.level()));
    match format {
        LogFormat::Standard => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// If a global subscriber already exists (tests running several supervisors in
/// one process) the handles are still returned so level propagation keeps working.
pub fn init_logging(
    level: LogLevel,
    format: LogFormat,
    combine_logs: bool,
    log_file: Option<&str>,
) -> std::io::Result<LoggingHandles> {
    let mut loggers = Vec::new();
    let mut guards = Vec::new();
    let mut layers = Vec::new();

    let console = Logger::new("console", level);
    layers.push(sink_layer(&console, format, console_writer(combine_logs), true));
    loggers.push(console);

    if let Some(path) = log_file {
        let path = Path::new(path);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("log file path has no file name: {:?}", path),
            )
        })?;
        std::fs::create_dir_all(directory)?;

        let appender = tracing_appender::rolling::daily(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file = Logger::new("file", level);
        layers.push(sink_layer(
            &file,
            format,
            fmt::writer::BoxMakeWriter::new(writer),
            false,
        ));
        loggers.push(file);
        guards.push(guard);
    }

    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        tracing::debug!("Global subscriber already installed, reusing it");
    }

    Ok(LoggingHandles {
        loggers,
        _guards: guards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_vocabulary() {
        assert_eq!(" TRACE ".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("notice".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("err".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn level_threshold() {
        assert!(LogLevel::Info.enables(&tracing::Level::ERROR));
        assert!(LogLevel::Info.enables(&tracing::Level::INFO));
        assert!(!LogLevel::Info.enables(&tracing::Level::DEBUG));
        assert!(LogLevel::Trace.enables(&tracing::Level::TRACE));
    }

    #[test]
    fn named_logger_shares_level() {
        let root = Logger::new("controller", LogLevel::Info);
        let child = root.named("listeners");
        assert_eq!(child.name(), "controller.listeners");
        assert_eq!(root.name(), "controller");

        child.set_level(LogLevel::Debug);
        assert_eq!(root.level(), LogLevel::Debug);
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("standard".parse::<LogFormat>().unwrap(), LogFormat::Standard);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
