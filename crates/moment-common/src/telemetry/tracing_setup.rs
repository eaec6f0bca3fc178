//! Tracing and logging setup
//!
//! Installs a `tracing` subscriber for the feed core. `RUST_LOG` always wins
//! over the configured default directives.

use std::env;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Where formatted events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogWriter {
    #[default]
    Stdout,
    Stderr,
    /// libtest's captured output, shown only for failing tests
    TestCapture,
}

/// Tracing configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub directives: String,
    /// Emit one JSON object per event
    pub json: bool,
    /// Log span open/close (engine lifecycle calls are instrumented)
    pub span_events: bool,
    /// Include file and line numbers
    pub file_line: bool,
    pub writer: LogWriter,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            directives: "info".to_string(),
            json: false,
            span_events: false,
            file_line: false,
            writer: LogWriter::Stdout,
        }
    }
}

impl TracingConfig {
    /// Verbose feed logging with span timings
    #[must_use]
    pub fn development() -> Self {
        Self {
            directives: "info,moment_feed=debug".to_string(),
            span_events: true,
            file_line: true,
            ..Self::default()
        }
    }

    /// JSON lines for log shipping
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    /// Feed debug output captured per test
    #[must_use]
    pub fn test() -> Self {
        Self {
            directives: "warn,moment_feed=debug".to_string(),
            writer: LogWriter::TestCapture,
            ..Self::default()
        }
    }

    /// Pick a preset from `LOG_FORMAT` (`json` or `pretty`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_format(env::var("LOG_FORMAT").ok().as_deref())
    }

    fn from_format(format: Option<&str>) -> Self {
        match format.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::production(),
            Some("pretty") => Self::development(),
            _ => Self::default(),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directives))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_span_events(span_events);

        match (self.json, self.writer) {
            (true, LogWriter::Stdout) => layer.json().boxed(),
            (true, LogWriter::Stderr) => layer.json().with_writer(std::io::stderr).boxed(),
            (true, LogWriter::TestCapture) => layer.json().with_test_writer().boxed(),
            (false, LogWriter::Stdout) => layer.boxed(),
            (false, LogWriter::Stderr) => layer.with_writer(std::io::stderr).boxed(),
            (false, LogWriter::TestCapture) => layer.with_test_writer().boxed(),
        }
    }
}

/// Initialize tracing with the preset chosen by `LOG_FORMAT`
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_config(&TracingConfig::from_env());
}

/// Initialize tracing with an explicit configuration
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing_with_config(config: &TracingConfig) {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.filter())
        .init();
}

/// Like [`init_tracing`], but reports a second initialization instead of
/// panicking
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(&TracingConfig::from_env())
}

/// Like [`init_tracing_with_config`], but reports a second initialization
/// instead of panicking
pub fn try_init_tracing_with_config(config: &TracingConfig) -> Result<(), TracingError> {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.filter())
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
