//! Logging infrastructure - structured tracing across the marshaling layer
//!
//! Call sites use `tracing` macros with the targets `marshal`, `binding` and
//! `registry`. The host installs a subscriber once through [`init_logging`].

use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact format for production
    Compact,
    /// JSON format for structured logging
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to include span events
    pub span_events: bool,
    /// Custom filter directives (e.g., "marshal=trace,binding=debug")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // GIR_BRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = std::env::var("GIR_BRIDGE_LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
        {
            config.level = level;
        }

        // GIR_BRIDGE_LOG_FORMAT: pretty, compact, json
        if let Some(format) = std::env::var("GIR_BRIDGE_LOG_FORMAT")
            .ok()
            .and_then(|s| LogFormat::parse(&s))
        {
            config.format = format;
        }

        // GIR_BRIDGE_LOG_DIR: rotate daily into this directory
        if let Ok(directory) = std::env::var("GIR_BRIDGE_LOG_DIR") {
            config.output = LogOutput::File {
                directory,
                prefix: "gir-bridge.log".to_string(),
            };
        }

        config.span_events = std::env::var("GIR_BRIDGE_LOG_SPANS").is_ok();
        config.filter = std::env::var("GIR_BRIDGE_LOG_FILTER").ok();

        config
    }

    /// Create config from the `[logging]` section of the engine config
    pub fn from_config(section: &LoggingConfig) -> Self {
        Self {
            level: parse_level(&section.level).unwrap_or(Level::INFO),
            format: LogFormat::parse(&section.format).unwrap_or(LogFormat::Pretty),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize the global logging system
///
/// Returns a `WorkerGuard` that must be kept alive for the duration of the
/// program to ensure all logs are flushed. Only the first call installs a
/// subscriber; later calls return `None`.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;
    LOGGER_INITIALIZED.get_or_init(|| {
        guard = install(config);
    });
    guard
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn install(config: LogConfig) -> Option<WorkerGuard> {
    let filter = build_filter(&config);
    let spans = span_events_config(config.span_events);

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let result = match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .pretty()
                .with_span_events(spans)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .with_writer(writer)
                .compact()
                .with_span_events(spans)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .json()
                .with_span_events(spans)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()
        }
    };

    // Another subscriber is already installed by the host
    result.ok().map(|_| guard)
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str.split(',').fold(base_filter, |filter, directive| {
            filter.add_directive(directive.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid filter directive: {}", directive);
                config.level.into()
            }))
        }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Initialize logging with defaults for development
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::DEBUG,
        format: LogFormat::Pretty,
        output: LogOutput::Stderr,
        span_events: true,
        filter: Some("marshal=trace,binding=debug".to_string()),
    })
}

/// Initialize logging with defaults for production
pub fn init_prod_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::INFO,
        format: LogFormat::Json,
        output: LogOutput::File {
            directory: log_dir.as_ref().to_string_lossy().into_owned(),
            prefix: "gir-bridge.log".to_string(),
        },
        span_events: false,
        filter: None,
    })
}

/// Log a native call about to be dispatched
pub fn log_native_call(callable: &str, in_count: usize, out_count: usize) {
    tracing::debug!(
        target: "binding",
        event = "native_call",
        callable = callable,
        in_args = in_count,
        out_args = out_count,
        "Dispatching native call"
    );
}

/// Log a failure reported by the native side
pub fn log_native_error(callable: &str, error: &str) {
    tracing::warn!(
        target: "binding",
        event = "native_error",
        callable = callable,
        error = error,
        "Native call failed"
    );
}

/// Log frame teardown
#[inline]
pub fn log_frame_release(entries: usize, allocations: usize) {
    tracing::trace!(
        target: "binding",
        event = "frame_release",
        entries = entries,
        allocations = allocations,
        "Call frame released"
    );
}
