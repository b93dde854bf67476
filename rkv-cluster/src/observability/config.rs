//! Logging configuration.

use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON lines for log shippers.
    Json,
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// How a process should log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    format: LogFormat,
    /// Filter directives (e.g. "info", "rkv_cluster=debug,openraft=warn").
    filter: String,
    include_location: bool,
    include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
            include_location: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Create a new builder.
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Read `RKV_LOG_FORMAT`, `RKV_LOG_LEVEL`/`RUST_LOG` and
    /// `RKV_LOG_LOCATION`.
    ///
    /// Without an explicit format, a terminal gets `pretty` and anything
    /// else gets `json`.
    pub fn from_env() -> Self {
        let format = env::var("RKV_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_else(|| {
                if stdout_is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Json
                }
            });

        let filter = env::var("RKV_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            format,
            filter,
            include_location: env::var("RKV_LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            include_target: true,
        }
    }

    /// Get the log format.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Get the filter directives.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Whether file and line are logged.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Whether the event target is logged.
    pub fn include_target(&self) -> bool {
        self.include_target
    }
}

/// Builder for LogConfig.
#[derive(Debug, Clone, Default)]
pub struct LogConfigBuilder {
    format: Option<LogFormat>,
    filter: Option<String>,
    include_location: Option<bool>,
    include_target: Option<bool>,
}

impl LogConfigBuilder {
    /// Start from an existing configuration, e.g. one read from the environment.
    pub fn from_config(config: LogConfig) -> Self {
        Self {
            format: Some(config.format),
            filter: Some(config.filter),
            include_location: Some(config.include_location),
            include_target: Some(config.include_target),
        }
    }

    /// Set the log format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the filter directives.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Include file and line in logs.
    pub fn include_location(mut self, include: bool) -> Self {
        self.include_location = Some(include);
        self
    }

    /// Include the event target in logs.
    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = Some(include);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LogConfig {
        let defaults = LogConfig::default();
        LogConfig {
            format: self.format.unwrap_or(defaults.format),
            filter: self.filter.unwrap_or(defaults.filter),
            include_location: self.include_location.unwrap_or(defaults.include_location),
            include_target: self.include_target.unwrap_or(defaults.include_target),
        }
    }
}

/// Filter directives for a `-v` count, or `None` to keep the configured filter.
///
/// Consensus internals stay one step quieter than our own crates.
pub fn verbosity_filter(verbose: u8) -> Option<String> {
    match verbose {
        0 => None,
        1 => Some("rkv_cluster=debug,rkv=debug,openraft=info,info".to_string()),
        2 => Some("rkv_cluster=trace,rkv=trace,openraft=debug,debug".to_string()),
        _ => Some("trace".to_string()),
    }
}

fn stdout_is_terminal() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}
