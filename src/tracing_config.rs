//! Tracing configuration for structured logging
//!
//! The library only emits spans and events; binaries install the subscriber
//! through [`TracingConfig::init`].

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default)
    #[default]
    Console,
    /// Compact output without colors for CI and log files
    Compact,
    /// JSON structured logging for log shippers
    #[cfg(feature = "tracing-json")]
    Json,
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "pretty" => Ok(Self::Console),
            "compact" => Ok(Self::Compact),
            #[cfg(feature = "tracing-json")]
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported log format '{other}'")),
        }
    }
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level (0 = info, 1 = debug, 2+ = trace)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directives; overrides verbosity and `RUST_LOG`
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directives for the configured verbosity
    ///
    /// Our own crate and the HTTP middleware follow the verbosity; model
    /// runtimes stay at `warn` unless raised explicitly.
    #[must_use]
    pub fn verbosity_to_filter(&self) -> String {
        let level = match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        format!("warn,stickerize={level},tower_http={level}")
    }

    /// Resolve the filter: explicit directives, then `RUST_LOG`, then verbosity
    #[must_use]
    pub fn filter_directives(&self) -> String {
        if let Some(filter) = &self.env_filter {
            return filter.clone();
        }
        match std::env::var("RUST_LOG") {
            Ok(filter) if !filter.trim().is_empty() && self.verbosity == 0 => filter,
            _ => self.verbosity_to_filter(),
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directives
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.filter_directives())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        Ok(())
    }
}

/// Span helpers for the CLI
pub mod spans {
    use tracing::{Level, Span};

    /// Span for a whole batch conversion
    pub fn batch_conversion(file_count: usize, output_dir: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "batch_conversion",
            file_count = %file_count,
            output_dir = %output_dir.display()
        )
    }

    /// Span for one converted file
    pub fn file_conversion(file_path: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "file_conversion",
            file_path = %file_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(
            TracingConfig::new().verbosity_to_filter(),
            "warn,stickerize=info,tower_http=info"
        );
        assert!(TracingConfig::new()
            .with_verbosity(1)
            .verbosity_to_filter()
            .contains("stickerize=debug"));
        assert!(TracingConfig::new()
            .with_verbosity(7)
            .verbosity_to_filter()
            .contains("stickerize=trace"));
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_env_filter("stickerize::jobs=debug");
        assert_eq!(config.filter_directives(), "stickerize::jobs=debug");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("compact".parse::<TracingFormat>().unwrap(), TracingFormat::Compact);
        assert_eq!("Console".parse::<TracingFormat>().unwrap(), TracingFormat::Console);
        assert!("xml".parse::<TracingFormat>().is_err());
    }
}
