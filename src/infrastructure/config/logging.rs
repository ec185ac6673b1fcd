//! `[logging]` section and tracing subscriber setup.
//!
//! `RUST_LOG` wins over `level` when it is set and parses.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    Pretty,
    /// One JSON object per line, for collectors.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?}, expected \"pretty\" or \"json\"")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// The `[logging]` section as written in the config file.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `harbormaster=debug,tower=warn`.
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Parsed output format.
    pub fn log_format(&self) -> Result<LogFormat, String> {
        self.format.parse()
    }

    /// Filter from `RUST_LOG`, falling back to the configured level.
    pub fn filter(&self) -> Result<EnvFilter, String> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| format!("invalid level {:?}: {e}", self.level))
    }

    /// Install the global subscriber.
    ///
    /// Returns `false` when a subscriber was already installed, which keeps
    /// repeated calls in one process harmless.
    pub fn init(&self) -> bool {
        let filter = self.filter().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);

        let installed = match self.log_format().unwrap_or(LogFormat::Pretty) {
            LogFormat::Json => builder.json().with_current_span(false).try_init(),
            LogFormat::Pretty => builder.try_init(),
        };
        installed.is_ok()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.into(),
            format: format.into(),
        }
    }

    #[test]
    fn formats_parse() {
        assert_eq!(logging("info", "json").log_format(), Ok(LogFormat::Json));
        assert_eq!(logging("info", "pretty").log_format(), Ok(LogFormat::Pretty));
        assert!(logging("info", "xml").log_format().unwrap_err().contains("xml"));
    }

    #[test]
    fn directives_are_accepted_as_level() {
        assert!(logging("harbormaster=debug,warn", "pretty").filter().is_ok());
    }

    #[test]
    fn second_init_is_a_noop() {
        let config = LoggingConfig::default();
        config.init();
        assert!(!config.init());
    }
}
