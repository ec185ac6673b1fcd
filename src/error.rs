use thiserror::Error;

use crate::domain::backup::BackupError;
use crate::domain::error::{DecisionError, UnknownVariant, VersionError};
use crate::domain::id::SessionId;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Update check schedule errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid update check schedule {spec:?}: {reason}")]
    Invalid { spec: String, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariant),

    #[error("store error: {0}")]
    Store(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error("no connected session for cluster {0}")]
    NoSession(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// True for policy rejections that retrying cannot fix.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::Decision(
                DecisionError::LabelNotFound { .. }
                    | DecisionError::RollbackNotAllowed { .. }
                    | DecisionError::ConfigurationRequired { .. }
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
