use thiserror::Error;

/// Message shown when a failure carries nothing more specific.
pub const FALLBACK_MESSAGE: &str = "Failed to fetch weather data";

/// Rejection of a user-entered city before anything is dispatched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("City name must be at least {min} characters")]
    TooShort { min: usize },

    #[error("City name must not exceed {max} characters")]
    TooLong { max: usize },
}

/// Errors produced by the dashboard core.
///
/// `Clone` because a single in-flight fetch may be awaited by several callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network or HTTP failure from a fetch function.
    #[error("{}", .0.message())]
    Transport(TransportError),

    /// Missing credential or other unusable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed persisted content.
    #[error("Malformed stored record: {0}")]
    Parse(String),
}

impl WeatherError {
    pub fn transport(status: Option<u16>, upstream: Option<String>, detail: Option<String>) -> Self {
        WeatherError::Transport(TransportError { status, upstream, detail })
    }

    /// A fetch that panicked or was cancelled before producing a result.
    pub fn aborted() -> Self {
        Self::transport(None, None, Some("Request aborted unexpectedly".to_string()))
    }

    /// Text for the dismissible error notification.
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::Transport(err) => err.message().to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            WeatherError::Transport(err) => err.status,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    /// `error` field of the response body, if the endpoint sent one.
    pub upstream: Option<String>,
    /// Locally produced description (connection refused, bad JSON, ...).
    pub detail: Option<String>,
}

impl TransportError {
    /// Upstream message, then local detail, then the fixed fallback.
    pub fn message(&self) -> &str {
        self.upstream
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.detail.as_deref().filter(|m| !m.is_empty()))
            .unwrap_or(FALLBACK_MESSAGE)
    }
}
