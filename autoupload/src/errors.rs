use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    /// A screen marker never appeared within its budget.
    #[error("Recognition timed out: {0}")]
    RecognitionTimeout(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<AutomationError>,
    },

    #[error("Required media missing for '{code}' (checked {path})")]
    MissingMedia { code: String, path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Spreadsheet error: {0}")]
    Sheets(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Update error: {0}")]
    Update(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AutomationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AutomationError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for quota / HTTP 429 failures, however deeply they were wrapped.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            AutomationError::RateLimited(_) => true,
            AutomationError::RetryExhausted { last, .. } => last.is_rate_limited(),
            AutomationError::Sheets(msg) | AutomationError::PlatformError(msg) => {
                msg.contains("429") || msg.contains("Quota")
            }
            _ => false,
        }
    }

    pub fn is_recognition_timeout(&self) -> bool {
        matches!(self, AutomationError::RecognitionTimeout(_))
    }
}

impl From<reqwest::Error> for AutomationError {
    fn from(e: reqwest::Error) -> Self {
        if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            AutomationError::RateLimited(e.to_string())
        } else {
            AutomationError::Sheets(e.to_string())
        }
    }
}
