use thiserror::Error;

// Errors raised while fetching one flight source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    // The source endpoint itself is malformed; a deployment problem, never retried
    #[error("Configuration error: invalid flight source endpoint {endpoint:?}: {reason}")]
    ConfigurationError { endpoint: String, reason: String },

    #[error("Source unavailable: {endpoint}: {message}")]
    SourceUnavailable { endpoint: String, message: String },

    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("API error from {endpoint}: {status_code}")]
    ApiResponseError { endpoint: String, status_code: u16 },

    #[error("Invalid payload from {endpoint}: {message}")]
    InvalidPayload { endpoint: String, message: String },
}

impl SourceError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, SourceError::ConfigurationError { .. })
    }

    pub fn endpoint(&self) -> &str {
        match self {
            SourceError::ConfigurationError { endpoint, .. }
            | SourceError::SourceUnavailable { endpoint, .. }
            | SourceError::Timeout { endpoint, .. }
            | SourceError::ApiResponseError { endpoint, .. }
            | SourceError::InvalidPayload { endpoint, .. } => endpoint,
        }
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid cron pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Job {0:?} is already scheduled")]
    JobExists(String),

    #[error("Cron pattern {0:?} never fires")]
    NeverFires(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("No flight sources configured")]
    NoSources,

    #[error("Invalid config value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
