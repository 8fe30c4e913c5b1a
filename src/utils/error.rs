use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Location {id} not found")]
    NotFound { id: i64 },

    #[error("Location ({latitude}, {longitude}) already exists")]
    AlreadyExists { latitude: f64, longitude: f64 },

    #[error("Forecast provider unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Forecast provider returned a malformed response: {message}")]
    UpstreamMalformed { message: String },

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Upstream,
    Persistence,
    Cancelled,
    Configuration,
}

impl ForecastError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ForecastError::NotFound { .. } => ErrorCategory::NotFound,
            ForecastError::AlreadyExists { .. } => ErrorCategory::Conflict,
            ForecastError::UpstreamUnavailable { .. } | ForecastError::UpstreamMalformed { .. } => {
                ErrorCategory::Upstream
            }
            ForecastError::Persistence(_)
            | ForecastError::Migration(_)
            | ForecastError::IoError(_) => ErrorCategory::Persistence,
            ForecastError::Cancelled => ErrorCategory::Cancelled,
            ForecastError::ConfigError { .. }
            | ForecastError::InvalidConfigValueError { .. }
            | ForecastError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    /// Upstream outages and cancellations may succeed when the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForecastError::UpstreamUnavailable { .. } | ForecastError::Cancelled
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ForecastError::NotFound { id } => format!("No location with id {}", id),
            ForecastError::AlreadyExists {
                latitude,
                longitude,
            } => format!("Location ({}, {}) is already registered", latitude, longitude),
            ForecastError::UpstreamUnavailable { .. } => {
                "The weather provider could not be reached".to_string()
            }
            ForecastError::UpstreamMalformed { .. } => {
                "The weather provider sent data that could not be read".to_string()
            }
            ForecastError::Persistence(_) | ForecastError::Migration(_) => {
                "The forecast database could not be accessed".to_string()
            }
            ForecastError::Cancelled => "The operation was cancelled".to_string(),
            ForecastError::IoError(e) => format!("File access failed: {}", e),
            ForecastError::ConfigError { message } => format!("Invalid configuration: {}", message),
            ForecastError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            ForecastError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::NotFound => "List the registered locations and use one of their ids",
            ErrorCategory::Conflict => "Use the existing location instead of adding it again",
            ErrorCategory::Upstream => "Check network access to the provider endpoint and retry later",
            ErrorCategory::Persistence => "Check that the database URL points to a writable SQLite file",
            ErrorCategory::Cancelled => "Retry the operation",
            ErrorCategory::Configuration => "Fix the configuration file, environment or command-line flags",
        }
    }

    /// Process exit code used by the command-line binary.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::NotFound | ErrorCategory::Conflict => 1,
            ErrorCategory::Upstream | ErrorCategory::Cancelled => 2,
            ErrorCategory::Persistence => 3,
            ErrorCategory::Configuration => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
