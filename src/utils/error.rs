use std::time::Duration;
use thiserror::Error;

/// Analyzer error with rich context and automatic error trait implementations
///
/// Design: Uses thiserror for ergonomic error handling with context.
/// Each variant carries meaningful context to help with debugging.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    // Profile resolution errors 1xxx
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Circular dependency between profiles: {0:?}")]
    CircularDependency(Vec<String>),

    #[error("Empty profile request")]
    EmptyProfileRequest,

    // Configuration errors 2xxx
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Network errors 3xxx
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Malformed protocol response: {0}")]
    Malformed(String),

    #[error("Per-domain budget exceeded")]
    BudgetExceeded,

    // System errors 5xxx
    #[error("Internal error: {0}")]
    InternalError(String),

    // Database errors - auto-convert from sqlx::Error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic wrapper for other errors - auto-convert from anyhow::Error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnalyzerError {
    /// Helper to create unknown profile error
    pub fn unknown_profile(name: impl Into<String>) -> Self {
        Self::UnknownProfile(name.into())
    }

    /// Helper to create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Helper to create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Helper to create transient network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::TransientNetwork(message.into())
    }

    /// Helper to create malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Helper to create internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// Stable kind tag recorded in check results and run logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownProfile(_) => "unknown_profile",
            Self::CircularDependency(_) => "circular_dependency",
            Self::EmptyProfileRequest => "empty_request",
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::TransientNetwork(_) => "transient_network",
            Self::RateLimited { .. } => "rate_limited",
            Self::Malformed(_) => "malformed",
            Self::BudgetExceeded => "budget_exceeded",
            Self::InternalError(_) => "internal",
            Self::Database(_) => "store",
            Self::Json(_) => "json",
            Self::Io(_) => "io",
            Self::Other(_) => "internal",
        }
    }

    /// True for the errors that abort the whole run instead of a single check
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownProfile(_)
                | Self::CircularDependency(_)
                | Self::EmptyProfileRequest
                | Self::Config(_)
        )
    }
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
