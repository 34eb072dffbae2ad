//! Error types for the iTaxCix client core

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Message shown when the backend cannot be reached or times out
pub const NETWORK_ERROR_MESSAGE: &str =
    "Error de conexión. Verifica tu conexión a internet e inténtalo nuevamente.";

/// Message shown when an error response carries no readable message
pub const GENERIC_ERROR_MESSAGE: &str = "Ocurrió un error inesperado. Inténtalo nuevamente.";

/// Message shown when the stored token is rejected by the backend
pub const SESSION_EXPIRED_MESSAGE: &str = "Tu sesión ha expirado. Inicia sesión nuevamente.";

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Timeouts and connection failures. Never retried automatically.
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP request error: {0}")]
    Http(reqwest::Error),

    /// Non-2xx response from the REST API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    /// Real-time frame that could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] crate::realtime::DecodeError),

    #[error("Real-time channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            AppError::Network(e.to_string())
        } else {
            AppError::Http(e)
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Channel(e.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl AppError {
    /// Display string placed into a view model's error state.
    ///
    /// Only API messages and validation messages are passed through; every
    /// other failure collapses to a fixed Spanish string.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            AppError::Api { message, .. } => message.clone(),
            AppError::Validation(errors) => errors.to_string(),
            AppError::SessionExpired | AppError::NotAuthenticated => {
                SESSION_EXPIRED_MESSAGE.to_string()
            }
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

// Serialized as a plain string for a UI shell
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
