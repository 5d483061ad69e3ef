//! Error types shared by every crate in the workspace.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::response::ApiResponse;

/// Main error type for connection and data-access operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required configuration keys are absent. Holds exactly the missing keys.
    #[error("Missing required keys in the configuration: {0:?}")]
    MissingConfigurationKey(Vec<String>),

    /// No constructor is registered for the connection type tag.
    #[error("Connection type {0} is unknown")]
    UnknownConnectionType(String),

    /// A configuration value is present but unusable (wrong type, bad file).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Value-level validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation requires a live client but the connection is closed.
    #[error("Connection {0} is not connected")]
    NotConnected(String),

    /// No connection with the given name is registered.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Table is absent from the reflected schema.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Column is absent from the reflected table.
    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    /// By-id operation on a table without a primary key.
    #[error("Table {0} has no primary key")]
    NoPrimaryKey(String),

    /// Raw SQL fragment rejected by the validator.
    #[error("Unsafe SQL: {0}")]
    UnsafeSql(String),

    /// Operation not offered by this connection kind.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Relational driver error.
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    /// Key-value driver error.
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// Document driver error.
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    /// IO error (configuration files, certificates).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias used throughout the workspace.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Builds a [`AppError::MissingConfigurationKey`] from any list of key names.
    pub fn missing_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AppError::MissingConfigurationKey(keys.into_iter().map(Into::into).collect())
    }

    /// Stable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingConfigurationKey(_) => "MISSING_CONFIGURATION_KEY",
            AppError::UnknownConnectionType(_) => "UNKNOWN_CONNECTION_TYPE",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotConnected(_) => "NOT_CONNECTED",
            AppError::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            AppError::UnknownTable(_) => "UNKNOWN_TABLE",
            AppError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            AppError::NoPrimaryKey(_) => "NO_PRIMARY_KEY",
            AppError::UnsafeSql(_) => "UNSAFE_SQL",
            AppError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            AppError::Sql(_) => "DATABASE_ERROR",
            AppError::Redis(_) => "REDIS_ERROR",
            AppError::Mongo(_) => "MONGODB_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Yaml(_) | AppError::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConnectionNotFound(_) | AppError::UnknownTable(_) => StatusCode::NOT_FOUND,
            AppError::MissingConfigurationKey(_)
            | AppError::UnknownConnectionType(_)
            | AppError::InvalidConfiguration(_)
            | AppError::Validation(_)
            | AppError::UnknownColumn { .. }
            | AppError::NoPrimaryKey(_)
            | AppError::UnsafeSql(_)
            | AppError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            AppError::NotConnected(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Sql(_) | AppError::Redis(_) | AppError::Mongo(_) => StatusCode::BAD_GATEWAY,
            AppError::Io(_) | AppError::Yaml(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
