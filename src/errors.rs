//! Error type for the filter/sort/pagination pipeline.
//!
//! Allow-list violations and malformed pagination parameters are client
//! errors: they carry a descriptive message (offending field, supplied
//! comparison/value, the full set of allowed definitions) and map to
//! 400 Bad Request. Database errors stay internal: they are logged via
//! `tracing` and surface as a sanitized 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// Errors raised while validating or applying request parameters.
#[derive(Debug)]
pub enum ApiError {
    /// A filter field request is outside its allow-list: unknown name,
    /// disallowed comparison, or a value outside the enum constraint.
    Filter {
        /// User-facing diagnostic, includes the full allowed set.
        message: String,
    },

    /// A sort field request uses an unknown name or a disallowed direction.
    Sort {
        /// User-facing diagnostic, includes the full allowed set.
        message: String,
    },

    /// The `limit` parameter is malformed or not available on this endpoint.
    Pagination {
        /// User-facing diagnostic.
        message: String,
    },

    /// Query execution failed. Details are logged, not exposed.
    Database {
        /// User-facing generic message.
        message: String,
        /// Internal error (logged, not sent to the client).
        internal: DbErr,
    },
}

impl ApiError {
    pub fn filter(message: impl Into<String>) -> Self {
        Self::Filter {
            message: message.into(),
        }
    }

    pub fn sort(message: impl Into<String>) -> Self {
        Self::Sort {
            message: message.into(),
        }
    }

    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination {
            message: message.into(),
        }
    }

    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Filter { .. } | Self::Sort { .. } | Self::Pagination { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Filter { message }
            | Self::Sort { message }
            | Self::Pagination { message }
            | Self::Database { message, .. } => message.clone(),
        }
    }

    /// Log internal details. Client errors are only logged at debug level;
    /// they are expected traffic, not incidents.
    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "database error while applying request fields");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "rejected request parameters"
                );
            }
        }
    }
}

/// Error body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self::database(err)
    }
}
