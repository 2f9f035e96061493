use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::Error;

/// API error that converts to a proper HTTP response.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Validation(m) | Error::BadRequest(m) => ApiError::bad_request(m),
            // Uniqueness conflicts surface as 400 with the specific reason
            // ("Subdomain already taken", "Domain already in use").
            Error::Conflict(m) => ApiError::bad_request(m),
            Error::NotFound => ApiError::not_found("Not found"),
            // Containment failures look like a missing file to the caller;
            // the attempt was already logged server-side with full detail.
            Error::Traversal => ApiError::not_found("File not found"),
            // Generic message only, internal counters stay internal.
            Error::QuotaExceeded(_) => ApiError::forbidden("Plan limit exceeded"),
            Error::Unauthorized
            | Error::InvalidTokenFormat
            | Error::TokenExpired => ApiError::unauthorized("Authentication required"),
            Error::Forbidden => ApiError::forbidden("Forbidden"),
            e @ (Error::Database(_) | Error::Io(_) | Error::Config(_)) => {
                tracing::error!("internal error: {e}");
                ApiError::internal("Something went wrong!")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Helper to paginate a slice and determine if there are more results
pub fn paginate<T, F>(items: Vec<T>, limit: usize, get_cursor: F) -> (Vec<T>, Option<String>, bool)
where
    F: Fn(&T) -> String,
{
    let has_more = items.len() > limit;
    let items: Vec<T> = items.into_iter().take(limit).collect();
    let next_cursor = if has_more {
        items.last().map(&get_cursor)
    } else {
        None
    };
    (items, next_cursor, has_more)
}

pub const DEFAULT_PAGE_SIZE: i32 = 50;
