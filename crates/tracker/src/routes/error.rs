use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value, json};
use tracing::error;

use crate::{
    db::{operations::OperationError, sessions::SessionError, users::UserError},
    domain::{Batch, batches},
    services::{
        AuthServiceError, BatchServiceError, OperationServiceError,
        operations::batch_unavailable_detail,
    },
};

/// Every failure the HTTP layer can report, rendered as
/// `{"success": false, "error", "message", "details"}`.
#[derive(Debug)]
pub enum ApiError {
    Validation {
        message: String,
        details: Option<Value>,
    },
    Unauthorized(String),
    NotFound(String),
    AlreadyStarted {
        started_by: String,
        started_at: Option<DateTime<FixedOffset>>,
    },
    BadRequest {
        code: &'static str,
        message: String,
        details: Option<Value>,
    },
    RateLimited {
        retry_after_secs: u64,
    },
    Database(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn invalid_token() -> Self {
        Self::Unauthorized("Invalid or expired token".to_string())
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn batch_not_available(batch: Batch, date: chrono::NaiveDate) -> Self {
        Self::BadRequest {
            code: "BATCH_NOT_AVAILABLE",
            message: "Batch not available for this date".to_string(),
            details: Some(json!({
                "detail": batch_unavailable_detail(batch, date),
                "batch": batch,
                "operation_date": date,
                "available_batches": Batch::available_for(date),
                "day_of_week": batches::day_name(date),
            })),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyStarted { .. } => StatusCode::CONFLICT,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "AUTH_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::AlreadyStarted { .. } => "ALREADY_STARTED",
            ApiError::BadRequest { code, .. } => *code,
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn body(&self) -> Value {
        let (message, details) = match self {
            ApiError::Validation { message, details } => (message.clone(), details.clone()),
            ApiError::Unauthorized(message) | ApiError::NotFound(message) => {
                (message.clone(), None)
            }
            ApiError::AlreadyStarted {
                started_by,
                started_at,
            } => (
                "Operation already started".to_string(),
                Some(json!({ "started_by": started_by, "started_at": started_at })),
            ),
            ApiError::BadRequest {
                message, details, ..
            } => (message.clone(), details.clone()),
            ApiError::RateLimited { retry_after_secs } => (
                "Rate limit exceeded. Please try again later.".to_string(),
                Some(json!({ "retry_after": retry_after_secs })),
            ),
            ApiError::Database(_) => (
                "A database error occurred. Please try again later.".to_string(),
                None,
            ),
            ApiError::Internal(_) => (
                "An unexpected error occurred. Please try again later.".to_string(),
                None,
            ),
        };

        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("error".into(), Value::from(self.code()));
        body.insert("message".into(), Value::from(message));
        // Conflict clients read these at the top level.
        if let Some(Value::Object(extra)) = &details
            && matches!(self, ApiError::AlreadyStarted { .. })
        {
            for (key, value) in extra {
                body.insert(key.clone(), value.clone());
            }
        }
        body.insert("details".into(), details.unwrap_or(Value::Null));
        Value::Object(body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database(context) => error!(%context, "database error"),
            ApiError::Internal(context) => error!(%context, "internal error"),
            _ => {}
        }

        let mut response = (self.status(), Json(self.body())).into_response();
        match self {
            ApiError::Unauthorized(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ApiError::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            }
            _ => {}
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => ApiError::NotFound("User not found".to_string()),
            UserError::EmailExists => {
                ApiError::bad_request("EMAIL_EXISTS", "Email already registered")
            }
            UserError::Database(e) => e.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Database(e) => e.into(),
        }
    }
}

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Database(e) => e.into(),
        }
    }
}

impl From<OperationServiceError> for ApiError {
    fn from(err: OperationServiceError) -> Self {
        match err {
            OperationServiceError::BatchNotAvailable { batch, date } => {
                ApiError::batch_not_available(batch, date)
            }
            OperationServiceError::DateOutOfRange => ApiError::bad_request(
                "INVALID_DATE",
                "Operation date must be between 2024 and 2100",
            ),
            OperationServiceError::ReadOnlyDate => ApiError::bad_request(
                "READONLY_DATE",
                "Cannot modify operations for past dates",
            ),
            OperationServiceError::AlreadyStarted {
                started_by,
                started_at,
            } => ApiError::AlreadyStarted {
                started_by,
                started_at,
            },
            OperationServiceError::NotStarted => ApiError::bad_request(
                "OPERATION_NOT_STARTED",
                "Operation has not been started yet",
            ),
            OperationServiceError::AlreadyCompleted => ApiError::bad_request(
                "OPERATION_ALREADY_COMPLETED",
                "Operation already completed",
            ),
            OperationServiceError::NotFound => {
                ApiError::NotFound("Operation not found".to_string())
            }
            e @ (OperationServiceError::DriverRequiresStats
            | OperationServiceError::InvalidDeliveryStats(_)) => ApiError::validation(e.to_string()),
            OperationServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<BatchServiceError> for ApiError {
    fn from(err: BatchServiceError) -> Self {
        match err {
            BatchServiceError::NotAvailable { batch, date } => {
                ApiError::NotFound(batch_unavailable_detail(batch, date))
            }
            BatchServiceError::DateOutOfRange => ApiError::bad_request(
                "INVALID_DATE",
                "Operation date must be between 2024 and 2100",
            ),
            BatchServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::Validation(message) => ApiError::validation(message),
            AuthServiceError::EmailExists => {
                ApiError::bad_request("EMAIL_EXISTS", "Email already registered")
            }
            AuthServiceError::InvalidCredentials => {
                ApiError::unauthorized("Invalid email or password")
            }
            AuthServiceError::PasswordHash(e) => ApiError::Internal(e.to_string()),
            AuthServiceError::Token(e) => ApiError::Internal(e.to_string()),
            AuthServiceError::User(e) => e.into(),
            AuthServiceError::Session(e) => e.into(),
        }
    }
}
