//! Extractors whose rejections render as `VALIDATION_ERROR` bodies.

use axum::extract::{
    FromRequest, FromRequestParts,
    rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
};
use serde_json::json;

use super::error::ApiError;
use crate::domain::{Batch, Role};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ValidForm<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ValidQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ValidPath<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_with("Invalid input data", json!({ "body": rejection.body_text() }))
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::validation_with("Invalid input data", json!({ "form": rejection.body_text() }))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_with(
            "Invalid input data",
            json!({ "query": rejection.body_text() }),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation_with("Invalid input data", json!({ "path": rejection.body_text() }))
    }
}

pub fn parse_batch(raw: &str) -> Result<Batch, ApiError> {
    raw.parse::<Batch>()
        .map_err(|e| ApiError::validation_with(e.to_string(), json!({ "batch": raw })))
}

pub fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse::<Role>()
        .map_err(|e| ApiError::validation_with(e.to_string(), json!({ "role": raw })))
}
