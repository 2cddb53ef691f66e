use cqrs::ValidationError;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Failures raised by the scope handlers.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("scope `{0}` already exists")]
    AlreadyExists(String),
    #[error("scope `{0}` was not found")]
    NotFound(Uuid),
}

/// The body returned to callers when a request fails.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ErrorResponse {
    fn new(status_code: u16, message: impl Into<String>) -> Self {
        ErrorResponse {
            status_code,
            message: message.into(),
            errors: None,
        }
    }
}

impl From<&cqrs::Error> for ErrorResponse {
    fn from(err: &cqrs::Error) -> Self {
        log::error!("request failed: {}", err);

        if let Some(validation) = err.downcast_ref::<ValidationError>() {
            return ErrorResponse {
                errors: Some(validation.errors().clone()),
                ..ErrorResponse::new(validation.status(), "Validation failed")
            };
        }

        match err.downcast_ref::<ScopeError>() {
            Some(ScopeError::AlreadyExists(_)) => ErrorResponse::new(409, err.to_string()),
            Some(ScopeError::NotFound(_)) => ErrorResponse::new(404, err.to_string()),
            None => ErrorResponse::new(500, "An internal server error occurred"),
        }
    }
}
