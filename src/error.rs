//! Unified application error model and mapping helpers.
//! This module provides the error enum used across the HTTP surface and the
//! session subsystem, along with the HTTP status mapping. Authentication
//! failures are deliberately NOT represented here: an unverifiable or stale
//! credential degrades to an unauthenticated request inside the session
//! middleware and never propagates as an error.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One field-level cause inside a validation failure, serialized into the
/// `{"errors": [...]}` body of a 400 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub property: String,
    pub error_name: String,
    pub message: String,
}

impl FieldError {
    pub fn new<P: Into<String>, N: Into<String>, M: Into<String>>(
        property: P,
        error_name: N,
        message: M,
    ) -> Self {
        Self { property: property.into(), error_name: error_name.into(), message: message.into() }
    }

    pub fn required(property: &str) -> Self {
        Self::new(property, "isNotEmpty", format!("{property} must not be empty"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Client payload violated a contract; carries the field-level cause list.
    Validation { errors: Vec<FieldError> },
    Auth { code: String, message: String },
    NotFound { code: String, message: String },
    /// Unhandled failure inside a route handler. The request fails, the
    /// process survives.
    Handler { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { .. } => "validation_failed",
            AppError::Auth { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Handler { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { .. } => "request validation failed",
            AppError::Auth { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Handler { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        AppError::Validation { errors }
    }
    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Auth { code: code.into(), message: msg.into() }
    }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::NotFound { code: code.into(), message: msg.into() }
    }
    pub fn handler<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Handler { code: code.into(), message: msg.into() }
    }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Internal { code: code.into(), message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::NotFound { .. } => 404,
            AppError::Handler { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Handler { code: "handler_error".into(), message: err.to_string() }
    }
}
