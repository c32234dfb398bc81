//! User-facing session endpoints built on the session core: login issues a
//! token, logout invalidates the backing record, and the session echo lets a
//! client recover its identity.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, FieldError};
use crate::identity::{verify_password, RequestContext, SessionService, UserDirectory};

use super::CLEAR_SESSION_HEADER;

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionService>,
    pub users: Arc<dyn UserDirectory>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/users/authenticate", post(authenticate))
        .route("/api/users/logout", get(logout))
        .route("/api/users/session", post(session))
        .with_state(state)
}

async fn index() -> &'static str {
    "vestibule ok"
}

#[derive(Debug, Deserialize)]
struct AuthenticatePayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn authenticate(
    State(state): State<ApiState>,
    Json(payload): Json<AuthenticatePayload>,
) -> Result<Response, AppError> {
    let mut errors = Vec::new();
    if payload.email.trim().is_empty() {
        errors.push(FieldError::required("email"));
    }
    if payload.password.is_empty() {
        errors.push(FieldError::required("password"));
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let Some(record) = state.users.find_by_email(&payload.email).await else {
        return Err(AppError::validation(vec![FieldError::new(
            "email",
            "notFound",
            "User not found",
        )]));
    };
    if !verify_password(&record.password_hash, &payload.password) {
        return Err(AppError::validation(vec![FieldError::new(
            "password",
            "isInvalid",
            "invalid email or password",
        )]));
    }

    let token = state
        .sessions
        .issue_session(&record.user)
        .await
        .map_err(|e| AppError::handler("issue_session", e.to_string()))?;
    Ok((StatusCode::OK, Json(json!({ "token": token }))).into_response())
}

/// Logout requires an authenticated principal; invalidation plus the
/// always-recheck in authenticate makes the token dead from here on.
async fn logout(
    State(state): State<ApiState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let Some(principal) = ctx.principal else {
        return Err(AppError::auth("no_session", "logout requires an authenticated session"));
    };
    state.sessions.invalidate(&principal.session_id).await;

    let mut headers = HeaderMap::new();
    headers.insert(CLEAR_SESSION_HEADER, HeaderValue::from_static("true"));
    headers.insert(header::LOCATION, HeaderValue::from_static("/"));
    Ok((StatusCode::SEE_OTHER, headers).into_response())
}

async fn session(Extension(ctx): Extension<RequestContext>) -> Response {
    match ctx.principal {
        Some(principal) => (StatusCode::OK, Json(json!(principal.user))).into_response(),
        None => StatusCode::OK.into_response(),
    }
}
