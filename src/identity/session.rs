//! Session issuance, validation and invalidation.
//!
//! `SessionService` reconciles a stateless, cryptographically verifiable
//! token with mutable server-side session state: every authentication
//! re-checks the session store, so removing a record is functionally
//! equivalent to revoking the token even though the signature itself stays
//! valid.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::AppError;
use crate::server::pipeline::Middleware;
use crate::server::{BootstrapHook, HttpServer};

use super::principal::{Principal, UserSnapshot};
use super::request_context::RequestContext;
use super::store::SessionStore;
use super::token::{Claims, TokenCodec};

/// The session middleware runs before everything else in the pipeline.
pub const SESSION_MIDDLEWARE_PRIORITY: i32 = 0;

const BEARER_SCHEME: &str = "Bearer ";

/// Outcome of one authentication attempt. `Invalid` and `Stale` are
/// observably equivalent to the caller (no principal) but distinguished
/// internally: only `Stale` carries the clear-session hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No credential offered, or not in `Bearer <token>` form.
    Anonymous,
    /// Bad signature or malformed structure.
    Invalid,
    /// Cryptographically valid token whose backing record is gone.
    Stale { session_id: String },
    Authenticated(Principal),
}

pub struct SessionService {
    codec: TokenCodec,
    store: SessionStore,
}

impl SessionService {
    pub fn new(codec: TokenCodec, store: SessionStore) -> Self {
        Self { codec, store }
    }

    /// Allocate a session record and mint a token embedding its id. The
    /// token goes back to the caller; the record stays server-side.
    pub async fn issue_session(&self, user: &UserSnapshot) -> anyhow::Result<String> {
        let session_id = self.store.create(user).await?;
        let token = self.codec.issue(&Claims::for_session(session_id.clone()))?;
        info!(target: "auth", "session issued user={} sid={}", user.id, session_id);
        Ok(token)
    }

    /// Establish the caller's identity from an `Authorization` header value.
    /// Failures are swallowed into an unauthenticated outcome and logged;
    /// nothing here propagates as an error.
    pub async fn authenticate(&self, authorization: Option<&str>) -> AuthOutcome {
        let Some(value) = authorization else {
            return AuthOutcome::Anonymous;
        };
        let Some(token) = value.strip_prefix(BEARER_SCHEME) else {
            return AuthOutcome::Anonymous;
        };
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(target: "auth", "token rejected: {}", e);
                return AuthOutcome::Invalid;
            }
        };
        match self.store.read(&claims.session_id).await {
            Some(user) => AuthOutcome::Authenticated(Principal {
                user,
                authenticated: true,
                session_id: claims.session_id,
            }),
            None => {
                debug!(target: "auth", "stale session sid={}", claims.session_id);
                AuthOutcome::Stale { session_id: claims.session_id }
            }
        }
    }

    /// Remove the session record. Idempotent; false when nothing existed.
    pub async fn invalidate(&self, session_id: &str) -> bool {
        let removed = self.store.remove(session_id).await;
        info!(target: "auth", "session invalidated sid={} removed={}", session_id, removed);
        removed
    }

    /// Register the session middleware into the server's pipeline at
    /// priority 0.
    pub fn register_with_server(self: &Arc<Self>, server: &mut HttpServer) {
        server
            .pipeline_mut()
            .register(SESSION_MIDDLEWARE_PRIORITY, Arc::clone(self) as Arc<dyn Middleware>);
    }

    /// Bootstrap hook performing the pipeline registration before the server
    /// starts listening.
    pub fn bootstrap_hook(self: &Arc<Self>) -> Box<dyn BootstrapHook> {
        Box::new(SessionBootstrap { sessions: Arc::clone(self) })
    }
}

/// Missing or invalid credentials are not request errors: the middleware
/// never aborts the pipeline, it only attaches a principal or sets the
/// clear-session hint.
#[async_trait]
impl Middleware for SessionService {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), AppError> {
        match self.authenticate(ctx.header("authorization")).await {
            AuthOutcome::Authenticated(principal) => ctx.principal = Some(principal),
            AuthOutcome::Stale { .. } => ctx.clear_session = true,
            AuthOutcome::Invalid | AuthOutcome::Anonymous => {}
        }
        Ok(())
    }
}

struct SessionBootstrap {
    sessions: Arc<SessionService>,
}

#[async_trait]
impl BootstrapHook for SessionBootstrap {
    async fn run(&mut self, server: &mut HttpServer) -> anyhow::Result<()> {
        self.sessions.register_with_server(server);
        Ok(())
    }
}
