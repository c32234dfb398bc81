//!
//! vestibule HTTP server
//! ---------------------
//! Axum-based request-lifecycle server. Owns deferred bootstrap-hook
//! coordination, the priority-ordered middleware pipeline, access logging
//! under a per-request correlation id, and the classified error channels.
//!
//! Responsibilities:
//! - Run every registered bootstrap hook to completion before the socket
//!   opens; the first failure aborts startup.
//! - Per request: assign a correlation id, log entry, execute the pipeline,
//!   dispatch to the routed handler, log status and elapsed time.
//! - Route terminal conditions into their error channel: structured 400s,
//!   generic 404/500 pages, and the fatal channel for faults outside any
//!   request boundary.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::{Json, Router};
use futures_util::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::identity::{EarlyResponse, RequestContext};

use self::fatal::FatalGuard;
use self::pipeline::MiddlewarePipeline;

pub mod api;
pub mod fatal;
pub mod pipeline;

/// Response header instructing the caller to discard its stored token. Set
/// uniformly for explicit logout and for detected stale sessions.
pub const CLEAR_SESSION_HEADER: &str = "clear-session";

/// Deferred initializer; all registered hooks must settle before the server
/// accepts connections.
#[async_trait]
pub trait BootstrapHook: Send {
    async fn run(&mut self, server: &mut HttpServer) -> anyhow::Result<()>;
}

pub struct HttpServer {
    name: String,
    version: String,
    port: u16,
    pipeline: MiddlewarePipeline,
    bootstrap: Vec<Box<dyn BootstrapHook>>,
    router: Router,
    fatal: Arc<FatalGuard>,
}

#[derive(Clone)]
struct LifecycleState {
    pipeline: Arc<MiddlewarePipeline>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            port: config.http_port,
            pipeline: MiddlewarePipeline::new(),
            bootstrap: Vec::new(),
            router: Router::new(),
            fatal: Arc::new(FatalGuard::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pipeline_mut(&mut self) -> &mut MiddlewarePipeline {
        &mut self.pipeline
    }

    pub fn fatal_guard(&self) -> Arc<FatalGuard> {
        Arc::clone(&self.fatal)
    }

    /// Routes are declared by the caller; the server owns only the request
    /// lifecycle around them.
    pub fn merge_routes(&mut self, routes: Router) {
        self.router = std::mem::take(&mut self.router).merge(routes);
    }

    pub fn on_bootstrap(&mut self, hook: Box<dyn BootstrapHook>) {
        self.bootstrap.push(hook);
    }

    /// Every hook settles before the socket opens; the first failure aborts
    /// startup. Hooks registered by other hooks are honored too.
    async fn run_bootstrap(&mut self) -> anyhow::Result<()> {
        while !self.bootstrap.is_empty() {
            let mut hooks = std::mem::take(&mut self.bootstrap);
            for hook in hooks.iter_mut() {
                hook.run(self).await?;
            }
        }
        Ok(())
    }

    /// Run bootstrap, bind, and start serving. Returns once the socket is
    /// accepting connections.
    pub async fn listen(mut self) -> anyhow::Result<ServerHandle> {
        self.run_bootstrap().await?;

        let state = LifecycleState { pipeline: Arc::new(self.pipeline) };
        let app = self
            .router
            .fallback(not_found)
            .layer(middleware::from_fn_with_state(state, request_lifecycle));

        let addr: SocketAddr = format!("0.0.0.0:{}", self.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("{} {} listening on {}", self.name, self.version, local_addr);

        let shutdown = Arc::new(Notify::new());
        let notify = Arc::clone(&shutdown);
        let fatal = Arc::clone(&self.fatal);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    notify.notified().await;
                })
                .await;
            if let Err(e) = &result {
                // Accept-loop failure is outside any request's boundary.
                fatal.dispatch("serve", &e.to_string());
            }
            result.map_err(anyhow::Error::from)
        });

        Ok(ServerHandle { local_addr, shutdown, task, fatal: self.fatal })
    }
}

/// Handle on a listening server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    task: JoinHandle<anyhow::Result<()>>,
    fatal: Arc<FatalGuard>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections; resolves once the server has fully
    /// stopped.
    pub async fn close(self) -> anyhow::Result<()> {
        self.shutdown.notify_one();
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => {
                self.fatal.dispatch("serve-task", &join_err.to_string());
                Err(anyhow::anyhow!("server task failed: {join_err}"))
            }
        }
    }

    /// Run until the accept loop ends on its own.
    pub async fn join(self) -> anyhow::Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => {
                self.fatal.dispatch("serve-task", &join_err.to_string());
                Err(anyhow::anyhow!("server task failed: {join_err}"))
            }
        }
    }
}

async fn request_lifecycle(
    State(state): State<LifecycleState>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::new(req.method().clone(), req.uri().clone(), req.headers().clone());
    let request_id = ctx.request_id.clone();
    info!(target: "access", "request_id={} method={} url={}", request_id, ctx.method, ctx.uri);

    let mut response = match state.pipeline.execute(&mut ctx).await {
        Err(err) => error_response(&err),
        Ok(()) => {
            if let Some(early) = ctx.take_response() {
                early_response(early)
            } else {
                req.extensions_mut().insert(ctx.clone());
                match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                    Ok(response) => response,
                    Err(panic_payload) => {
                        let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                            *s
                        } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                            s.as_str()
                        } else {
                            "panic"
                        };
                        error!(target: "panic", "request_id={} handler panic: {}", request_id, msg);
                        internal_error_page(msg)
                    }
                }
            }
        }
    };

    if ctx.clear_session {
        response
            .headers_mut()
            .insert(CLEAR_SESSION_HEADER, HeaderValue::from_static("true"));
    }
    info!(
        target: "access",
        "request_id={} status={} time={}",
        request_id,
        response.status().as_u16(),
        ctx.elapsed_ms()
    );
    response
}

/// No route matched: no correlation id was assigned pre-routing, so a fresh
/// one is synthesized for the log line.
async fn not_found(req: Request) -> Response {
    let request_id = Uuid::new_v4().to_string();
    info!(target: "access", "request_id={} status=404 url={}", request_id, req.uri());
    error_response(&AppError::not_found("no_route", format!("no route matched {}", req.uri())))
}

fn early_response(early: EarlyResponse) -> Response {
    (early.status, early.body).into_response()
}

/// Classified error-channel dispatch: each category gets exactly one
/// handling path.
fn error_response(err: &AppError) -> Response {
    match err {
        AppError::Validation { errors } => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "errors": errors })),
        )
            .into_response(),
        AppError::Auth { .. } => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "status": "unauthorized",
                "code": err.code_str(),
                "message": err.message()
            })),
        )
            .into_response(),
        AppError::NotFound { .. } => not_found_page(),
        AppError::Handler { .. } | AppError::Internal { .. } => {
            error!(target: "error", "{}", err);
            internal_error_page(err.message())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

fn not_found_page() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>404</h1>".to_string())).into_response()
}

/// Generic failure page. Diagnostic detail is available in debug builds
/// only.
fn internal_error_page(detail: &str) -> Response {
    let mut page = String::from("<h1>sorry, this is broken right now... try again later?</h1>");
    if cfg!(debug_assertions) {
        page.push_str(&format!(
            "\n<div style=\"background: #feeeee\"><pre>{}</pre></div>",
            detail
        ));
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
}
