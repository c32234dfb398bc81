//! Priority-ordered middleware pipeline.
//!
//! Handlers run once per request, in ascending priority with registration
//! order preserved among equal priorities, strictly sequentially: a handler
//! may suspend on I/O, but no two handlers for the same request ever run
//! concurrently. A handler terminates the chain early only by writing a
//! response into the request context; there is no implicit retry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::identity::RequestContext;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), AppError>;
}

struct MiddlewareEntry {
    priority: i32,
    handler: Arc<dyn Middleware>,
}

#[derive(Default)]
pub struct MiddlewarePipeline {
    entries: Vec<MiddlewareEntry>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ascending priority; the sort is stable, so equal priorities keep
    /// registration order.
    pub fn register(&mut self, priority: i32, handler: Arc<dyn Middleware>) {
        self.entries.push(MiddlewareEntry { priority, handler });
        self.entries.sort_by_key(|e| e.priority);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn execute(&self, ctx: &mut RequestContext) -> Result<(), AppError> {
        for entry in &self.entries {
            entry.handler.handle(ctx).await?;
            if ctx.has_response() {
                break;
            }
        }
        Ok(())
    }
}
