use std::time::Duration;

use dashmap::DashMap;
use tracing::{field, info_span, Span};

use super::Middleware;
use crate::context::{RequestContext, RequestId};
use crate::dispatcher::Response;

/// Opens a `request` span per dispatch and records its outcome.
///
/// Spans are keyed by request id rather than held in thread-locals, since a
/// dispatch may migrate between threads when it runs in a coroutine.
#[derive(Debug, Default)]
pub struct TracingMiddleware {
    spans: DashMap<RequestId, Span>,
}

impl TracingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests whose span is still open
    #[must_use]
    pub fn open_spans(&self) -> usize {
        self.spans.len()
    }
}

impl Middleware for TracingMiddleware {
    fn before(&self, ctx: &RequestContext) -> Option<Response> {
        let span = info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = field::Empty,
            latency_ms = field::Empty,
            locator_depth = field::Empty,
        );
        self.spans.insert(ctx.request_id(), span);
        None
    }

    fn after(&self, ctx: &RequestContext, res: &mut Response, latency: Duration) {
        if let Some((_, span)) = self.spans.remove(&ctx.request_id()) {
            span.record("status", res.status);
            span.record("latency_ms", latency.as_millis() as u64);
            span.record("locator_depth", ctx.locator_depth());
        }
    }
}
