use std::time::Duration;

use crate::context::RequestContext;
use crate::dispatcher::Response;

/// Hooks around a whole dispatch.
///
/// `before` runs ahead of root routing; the first `Some` response aborts the
/// request through [`RequestContext::abort_with`] (later middleware still
/// see `before`). `after` runs on the final response, before completion
/// callbacks fire.
pub trait Middleware: Send + Sync {
    fn before(&self, _ctx: &RequestContext) -> Option<Response> {
        None
    }
    fn after(&self, _ctx: &RequestContext, _res: &mut Response, _latency: Duration) {}
}
