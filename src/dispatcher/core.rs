//! Dispatcher core module - hot path for request dispatch.
//!
//! A request walks a chain of [`ServerHandler`]s. Each handler either lets
//! the chain continue, answers the request, or schedules a restart at
//! another runtime resource through [`RequestContext::restart`]; the loop
//! then swaps to that resource's chain. Locator chains are nothing more
//! than repeated restarts.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use http::Method;
use may::coroutine;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::response::Response;
use crate::context::{CancelHandle, RequestContext, RequestId};
use crate::deployment::Deployment;
use crate::error::DispatchError;
use crate::locator::{advance, LocatorStep};
use crate::middleware::Middleware;
use crate::resource::{BeanManager, Invoked, MethodMap};

/// What a handler wants the loop to do next.
#[derive(Debug)]
pub enum Flow {
    /// Run the next handler, or the restart target's chain if one was set
    Continue,
    /// Terminate with this response
    Respond(Response),
}

/// One step of request processing.
///
/// Protocol outcomes (404, 405, OPTIONS) are returned as
/// [`Flow::Respond`]; structural failures as `Err`.
pub trait ServerHandler: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, DispatchError>;
}

/// Matches the full request path against the deployment's root map.
#[derive(Debug, Clone)]
pub struct RootRoutingHandler {
    root: Arc<MethodMap>,
}

impl RootRoutingHandler {
    pub fn new(root: Arc<MethodMap>) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Arc<MethodMap> {
        &self.root
    }
}

impl ServerHandler for RootRoutingHandler {
    fn name(&self) -> &'static str {
        "root_routing"
    }

    fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, DispatchError> {
        // The root hop never counts towards the locator depth.
        advance(ctx, &self.root, None, false, usize::MAX).map(LocatorStep::into_flow)
    }
}

/// Makes sure an endpoint instance is present before invocation.
///
/// Root resources get a fresh bean of their declaring class; resources
/// reached through a locator reuse the locator object.
#[derive(Debug, Clone)]
pub struct InstanceHandler {
    beans: BeanManager,
}

impl InstanceHandler {
    pub fn new(beans: BeanManager) -> Self {
        Self { beans }
    }
}

impl ServerHandler for InstanceHandler {
    fn name(&self) -> &'static str {
        "instance"
    }

    fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, DispatchError> {
        if ctx.endpoint_instance().is_some() {
            return Ok(Flow::Continue);
        }
        let Some(class) = ctx.current_resource().map(|r| r.bean.clone()) else {
            return Ok(Flow::Continue);
        };
        let instance = self.beans.acquire(&class, ctx)?;
        self.beans.inject_if_bean(&instance, ctx);
        ctx.set_endpoint_instance(instance);
        Ok(Flow::Continue)
    }
}

/// Calls the current resource's invoker on the endpoint instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationHandler;

impl ServerHandler for InvocationHandler {
    fn name(&self) -> &'static str {
        "invocation"
    }

    fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, DispatchError> {
        let Some(resource) = ctx.current_resource().cloned() else {
            return Ok(Flow::Continue);
        };
        let Some(instance) = ctx.endpoint_instance().cloned() else {
            return Err(DispatchError::Instantiation {
                class: resource.bean.clone(),
                source: anyhow::anyhow!("no endpoint instance for resource '{}'", resource.id),
            });
        };

        // I1: invoke
        debug!(
            request_id = %ctx.request_id(),
            resource = %resource.id,
            endpoint_class = %instance.class_id(),
            "Invoking resource"
        );
        match resource.invoker.invoke(&instance, ctx) {
            Ok(Invoked::Response(response)) => Ok(Flow::Respond(response)),
            Ok(Invoked::Locator(value)) if resource.is_locator() => {
                ctx.set_result(Some(value));
                Ok(Flow::Continue)
            }
            Ok(Invoked::Locator(value)) => Err(DispatchError::Invocation {
                resource: resource.id.clone(),
                source: anyhow::anyhow!(
                    "terminal resource returned a locator value of class {}",
                    value.class_id()
                ),
            }),
            Err(source) => {
                // I2: resource failure
                error!(
                    request_id = %ctx.request_id(),
                    resource = %resource.id,
                    error = %source,
                    "Resource invocation failed"
                );
                Err(DispatchError::Invocation {
                    resource: resource.id.clone(),
                    source,
                })
            }
        }
    }
}

/// Result of one dispatch, after completion callbacks have run.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub response: Response,
    pub request_id: RequestId,
    /// Structural failure that produced a 5xx response, if any
    pub error: Option<DispatchError>,
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    request_id: RequestId,
    response: &'a Response,
    error: Option<String>,
}

impl DispatchOutcome {
    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// `{request_id, response, error}` for CLI output
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(OutcomeJson {
            request_id: self.request_id,
            response: &self.response,
            error: self.error.as_ref().map(ToString::to_string),
        })
        .unwrap_or(Value::Null)
    }
}

/// A dispatch running in its own coroutine.
pub struct PendingDispatch {
    handle: coroutine::JoinHandle<DispatchOutcome>,
    cancel: CancelHandle,
}

impl PendingDispatch {
    /// Ask the dispatch to stop before its next handler step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the outcome.
    pub fn join(self) -> anyhow::Result<DispatchOutcome> {
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("dispatch coroutine panicked"))
    }
}

/// Entry point of the runtime: owns the active deployment and middleware.
pub struct Dispatcher {
    deployment: ArcSwap<Deployment>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment: ArcSwap::from_pointee(deployment),
            middlewares: Vec::new(),
        }
    }

    /// Add middleware; runs in insertion order.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// The deployment new requests will use
    #[must_use]
    pub fn deployment(&self) -> Arc<Deployment> {
        self.deployment.load_full()
    }

    /// Swap in a new deployment. In-flight requests finish on the old one.
    pub fn redeploy(&self, deployment: Deployment) {
        info!(
            classes = deployment.table().registered_classes().len(),
            "Deployment replaced"
        );
        self.deployment.store(Arc::new(deployment));
    }

    /// Dispatch `method path` to completion on the calling coroutine/thread.
    pub fn dispatch(&self, method: Method, path: &str) -> DispatchOutcome {
        self.dispatch_context(self.new_context(method, path))
    }

    /// A context for `method path` sized by the active deployment's config.
    #[must_use]
    pub fn new_context(&self, method: Method, path: &str) -> RequestContext {
        let mut ctx = RequestContext::new(method, path);
        ctx.reserve_path_params(self.deployment.load().config().max_path_params);
        ctx
    }

    /// Dispatch a prepared context.
    pub fn dispatch_context(&self, mut ctx: RequestContext) -> DispatchOutcome {
        let deployment = self.deployment.load_full();
        let start = Instant::now();

        // D1: request received
        debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            middleware_count = self.middlewares.len(),
            "Dispatch start"
        );

        // D2: middleware before
        let mut short_circuited = false;
        for mw in &self.middlewares {
            if let Some(early) = mw.before(&ctx) {
                if !short_circuited {
                    short_circuited = true;
                    ctx.abort_with(early);
                }
            }
        }

        let (mut response, error) = match run(&deployment, &mut ctx) {
            Ok(response) => (response, None),
            Err(err) => {
                error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    error = %err,
                    "Dispatch failed"
                );
                (Response::error(err.status(), &err.to_string()), Some(err))
            }
        };
        if *ctx.method() == Method::HEAD {
            response.body = Value::Null;
        }

        // D3: middleware after
        let latency = start.elapsed();
        for mw in &self.middlewares {
            mw.after(&ctx, &mut response, latency);
        }

        // D4: completion callbacks, exactly once
        ctx.complete(error.as_ref());

        log_completion(&ctx, &response, latency);
        DispatchOutcome {
            response,
            request_id: ctx.request_id(),
            error,
        }
    }

    /// Dispatch inside a new `may` coroutine sized by the deployment's
    /// `stack_size`. The context is created and dropped inside it.
    ///
    /// # Safety
    ///
    /// `may::coroutine::Builder::spawn` is unsafe: the caller must make sure
    /// the may runtime is configured and that resource invokers do not hold
    /// thread-local state across coroutine yields.
    pub unsafe fn spawn(self: &Arc<Self>, method: Method, path: &str) -> io::Result<PendingDispatch> {
        let stack_size = self.deployment().config().stack_size;
        let cancel = CancelHandle::default();
        let dispatcher = Arc::clone(self);
        let path = path.to_owned();
        let ctx_cancel = cancel.clone();

        // SAFETY: see the function contract; the closure owns everything it uses.
        let handle = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    let ctx = dispatcher
                        .new_context(method, &path)
                        .with_cancel_handle(ctx_cancel);
                    dispatcher.dispatch_context(ctx)
                })
        }?;
        Ok(PendingDispatch { handle, cancel })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

fn run(deployment: &Deployment, ctx: &mut RequestContext) -> Result<Response, DispatchError> {
    let mut chain = deployment.root_chain();
    loop {
        let mut restarted = false;
        for handler in chain {
            if ctx.is_cancelled() {
                warn!(request_id = %ctx.request_id(), "Request cancelled");
                return Err(DispatchError::Cancelled);
            }
            if let Some(aborted) = ctx.take_aborted() {
                return Ok(aborted);
            }
            match handler.handle(ctx)? {
                Flow::Respond(response) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        handler = handler.name(),
                        status = response.status,
                        "Handler responded"
                    );
                    return Ok(response);
                }
                Flow::Continue => {}
            }
            if let Some(target) = ctx.take_restart() {
                debug!(
                    request_id = %ctx.request_id(),
                    resource = %target.id,
                    remaining = %ctx.remaining(),
                    locator_depth = ctx.locator_depth(),
                    "Restart"
                );
                chain = deployment.chain_for(&target);
                restarted = true;
                break;
            }
        }
        if !restarted {
            if let Some(aborted) = ctx.take_aborted() {
                return Ok(aborted);
            }
            return Ok(Response::no_content());
        }
    }
}

fn log_completion(ctx: &RequestContext, response: &Response, latency: Duration) {
    let latency_ms = latency.as_millis() as u64;
    match response.status {
        404 | 405 => warn!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = response.status,
            latency_ms,
            "Dispatch complete"
        ),
        _ => info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = response.status,
            locator_depth = ctx.locator_depth(),
            latency_ms,
            "Dispatch complete"
        ),
    }
}
