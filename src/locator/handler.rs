//! Locator step of the handler chain.
//!
//! Also hosts the mapper selection and match application shared with root
//! routing, so both levels agree on HEAD/OPTIONS handling and on how
//! captures land in the request context.

use std::sync::Arc;

use http::Method;
use tracing::{debug, error, warn};

use super::table::LocatorTable;
use crate::context::RequestContext;
use crate::dispatcher::{Flow, Response, ServerHandler};
use crate::error::DispatchError;
use crate::resource::{BeanManager, Instance, LocatorValue, MethodMap, ResourceMapper};

/// Outcome of one locator step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorStep {
    /// No locator object was pending
    Idle,
    /// Dispatch was restarted at the matched resource
    Restarted,
    /// `OPTIONS` with no explicit mapper; carries the methods at this node
    Options(Vec<Method>),
    /// No template matched and no null-method mapper was involved
    NotFound,
    /// No mapper for the method, or no match under the null-method mapper
    MethodNotAllowed,
}

impl LocatorStep {
    /// Protocol outcomes become a response; the rest continue the chain.
    #[must_use]
    pub fn into_flow(self) -> Flow {
        match self {
            LocatorStep::Idle | LocatorStep::Restarted => Flow::Continue,
            LocatorStep::Options(methods) => Flow::Respond(Response::options(&methods)),
            LocatorStep::NotFound => Flow::Respond(Response::status(404)),
            LocatorStep::MethodNotAllowed => Flow::Respond(Response::status(405)),
        }
    }
}

pub(crate) enum MapperSelection<'a> {
    Mapper {
        mapper: &'a ResourceMapper,
        had_null_method_mapper: bool,
    },
    Options(Vec<Method>),
    MethodNotAllowed,
}

/// Pick the mapper for `method`: exact key, then the null-method mapper,
/// then GET for HEAD. OPTIONS with neither is answered from the map's keys.
pub(crate) fn select_mapper<'a>(map: &'a MethodMap, method: &Method) -> MapperSelection<'a> {
    if let Some(mapper) = map.get(method) {
        return MapperSelection::Mapper {
            mapper,
            had_null_method_mapper: false,
        };
    }
    // Set on any miss of the exact key; it only matters once a mapper
    // was found, and then that mapper came from a fallback.
    let fallback = map.null_mapper().or_else(|| {
        if *method == Method::HEAD {
            map.get(&Method::GET)
        } else {
            None
        }
    });
    match fallback {
        Some(mapper) => MapperSelection::Mapper {
            mapper,
            had_null_method_mapper: true,
        },
        None if *method == Method::OPTIONS => MapperSelection::Options(map.methods()),
        None => MapperSelection::MethodNotAllowed,
    }
}

/// Match `ctx.remaining()` against `map` and restart dispatch at the winner.
///
/// `endpoint` becomes the receiver of the next invocation when given.
/// `is_locator` marks the restart as a locator continuation, which is what
/// `max_depth` limits.
pub(crate) fn advance(
    ctx: &mut RequestContext,
    map: &MethodMap,
    endpoint: Option<Instance>,
    is_locator: bool,
    max_depth: usize,
) -> Result<LocatorStep, DispatchError> {
    let (mapper, had_null_method_mapper) = match select_mapper(map, ctx.method()) {
        MapperSelection::Mapper {
            mapper,
            had_null_method_mapper,
        } => (mapper, had_null_method_mapper),
        MapperSelection::Options(methods) => {
            debug!(
                request_id = %ctx.request_id(),
                allow = ?methods,
                "OPTIONS synthesized"
            );
            return Ok(LocatorStep::Options(methods));
        }
        MapperSelection::MethodNotAllowed => {
            warn!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                remaining = %ctx.remaining(),
                "No mapper for method"
            );
            return Ok(LocatorStep::MethodNotAllowed);
        }
    };

    let input = if ctx.remaining().is_empty() {
        "/"
    } else {
        ctx.remaining()
    };
    let Some(m) = mapper.map(input) else {
        warn!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            remaining = %ctx.remaining(),
            had_null_method_mapper,
            "No template matched"
        );
        return Ok(if had_null_method_mapper {
            LocatorStep::MethodNotAllowed
        } else {
            LocatorStep::NotFound
        });
    };

    if is_locator && ctx.locator_depth() >= max_depth {
        error!(
            request_id = %ctx.request_id(),
            depth = ctx.locator_depth(),
            max = max_depth,
            "Locator depth exceeded"
        );
        return Err(DispatchError::LocatorDepthExceeded { max: max_depth });
    }

    debug!(
        request_id = %ctx.request_id(),
        template = %m.template,
        resource = %m.value.id,
        remaining = %m.remaining,
        "Template matched, restarting"
    );

    ctx.save_uri_match_state();
    ctx.set_remaining(m.remaining);
    if let Some(endpoint) = endpoint {
        ctx.set_endpoint_instance(endpoint);
    }
    ctx.set_result(None);
    ctx.restart(Arc::clone(&m.value), is_locator);
    ctx.set_max_path_params(m.path_param_values.len());
    for (i, value) in m.path_param_values.into_iter().enumerate() {
        let Some(value) = value else { break };
        ctx.set_path_param_value(i, value);
    }
    ctx.set_path_param_names(Arc::clone(m.template.names()));
    ctx.push_matched(&m.matched);
    Ok(LocatorStep::Restarted)
}

/// Turns a pending locator object into the next hop of the request.
#[derive(Debug, Clone)]
pub struct ResourceLocatorHandler {
    table: Arc<LocatorTable>,
    beans: BeanManager,
    max_depth: usize,
}

impl ResourceLocatorHandler {
    pub fn new(table: Arc<LocatorTable>, beans: BeanManager, max_depth: usize) -> Self {
        Self {
            table,
            beans,
            max_depth,
        }
    }

    #[must_use]
    pub fn table(&self) -> &Arc<LocatorTable> {
        &self.table
    }

    /// Resolve the pending locator object in `ctx`, if any.
    pub fn resolve(&self, ctx: &mut RequestContext) -> Result<LocatorStep, DispatchError> {
        let Some(locator) = ctx.take_result() else {
            return Ok(LocatorStep::Idle);
        };

        // L1: determine the locator class, acquiring a bean for class values
        let (instance, class) = match locator {
            LocatorValue::Class(class) => (self.beans.acquire(&class, ctx)?, class),
            LocatorValue::Instance(instance) => {
                let class = instance.class_id();
                (instance, class)
            }
        };
        debug!(
            request_id = %ctx.request_id(),
            locator_class = %class,
            depth = ctx.locator_depth(),
            "Resolving locator"
        );

        // L2: only container beans receive request-scoped injection
        self.beans.inject_if_bean(&instance, ctx);

        // L3: method map for the locator class
        let Some(map) = self.table.find_target(&class) else {
            error!(
                request_id = %ctx.request_id(),
                locator_class = %class,
                "Locator returned an object that is not a resource"
            );
            return Err(DispatchError::NoResourceFromLocator { class });
        };

        // L4: select mapper, match, restart
        advance(ctx, &map, Some(instance), true, self.max_depth)
    }
}

impl ServerHandler for ResourceLocatorHandler {
    fn name(&self) -> &'static str {
        "resource_locator"
    }

    fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, DispatchError> {
        self.resolve(ctx).map(LocatorStep::into_flow)
    }
}
