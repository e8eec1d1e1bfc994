use serde_json::{json, Map, Value};

use crate::context::RequestContext;
use crate::dispatcher::Response;
use crate::resource::{Instance, Invoked, Invoker};

/// Answers with a JSON description of how the request was routed.
///
/// Used for descriptor-built deployments, where resources have no code of
/// their own. A fixed `body` replaces the echo payload.
#[derive(Debug, Clone)]
pub struct EchoInvoker {
    resource: String,
    status: u16,
    body: Option<Value>,
}

impl EchoInvoker {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            status: 200,
            body: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl Invoker for EchoInvoker {
    fn invoke(&self, instance: &Instance, ctx: &RequestContext) -> anyhow::Result<Invoked> {
        let body = match &self.body {
            Some(body) => body.clone(),
            None => {
                // Later hops overwrite earlier captures of the same name.
                let mut params = Map::new();
                for (name, value) in ctx.all_path_params() {
                    params.insert(name.to_string(), Value::String(value));
                }
                json!({
                    "resource": self.resource,
                    "method": ctx.method().as_str(),
                    "path": ctx.path(),
                    "matched": ctx.matched_path(),
                    "params": params,
                    "endpoint": instance.class_id().name(),
                    "locator_depth": ctx.locator_depth(),
                })
            }
        };
        Ok(Invoked::Response(Response::json(self.status, body)))
    }
}
