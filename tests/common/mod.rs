//! Shared fixtures for integration tests: endpoint types, a recording log
//! and helpers that build small deployments.

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use http::Method;
use parking_lot::Mutex;
use serde_json::json;
use subrouter::context::RequestContext;
use subrouter::dispatcher::Response;
use subrouter::resource::{ClassId, ClassInfo, Endpoint, Instance, Invoked, LocatorValue};
use subrouter::{Deployment, DeploymentBuilder, RuntimeResource};

/// Ordered record of what the resources under test observed.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// A resource object identified only by its class.
pub struct Plain(pub ClassId);

impl Endpoint for Plain {
    fn class_id(&self) -> ClassId {
        self.0.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn plain(class: &str) -> Instance {
    Arc::new(Plain(ClassId::new(class)))
}

pub fn constructible(class: &str) -> ClassInfo {
    let id = ClassId::new(class);
    ClassInfo::new(class).with_constructor(move || Arc::new(Plain(id.clone())) as Instance)
}

/// Terminal resource that records `id` and answers 200 with its captures.
pub fn terminal(id: &str, class: &str, method: Method, log: &Log) -> RuntimeResource {
    let log = log.clone();
    let name = id.to_owned();
    RuntimeResource::terminal(id, class, method, move |instance: &Instance, ctx: &RequestContext| -> anyhow::Result<Invoked> {
        log.push(name.clone());
        let params: Vec<(String, String)> = ctx
            .all_path_params()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Ok(Invoked::Response(Response::json(
            200,
            json!({
                "resource": name,
                "endpoint": instance.class_id().name(),
                "params": params,
                "remaining": ctx.remaining(),
            }),
        )))
    })
}

/// Locator resource returning a fresh instance of `target`.
pub fn instance_locator(id: &str, class: &str, target: &str, log: &Log) -> RuntimeResource {
    let log = log.clone();
    let name = id.to_owned();
    let target = target.to_owned();
    RuntimeResource::locator(id, class, move |_: &Instance, _: &RequestContext| -> anyhow::Result<Invoked> {
        log.push(name.clone());
        Ok(Invoked::Locator(LocatorValue::Instance(plain(&target))))
    })
}

/// Locator resource returning `target` as a class for the container to build.
pub fn class_locator(id: &str, class: &str, target: &str) -> RuntimeResource {
    let target = ClassId::new(target);
    RuntimeResource::locator(id, class, move |_: &Instance, _: &RequestContext| -> anyhow::Result<Invoked> {
        Ok(Invoked::Locator(LocatorValue::Class(target.clone())))
    })
}

/// `Root` with `GET /hello` and a `/sub` locator to `Leaf { GET /leaf }`.
pub fn root_and_leaf(log: &Log) -> DeploymentBuilder {
    Deployment::builder()
        .root("Root")
        .class(constructible("Root"))
        .class(constructible("Leaf"))
        .resource("Root", Some(Method::GET), "/hello", terminal("R", "Root", Method::GET, log))
        .resource("Root", None, "/sub", instance_locator("Locator", "Root", "Leaf", log))
        .resource("Leaf", Some(Method::GET), "/leaf", terminal("R2", "Leaf", Method::GET, log))
}
