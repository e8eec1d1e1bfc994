use std::any::Any;
use std::sync::Arc;

use anyhow::{bail, Context};
use http::Method;
use tracing::debug;

use super::types::{ClassDescriptor, Descriptor, ResourceDescriptor};
use crate::context::RequestContext;
use crate::deployment::{Deployment, DeploymentBuilder};
use crate::echo::EchoInvoker;
use crate::resource::{
    ClassId, ClassInfo, Endpoint, Instance, Invoked, Invoker, LocatorValue, RuntimeResource,
};
use crate::runtime_config::RuntimeConfig;

/// Plain object standing in for an instance of a descriptor class.
#[derive(Debug, Clone)]
pub struct DescriptorBean {
    class: ClassId,
}

impl DescriptorBean {
    pub fn new(class: impl Into<ClassId>) -> Self {
        Self {
            class: class.into(),
        }
    }
}

impl Endpoint for DescriptorBean {
    fn class_id(&self) -> ClassId {
        self.class.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Locator method that returns a class for the bean container to build.
#[derive(Debug, Clone)]
struct ClassLocator {
    target: ClassId,
}

impl Invoker for ClassLocator {
    fn invoke(&self, _instance: &Instance, _ctx: &RequestContext) -> anyhow::Result<Invoked> {
        Ok(Invoked::Locator(LocatorValue::Class(self.target.clone())))
    }
}

impl Descriptor {
    /// Build a deployment; the `runtime` section, when present, replaces `config`.
    pub fn into_deployment(self, config: RuntimeConfig) -> anyhow::Result<Deployment> {
        let mut builder = DeploymentBuilder::new().config(self.runtime.unwrap_or(config));
        for root in &self.roots {
            builder = builder.root(root.as_str());
        }

        // Referenced but undeclared classes still need a place in the type graph.
        let declared: Vec<&str> = self.classes.iter().map(|c| c.name.as_str()).collect();
        let mut implicit: Vec<&str> = Vec::new();
        for class in &self.classes {
            let referenced = class
                .extends
                .iter()
                .chain(class.interfaces.iter())
                .chain(class.resources.iter().filter_map(|r| r.locator.as_ref()));
            for name in referenced {
                if !declared.contains(&name.as_str()) && !implicit.contains(&name.as_str()) {
                    implicit.push(name.as_str());
                }
            }
        }
        for name in implicit {
            builder = builder.class(ClassInfo::new(name));
        }

        for class in &self.classes {
            builder = builder.class(class_info(class));
            for resource in &class.resources {
                let (method, runtime) = runtime_resource(&class.name, resource)
                    .with_context(|| format!("class {}", class.name))?;
                builder = builder.resource(class.name.as_str(), method, resource.path.clone(), runtime);
            }
        }
        debug!(
            classes = self.classes.len(),
            roots = self.roots.len(),
            "Descriptor assembled"
        );
        builder.build()
    }
}

fn class_info(class: &ClassDescriptor) -> ClassInfo {
    let mut info = ClassInfo::new(class.name.as_str());
    if let Some(superclass) = &class.extends {
        info = info.extends(superclass.as_str());
    }
    for iface in &class.interfaces {
        info = info.implements(iface.as_str());
    }
    if class.constructible {
        let id = ClassId::new(&class.name);
        info = info.with_constructor(move || Arc::new(DescriptorBean::new(id.clone())) as Instance);
    }
    info
}

fn runtime_resource(
    class: &str,
    resource: &ResourceDescriptor,
) -> anyhow::Result<(Option<Method>, RuntimeResource)> {
    let method = resource
        .method
        .as_deref()
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid method '{m}'"))
        })
        .transpose()?;
    let id = resource.id.clone().unwrap_or_else(|| match &method {
        Some(m) => format!("{class} {m} {}", resource.path),
        None => format!("{class} {}", resource.path),
    });

    let runtime = match (&resource.locator, &method) {
        (Some(target), None) => RuntimeResource::locator(
            id,
            class,
            ClassLocator {
                target: ClassId::new(target),
            },
        ),
        (Some(_), Some(m)) => bail!("locator '{}' must not declare method {m}", resource.path),
        (None, Some(m)) => {
            let mut echo = EchoInvoker::new(id.clone()).with_status(resource.status.unwrap_or(200));
            if let Some(body) = &resource.body {
                echo = echo.with_body(body.clone());
            }
            RuntimeResource::terminal(id, class, m.clone(), echo)
        }
        (None, None) => bail!(
            "resource '{}' needs either a method or a locator target",
            resource.path
        ),
    };
    let runtime = resource
        .produces
        .iter()
        .fold(runtime, |r, media| r.produces(media.as_str()));
    let runtime = resource
        .consumes
        .iter()
        .fold(runtime, |r, media| r.consumes(media.as_str()));
    Ok((method, runtime))
}
