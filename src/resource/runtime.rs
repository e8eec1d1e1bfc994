use std::fmt;
use std::sync::Arc;

use http::Method;

use super::bean::{Instance, LocatorValue};
use super::class::ClassId;
use crate::context::RequestContext;
use crate::dispatcher::Response;

/// Whether a resource answers the request or hands off to another object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Terminal,
    Locator,
}

/// What a resource method produced.
#[derive(Debug)]
pub enum Invoked {
    /// The request is answered
    Response(Response),
    /// A locator object for the next hop
    Locator(LocatorValue),
}

/// Calls a resource method on a receiver.
pub trait Invoker: Send + Sync {
    fn invoke(&self, instance: &Instance, ctx: &RequestContext) -> anyhow::Result<Invoked>;
}

impl<F> Invoker for F
where
    F: Fn(&Instance, &RequestContext) -> anyhow::Result<Invoked> + Send + Sync,
{
    fn invoke(&self, instance: &Instance, ctx: &RequestContext) -> anyhow::Result<Invoked> {
        self(instance, ctx)
    }
}

/// The unit of dispatch: a method on a bean class plus its media types.
#[derive(Clone)]
pub struct RuntimeResource {
    /// Stable identifier used in logs and route dumps
    pub id: String,
    /// Declaring class, instantiated when no endpoint instance is present
    pub bean: ClassId,
    pub method_name: String,
    /// `None` for sub-resource locators
    pub http_method: Option<Method>,
    pub kind: ResourceKind,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
    pub invoker: Arc<dyn Invoker>,
}

impl RuntimeResource {
    /// A resource method answering `method` requests.
    pub fn terminal<I>(id: impl Into<String>, bean: impl Into<ClassId>, method: Method, invoker: I) -> Self
    where
        I: Invoker + 'static,
    {
        let id = id.into();
        Self {
            method_name: id.clone(),
            id,
            bean: bean.into(),
            http_method: Some(method),
            kind: ResourceKind::Terminal,
            produces: Vec::new(),
            consumes: Vec::new(),
            invoker: Arc::new(invoker),
        }
    }

    /// A sub-resource locator; it answers no method itself.
    pub fn locator<I>(id: impl Into<String>, bean: impl Into<ClassId>, invoker: I) -> Self
    where
        I: Invoker + 'static,
    {
        let id = id.into();
        Self {
            method_name: id.clone(),
            id,
            bean: bean.into(),
            http_method: None,
            kind: ResourceKind::Locator,
            produces: Vec::new(),
            consumes: Vec::new(),
            invoker: Arc::new(invoker),
        }
    }

    #[must_use]
    pub fn with_method_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = name.into();
        self
    }

    #[must_use]
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    #[must_use]
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    #[must_use]
    pub fn is_locator(&self) -> bool {
        self.kind == ResourceKind::Locator
    }
}

impl fmt::Debug for RuntimeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeResource")
            .field("id", &self.id)
            .field("bean", &self.bean)
            .field("method_name", &self.method_name)
            .field("http_method", &self.http_method)
            .field("kind", &self.kind)
            .field("produces", &self.produces)
            .field("consumes", &self.consumes)
            .finish()
    }
}

impl PartialEq for RuntimeResource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.bean == other.bean && self.http_method == other.http_method
    }
}
