//! Deployment assembly.
//!
//! A [`Deployment`] is the immutable runtime view of a set of resource
//! classes: the locator table, the merged root map and the prebuilt handler
//! chains. It is built once by [`DeploymentBuilder`] and swapped as a whole
//! on redeploy.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use http::Method;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dispatcher::{InstanceHandler, InvocationHandler, RootRoutingHandler, ServerHandler};
use crate::locator::{LocatorTable, ResourceLocatorHandler};
use crate::resource::{
    constructor_only_instantiator, BeanInstance, BeanManager, ClassId, ClassInfo, Instance,
    Instantiator, MethodMap, ProxyUnwrapper, ResourceKind, RuntimeResource, TypeRegistry,
};
use crate::router::{PathTemplate, RequestPath};
use crate::runtime_config::RuntimeConfig;

type Chain = Arc<[Arc<dyn ServerHandler>]>;

struct PendingResource {
    class: ClassId,
    method: Option<Method>,
    template: String,
    resource: RuntimeResource,
}

/// Collects classes, resources and collaborators, then builds a [`Deployment`].
#[derive(Default)]
pub struct DeploymentBuilder {
    types: TypeRegistry,
    resources: Vec<PendingResource>,
    roots: Vec<ClassId>,
    instantiator: Option<Instantiator>,
    unwrapper: Option<ProxyUnwrapper>,
    config: RuntimeConfig,
}

impl DeploymentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class description. A later call for the same class wins.
    #[must_use]
    pub fn class(mut self, info: ClassInfo) -> Self {
        self.types.register(info);
        self
    }

    /// Declare `resource` on `class` under `method` (`None` for locators).
    #[must_use]
    pub fn resource(
        mut self,
        class: impl Into<ClassId>,
        method: Option<Method>,
        template: impl Into<String>,
        resource: RuntimeResource,
    ) -> Self {
        self.resources.push(PendingResource {
            class: class.into(),
            method,
            template: template.into(),
            resource,
        });
        self
    }

    /// Mark `class` as a root resource class.
    #[must_use]
    pub fn root(mut self, class: impl Into<ClassId>) -> Self {
        let class = class.into();
        if !self.roots.contains(&class) {
            self.roots.push(class);
        }
        self
    }

    #[must_use]
    pub fn instantiator<F>(mut self, instantiator: F) -> Self
    where
        F: Fn(&ClassId) -> anyhow::Result<BeanInstance> + Send + Sync + 'static,
    {
        self.instantiator = Some(Arc::new(instantiator));
        self
    }

    #[must_use]
    pub fn proxy_unwrapper<F>(mut self, unwrapper: F) -> Self
    where
        F: Fn(&Instance) -> Instance + Send + Sync + 'static,
    {
        self.unwrapper = Some(Arc::new(unwrapper));
        self
    }

    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile every template, publish each class's method map and
    /// assemble the root map and handler chains.
    pub fn build(self) -> anyhow::Result<Deployment> {
        let DeploymentBuilder {
            mut types,
            resources,
            roots,
            instantiator,
            unwrapper,
            config,
        } = self;

        if roots.is_empty() {
            bail!("deployment has no root classes");
        }

        let mut order: Vec<ClassId> = Vec::new();
        let mut paths: HashMap<ClassId, Vec<(Option<Method>, RequestPath<Arc<RuntimeResource>>)>> =
            HashMap::new();
        for pending in resources {
            let PendingResource {
                class,
                method,
                template,
                resource,
            } = pending;
            match (&method, resource.kind) {
                (None, ResourceKind::Terminal) => bail!(
                    "resource '{}' on {class} is terminal but has no HTTP method",
                    resource.id
                ),
                (Some(m), ResourceKind::Locator) => bail!(
                    "resource '{}' on {class} is a locator but declares method {m}",
                    resource.id
                ),
                _ => {}
            }
            let compiled = PathTemplate::compile(&template, resource.is_locator())
                .with_context(|| format!("invalid template for resource '{}' on {class}", resource.id))?;
            if !types.contains(&class) {
                debug!(class = %class, "Registering undeclared resource class");
                types.register(ClassInfo::new(class.clone()));
            }
            if !paths.contains_key(&class) {
                order.push(class.clone());
            }
            paths
                .entry(class)
                .or_default()
                .push((method, RequestPath::new(compiled, Arc::new(resource))));
        }

        if let Some(class) = types.superclass_cycle() {
            bail!("superclass chain of {class} leads back to itself");
        }

        let types = Arc::new(types);
        let table = Arc::new(LocatorTable::new(Arc::clone(&types)));
        for class in &order {
            if let Some(class_paths) = paths.remove(class) {
                table.add_resource(
                    class.clone(),
                    MethodMap::from_paths(class_paths).with_locators_for_every_method(),
                );
            }
        }

        let mut root_maps = Vec::with_capacity(roots.len());
        for root in &roots {
            let map = table
                .registered(root)
                .with_context(|| format!("root class {root} declares no resources"))?;
            root_maps.push(map);
        }
        let root = Arc::new(
            MethodMap::merge(root_maps.iter().map(Arc::as_ref)).with_locators_for_every_method(),
        );

        for class in &order {
            if types.construct(class).is_none() && instantiator.is_none() {
                warn!(
                    class = %class,
                    "Class has no constructor and no instantiator is configured"
                );
            }
        }

        let beans = BeanManager::new(
            instantiator.unwrap_or_else(constructor_only_instantiator),
            unwrapper,
            Arc::clone(&types),
        );
        let instance: Arc<dyn ServerHandler> = Arc::new(InstanceHandler::new(beans.clone()));
        let invocation: Arc<dyn ServerHandler> = Arc::new(InvocationHandler);
        let locator: Arc<dyn ServerHandler> = Arc::new(ResourceLocatorHandler::new(
            Arc::clone(&table),
            beans.clone(),
            config.max_locator_depth,
        ));
        let root_handler: Arc<dyn ServerHandler> = Arc::new(RootRoutingHandler::new(Arc::clone(&root)));

        info!(
            classes = order.len(),
            roots = roots.len(),
            root_methods = ?root.methods(),
            max_locator_depth = config.max_locator_depth,
            "Deployment built"
        );

        Ok(Deployment {
            table,
            types,
            beans,
            roots,
            root,
            config,
            root_chain: Arc::from(vec![root_handler]),
            terminal_chain: Arc::from(vec![Arc::clone(&instance), Arc::clone(&invocation)]),
            locator_chain: Arc::from(vec![instance, invocation, locator]),
        })
    }
}

/// One `(class, method, template)` row of a route dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub class: String,
    /// `None` for null-method locators
    pub method: Option<String>,
    pub template: String,
    pub resource: String,
    pub locator: bool,
    pub root: bool,
}

/// Immutable runtime view of a set of resource classes.
pub struct Deployment {
    table: Arc<LocatorTable>,
    types: Arc<TypeRegistry>,
    beans: BeanManager,
    roots: Vec<ClassId>,
    root: Arc<MethodMap>,
    config: RuntimeConfig,
    root_chain: Chain,
    terminal_chain: Chain,
    locator_chain: Chain,
}

impl Deployment {
    #[must_use]
    pub fn builder() -> DeploymentBuilder {
        DeploymentBuilder::new()
    }

    #[must_use]
    pub fn table(&self) -> &Arc<LocatorTable> {
        &self.table
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    #[must_use]
    pub fn beans(&self) -> &BeanManager {
        &self.beans
    }

    #[must_use]
    pub fn roots(&self) -> &[ClassId] {
        &self.roots
    }

    /// Merged map of every root class
    #[must_use]
    pub fn root_map(&self) -> &Arc<MethodMap> {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The chain a request starts with
    #[must_use]
    pub fn root_chain(&self) -> &[Arc<dyn ServerHandler>] {
        &self.root_chain
    }

    /// Handlers run after a restart at `resource`
    #[must_use]
    pub fn chain_for(&self, resource: &RuntimeResource) -> &[Arc<dyn ServerHandler>] {
        match resource.kind {
            ResourceKind::Terminal => &self.terminal_chain,
            ResourceKind::Locator => &self.locator_chain,
        }
    }

    /// Every registered route, sorted by class, then method, then template.
    #[must_use]
    pub fn dump_routes(&self) -> Vec<RouteEntry> {
        let mut routes = Vec::new();
        for class in self.table.registered_classes() {
            let Some(map) = self.table.registered(&class) else {
                continue;
            };
            let root = self.roots.contains(&class);
            for (method, mapper) in map.entries() {
                for path in mapper.templates() {
                    // Locators are listed once, under the null method.
                    if method.is_some() && path.value.is_locator() {
                        continue;
                    }
                    routes.push(RouteEntry {
                        class: class.name().to_owned(),
                        method: method.map(|m| m.as_str().to_owned()),
                        template: path.template.as_str().to_owned(),
                        resource: path.value.id.clone(),
                        locator: path.value.is_locator(),
                        root,
                    });
                }
            }
        }
        routes
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("roots", &self.roots)
            .field("classes", &self.table.registered_classes())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::dispatcher::Response;
    use crate::resource::Invoked;

    fn ok(_: &Instance, _: &RequestContext) -> anyhow::Result<Invoked> {
        Ok(Invoked::Response(Response::no_content()))
    }

    #[test]
    fn test_build_requires_root() {
        let err = DeploymentBuilder::new().build().expect_err("no roots");
        assert!(err.to_string().contains("no root"));
    }

    #[test]
    fn test_build_rejects_bad_template() {
        let err = DeploymentBuilder::new()
            .root("Root")
            .resource(
                "Root",
                Some(Method::GET),
                "/x/{id: [0-9]+}",
                RuntimeResource::terminal("x", "Root", Method::GET, ok),
            )
            .build()
            .expect_err("regex template");
        assert!(format!("{err:#}").contains("invalid template"));
    }

    #[test]
    fn test_build_rejects_method_kind_mismatch() {
        assert!(DeploymentBuilder::new()
            .root("Root")
            .resource("Root", None, "/x", RuntimeResource::terminal("x", "Root", Method::GET, ok))
            .build()
            .is_err());
    }

    #[test]
    fn test_build_rejects_superclass_cycle() {
        let err = DeploymentBuilder::new()
            .root("Root")
            .class(ClassInfo::new("A").extends("B"))
            .class(ClassInfo::new("B").extends("A"))
            .resource(
                "Root",
                Some(Method::GET),
                "/x",
                RuntimeResource::terminal("x", "Root", Method::GET, ok),
            )
            .build()
            .expect_err("cyclic superclasses");
        assert!(err.to_string().contains("leads back to itself"));
    }

    #[test]
    fn test_root_map_carries_locators_for_every_method() {
        let deployment = DeploymentBuilder::new()
            .root("Root")
            .resource(
                "Root",
                Some(Method::GET),
                "/hello",
                RuntimeResource::terminal("hello", "Root", Method::GET, ok),
            )
            .resource("Root", None, "/sub", RuntimeResource::locator("sub", "Root", ok))
            .build()
            .expect("deployment");
        let get = deployment.root_map().get(&Method::GET).expect("GET");
        assert_eq!(get.len(), 2);
        let routes = deployment.dump_routes();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.root));
        assert_eq!(routes[0].method, None);
    }
}
