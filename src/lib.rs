//! # subrouter
//!
//! **subrouter** is a coroutine-powered request dispatcher for JAX-RS style
//! resource classes: root resources answer some paths directly and delegate
//! the rest to *sub-resource locators*, methods that return another object
//! whose own resources continue matching the remainder of the path.
//!
//! ## Architecture
//!
//! - **[`router`]** - URI templates and the per-method request mapper
//! - **[`resource`]** - Class graph, runtime resources, method maps and beans
//! - **[`locator`]** - Locator table and the handler that follows a locator's result
//! - **[`dispatcher`]** - Handler chains, restarts and the dispatch entry point
//! - **[`context`]** - Per-request state: captures, endpoint, callbacks
//! - **[`deployment`]** - Builds the immutable runtime view of a set of classes
//! - **[`descriptor`]** - YAML/JSON descriptors as an alternative to code
//! - **[`middleware`]** - Before/after hooks around a dispatch
//! - **[`hot_reload`]** - Redeploy when a descriptor file changes
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`runtime_config`]** - Environment-driven runtime limits
//!
//! ## Request Flow
//!
//! ```text
//! GET /users/42/orders/7
//!   root chain:    RootRoutingHandler   matches /users/{id}       (locator)
//!   locator chain: Instance -> Invocation -> ResourceLocator
//!                  Users#user(42) returns User; User's map matches /orders/{oid}
//!   terminal chain: Instance -> Invocation -> 200
//! ```
//!
//! Each hop saves the previous hop's captures, so every `{id}` seen on the
//! way stays readable from the final resource.
//!
//! ## Example
//!
//! ```rust,ignore
//! use subrouter::{Deployment, Dispatcher, RuntimeResource};
//! use http::Method;
//!
//! let deployment = Deployment::builder()
//!     .root("Users")
//!     .resource("Users", None, "/users/{id}", RuntimeResource::locator("user", "Users", find_user))
//!     .resource("User", Some(Method::GET), "/", RuntimeResource::terminal("show", "User", Method::GET, show))
//!     .build()?;
//! let outcome = Dispatcher::new(deployment).dispatch(Method::GET, "/users/42");
//! ```

pub mod cli;
pub mod context;
pub mod deployment;
pub mod descriptor;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod hot_reload;
pub mod locator;
pub mod logging;
pub mod middleware;
pub mod resource;
pub mod router;
pub mod runtime_config;

pub use context::{CancelHandle, RequestContext, RequestId};
pub use deployment::{Deployment, DeploymentBuilder, RouteEntry};
pub use descriptor::{load_descriptor, Descriptor};
pub use dispatcher::{DispatchOutcome, Dispatcher, Response};
pub use error::DispatchError;
pub use resource::{
    BeanInstance, ClassId, ClassInfo, Endpoint, InjectionTarget, Instance, Invoked, LocatorValue,
    RuntimeResource,
};
pub use runtime_config::RuntimeConfig;
