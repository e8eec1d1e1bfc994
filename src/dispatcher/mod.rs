//! # Dispatcher Module
//!
//! Runs requests through the handler chain of the active deployment.
//!
//! ## Request Flow
//!
//! 1. Middleware `before` hooks run; the first early response aborts the request
//! 2. [`RootRoutingHandler`] matches the full path against the root method map
//!    and restarts at the matched resource
//! 3. The resource chain runs: [`InstanceHandler`] → [`InvocationHandler`]
//!    → `ResourceLocatorHandler` (locator resources only)
//! 4. A locator step matches the remainder against the locator object's
//!    method map and restarts again, as many times as the path requires
//! 5. Exactly one [`Response`] is produced, middleware `after` hooks run,
//!    completion callbacks fire once and a [`DispatchOutcome`] is returned
//!
//! ## Coroutines
//!
//! [`Dispatcher::dispatch`] runs on the caller's thread or coroutine.
//! [`Dispatcher::spawn`] starts a `may` coroutine per request, sized by
//! `RuntimeConfig::stack_size` (`SUBR_STACK_SIZE`), so invokers that block
//! on `may` primitives suspend instead of parking a thread.

mod core;
mod response;

pub use core::{
    DispatchOutcome, Dispatcher, Flow, InstanceHandler, InvocationHandler, PendingDispatch,
    RootRoutingHandler, ServerHandler,
};
pub use response::{HeaderVec, Response, MAX_INLINE_HEADERS};
