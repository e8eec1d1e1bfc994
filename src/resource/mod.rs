//! # Resource Module
//!
//! The object model the dispatcher works on.
//!
//! - [`ClassId`] / [`ClassInfo`] / [`TypeRegistry`] describe the class graph
//!   (superclass and interfaces) that locator targets are resolved against.
//! - [`Endpoint`] is implemented by every object that can receive an
//!   invocation; [`Instance`] is the shared handle the context passes around.
//! - [`RuntimeResource`] is an invokable method, terminal or locator, and
//!   [`MethodMap`] groups a class's resources by HTTP method.
//! - [`BeanManager`] acquires per-request bean instances through the
//!   configured [`Instantiator`] and applies request-scoped injection.

mod bean;
mod class;
mod method_map;
mod runtime;

pub use bean::{
    constructor_only_instantiator, BeanInstance, BeanManager, CloseHandle, Endpoint,
    InjectionTarget, Instance, Instantiator, LocatorValue, ProxyUnwrapper,
};
pub use class::{ClassId, ClassInfo, Constructor, TypeRegistry};
pub use method_map::{MethodMap, ResourceMapper};
pub use runtime::{Invoked, Invoker, ResourceKind, RuntimeResource};
