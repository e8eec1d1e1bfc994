use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use super::class::{ClassId, TypeRegistry};
use crate::context::RequestContext;
use crate::error::DispatchError;

/// An object that can receive resource invocations or act as a locator.
///
/// Implementors report their runtime class so the locator table can find
/// the matching method map without reflection.
pub trait Endpoint: Any + Send + Sync {
    /// Runtime class of this object
    fn class_id(&self) -> ClassId;

    /// Downcast support for invokers that need the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Request-scoped injection capability, if this object advertises one
    fn injection_target(&self) -> Option<&dyn InjectionTarget> {
        None
    }
}

/// Shared handle to a live endpoint object.
pub type Instance = Arc<dyn Endpoint>;

/// Request-scoped injection exposed by container-generated subclasses.
pub trait InjectionTarget {
    fn inject(&self, ctx: &RequestContext);
}

/// Value produced by a locator method.
#[derive(Clone)]
pub enum LocatorValue {
    /// A class to be instantiated through the bean container
    Class(ClassId),
    /// An object to delegate to directly
    Instance(Instance),
}

impl LocatorValue {
    /// The class the next method map is looked up for.
    #[must_use]
    pub fn class_id(&self) -> ClassId {
        match self {
            LocatorValue::Class(class) => class.clone(),
            LocatorValue::Instance(instance) => instance.class_id(),
        }
    }
}

impl fmt::Debug for LocatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorValue::Class(class) => write!(f, "Class({class})"),
            LocatorValue::Instance(instance) => write!(f, "Instance({})", instance.class_id()),
        }
    }
}

/// Idempotent close hook of a bean instance.
///
/// Cloning shares the "already closed" flag, so the hook runs at most once
/// no matter how many handles call [`CloseHandle::close`].
#[derive(Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
    hook: Arc<dyn Fn() + Send + Sync>,
}

impl CloseHandle {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            hook: Arc::new(hook),
        }
    }

    /// A hook that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            (self.hook)();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// `{instance, close}` pair returned by an [`Instantiator`].
#[derive(Clone)]
pub struct BeanInstance {
    /// `None` when the container knows no bean for the class
    pub instance: Option<Instance>,
    pub close: CloseHandle,
}

impl BeanInstance {
    pub fn new<F>(instance: Instance, close: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            instance: Some(instance),
            close: CloseHandle::new(close),
        }
    }

    /// An instance with nothing to release.
    #[must_use]
    pub fn unmanaged(instance: Instance) -> Self {
        Self {
            instance: Some(instance),
            close: CloseHandle::noop(),
        }
    }

    /// The container has no bean for the requested class.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            instance: None,
            close: CloseHandle::noop(),
        }
    }
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInstance")
            .field("instance", &self.instance.as_ref().map(|i| i.class_id()))
            .field("close", &self.close)
            .finish()
    }
}

/// Bean container entry point: class to `{instance, close}`.
pub type Instantiator = Arc<dyn Fn(&ClassId) -> anyhow::Result<BeanInstance> + Send + Sync>;

/// Maps a possibly proxied value to its underlying object, or returns it as is.
pub type ProxyUnwrapper = Arc<dyn Fn(&Instance) -> Instance + Send + Sync>;

/// Instantiator that never knows a bean, leaving construction to the
/// registered no-argument constructors.
#[must_use]
pub fn constructor_only_instantiator() -> Instantiator {
    Arc::new(|_: &ClassId| -> anyhow::Result<BeanInstance> { Ok(BeanInstance::empty()) })
}

/// Acquires per-request bean instances and applies request-scoped injection.
#[derive(Clone)]
pub struct BeanManager {
    instantiator: Instantiator,
    unwrapper: Option<ProxyUnwrapper>,
    types: Arc<TypeRegistry>,
}

impl BeanManager {
    pub fn new(
        instantiator: Instantiator,
        unwrapper: Option<ProxyUnwrapper>,
        types: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            instantiator,
            unwrapper,
            types,
        }
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Obtain an instance of `class` owned by `ctx`.
    ///
    /// The close hook is registered as a completion callback before anything
    /// else happens, so the bean is released whatever the request's outcome.
    /// When the container yields no instance the class's no-argument
    /// constructor is used instead.
    pub fn acquire(
        &self,
        class: &ClassId,
        ctx: &mut RequestContext,
    ) -> Result<Instance, DispatchError> {
        let bean = (self.instantiator)(class).map_err(|source| {
            error!(
                request_id = %ctx.request_id(),
                class = %class,
                error = %source,
                "Instantiator failed"
            );
            DispatchError::Instantiation {
                class: class.clone(),
                source,
            }
        })?;

        let close = bean.close.clone();
        ctx.register_completion_callback(move |_| close.close());

        if let Some(instance) = bean.instance {
            debug!(request_id = %ctx.request_id(), class = %class, "Bean acquired");
            return Ok(instance);
        }

        match self.types.construct(class) {
            Some(instance) => {
                debug!(
                    request_id = %ctx.request_id(),
                    class = %class,
                    "No bean registered, used no-arg constructor"
                );
                Ok(instance)
            }
            None => Err(DispatchError::Instantiation {
                class: class.clone(),
                source: anyhow::anyhow!("no bean and no no-argument constructor for {class}"),
            }),
        }
    }

    /// Inject request-scoped state into `instance` if it is a container bean.
    ///
    /// A value is a bean only when unwrapping yields a different object and
    /// that object advertises [`InjectionTarget`]. User-provided instances
    /// are never injected.
    pub fn inject_if_bean(&self, instance: &Instance, ctx: &RequestContext) -> bool {
        let Some(unwrapper) = &self.unwrapper else {
            return false;
        };
        let unwrapped = unwrapper(instance);
        if Arc::ptr_eq(&unwrapped, instance) {
            return false;
        }
        match unwrapped.injection_target() {
            Some(target) => {
                debug!(
                    request_id = %ctx.request_id(),
                    class = %unwrapped.class_id(),
                    "Injecting request scope"
                );
                target.inject(ctx);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for BeanManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanManager")
            .field("unwrapper", &self.unwrapper.is_some())
            .field("classes", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ClassInfo;
    use http::Method;
    use std::sync::atomic::AtomicUsize;

    struct Plain;

    impl Endpoint for Plain {
        fn class_id(&self) -> ClassId {
            ClassId::new("Plain")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_close_handle_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = CloseHandle::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let other = handle.clone();
        handle.close();
        other.close();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(other.is_closed());
    }

    #[test]
    fn test_bean_instance_debug_names_class() {
        let bean = BeanInstance::unmanaged(Arc::new(Plain));
        let text = format!("{bean:?}");
        assert!(text.contains("Plain"));
        assert!(format!("{:?}", BeanInstance::empty()).contains("None"));
    }

    #[test]
    fn test_acquire_falls_back_to_constructor() {
        let mut types = TypeRegistry::new();
        types.register(ClassInfo::new("Plain").with_constructor(|| Arc::new(Plain) as Instance));
        let beans = BeanManager::new(constructor_only_instantiator(), None, Arc::new(types));
        let mut ctx = RequestContext::new(Method::GET, "/");
        let instance = beans
            .acquire(&ClassId::new("Plain"), &mut ctx)
            .expect("constructor fallback");
        assert_eq!(instance.class_id(), ClassId::new("Plain"));
    }

    #[test]
    fn test_acquire_without_constructor_fails() {
        let beans = BeanManager::new(
            constructor_only_instantiator(),
            None,
            Arc::new(TypeRegistry::new()),
        );
        let mut ctx = RequestContext::new(Method::GET, "/");
        let err = beans
            .acquire(&ClassId::new("Missing"), &mut ctx)
            .err()
            .expect("must fail");
        assert!(matches!(err, DispatchError::Instantiation { .. }));
    }

    #[test]
    fn test_no_injection_without_unwrapper() {
        let beans = BeanManager::new(
            constructor_only_instantiator(),
            None,
            Arc::new(TypeRegistry::new()),
        );
        let ctx = RequestContext::new(Method::GET, "/");
        let instance: Instance = Arc::new(Plain);
        assert!(!beans.inject_if_bean(&instance, &ctx));
    }
}
