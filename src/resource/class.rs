use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::bean::Instance;

/// Interned class identity.
///
/// Cloning is an `Arc` bump; equality and hashing use the class name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(Arc<str>);

impl ClassId {
    /// Name of the implicit root of every class hierarchy.
    pub const OBJECT: &'static str = "Object";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The implicit root class. Never carries resources.
    #[must_use]
    pub fn object() -> Self {
        Self::new(Self::OBJECT)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        &*self.0 == Self::OBJECT
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// No-argument constructor used when the instantiator yields no bean.
pub type Constructor = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Static description of a class: its place in the type graph and how to
/// build one without the bean container.
#[derive(Clone)]
pub struct ClassInfo {
    pub id: ClassId,
    /// `None` means the class extends `Object` directly
    pub superclass: Option<ClassId>,
    /// Directly implemented interfaces, in declaration order
    pub interfaces: Vec<ClassId>,
    pub constructor: Option<Constructor>,
}

impl ClassInfo {
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: id.into(),
            superclass: None,
            interfaces: Vec::new(),
            constructor: None,
        }
    }

    #[must_use]
    pub fn extends(mut self, superclass: impl Into<ClassId>) -> Self {
        let superclass = superclass.into();
        self.superclass = (!superclass.is_object()).then_some(superclass);
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: impl Into<ClassId>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    #[must_use]
    pub fn with_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("id", &self.id)
            .field("superclass", &self.superclass)
            .field("interfaces", &self.interfaces)
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

/// Registry of every class known to a deployment.
///
/// Populated at build time and read-only afterwards; the locator table walks
/// it instead of reflecting over runtime types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: HashMap<ClassId, ClassInfo>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a class description.
    pub fn register(&mut self, info: ClassInfo) {
        self.classes.insert(info.id.clone(), info);
    }

    #[must_use]
    pub fn get(&self, class: &ClassId) -> Option<&ClassInfo> {
        self.classes.get(class)
    }

    #[must_use]
    pub fn contains(&self, class: &ClassId) -> bool {
        self.classes.contains_key(class)
    }

    #[must_use]
    pub fn superclass_of(&self, class: &ClassId) -> Option<&ClassId> {
        self.classes.get(class).and_then(|c| c.superclass.as_ref())
    }

    #[must_use]
    pub fn interfaces_of(&self, class: &ClassId) -> &[ClassId] {
        self.classes
            .get(class)
            .map(|c| c.interfaces.as_slice())
            .unwrap_or(&[])
    }

    /// Run the class's no-argument constructor, if it has one.
    #[must_use]
    pub fn construct(&self, class: &ClassId) -> Option<Instance> {
        self.classes
            .get(class)
            .and_then(|c| c.constructor.as_ref())
            .map(|ctor| ctor())
    }

    /// A class whose superclass chain leads back to itself, if any.
    ///
    /// Classes are checked in name order so the reported class is stable.
    #[must_use]
    pub fn superclass_cycle(&self) -> Option<ClassId> {
        let mut ids: Vec<&ClassId> = self.classes.keys().collect();
        ids.sort();
        for start in ids {
            let mut chain = HashSet::new();
            let mut current = Some(start);
            while let Some(class) = current {
                if !chain.insert(class) {
                    return Some(class.clone());
                }
                current = self.superclass_of(class);
            }
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }
}
