use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::resource::{ClassId, MethodMap, TypeRegistry};

/// Process-wide class to [`MethodMap`] table.
///
/// `registered` holds maps published through [`LocatorTable::add_resource`];
/// `derived` memoizes maps merged from a class's interfaces and superclasses.
/// Reads never lock the whole table. Two threads may derive the same class
/// at once; both compute equal maps and the last insert wins. A derivation
/// that overlaps an [`LocatorTable::add_resource`] call is not memoized.
#[derive(Debug)]
pub struct LocatorTable {
    registered: DashMap<ClassId, Arc<MethodMap>>,
    derived: DashMap<ClassId, Arc<MethodMap>>,
    /// Bumped by every registration
    generation: AtomicU64,
    types: Arc<TypeRegistry>,
}

impl LocatorTable {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            registered: DashMap::new(),
            derived: DashMap::new(),
            generation: AtomicU64::new(0),
            types,
        }
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Publish `map` for `class`. Last write wins.
    ///
    /// Derived entries are dropped, since any of them may have been merged
    /// from a map this call replaces or adds to.
    pub fn add_resource(&self, class: ClassId, map: MethodMap) {
        debug!(class = %class, methods = map.len(), "Locator resource registered");
        self.registered.insert(class, Arc::new(map));
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.derived.clear();
    }

    #[must_use]
    pub fn registered(&self, class: &ClassId) -> Option<Arc<MethodMap>> {
        self.registered.get(class).map(|r| Arc::clone(r.value()))
    }

    #[must_use]
    pub fn is_registered(&self, class: &ClassId) -> bool {
        self.registered.contains_key(class)
    }

    /// Registered classes, sorted by name
    #[must_use]
    pub fn registered_classes(&self) -> Vec<ClassId> {
        let mut classes: Vec<ClassId> = self.registered.iter().map(|r| r.key().clone()).collect();
        classes.sort();
        classes
    }

    /// Number of memoized derived maps
    #[must_use]
    pub fn derived_len(&self) -> usize {
        self.derived.len()
    }

    /// Effective method map of `class`.
    ///
    /// A registered class gets exactly its registered map. Otherwise the
    /// maps of the class's interfaces (transitively) and superclass chain are
    /// merged, memoized and returned. `None` for `Object` and for classes
    /// with nothing to contribute.
    #[must_use]
    pub fn find_target(&self, class: &ClassId) -> Option<Arc<MethodMap>> {
        if class.is_object() {
            return None;
        }
        if let Some(map) = self.registered(class) {
            return Some(map);
        }
        if let Some(map) = self.derived.get(class).map(|r| Arc::clone(r.value())) {
            trace!(class = %class, "Derived method map cache hit");
            return Some(map);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        self.collect(class, &mut found, &mut seen);
        if found.is_empty() {
            debug!(class = %class, "No method map derivable");
            return None;
        }

        let merged = Arc::new(
            MethodMap::merge(found.iter().map(Arc::as_ref)).with_locators_for_every_method(),
        );
        debug!(
            class = %class,
            contributors = found.len(),
            methods = merged.len(),
            "Derived method map"
        );
        self.publish_derived(class, Arc::clone(&merged), generation);
        Some(merged)
    }

    /// Memoize `map` unless a registration happened since `generation` was
    /// read. Returns whether the map stayed in the cache.
    fn publish_derived(&self, class: &ClassId, map: Arc<MethodMap>, generation: u64) -> bool {
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        self.derived.insert(class.clone(), map);
        // A registration may have cleared the cache between the check and
        // the insert.
        if self.generation.load(Ordering::Acquire) != generation {
            self.derived.remove(class);
            return false;
        }
        true
    }

    /// Every class and interface is visited at most once, so cycles in the
    /// type graph end the walk instead of recursing forever.
    fn collect(&self, class: &ClassId, found: &mut Vec<Arc<MethodMap>>, seen: &mut HashSet<ClassId>) {
        if class.is_object() || !seen.insert(class.clone()) {
            return;
        }
        let mut super_required = true;
        if let Some(map) = self.registered(class) {
            found.push(map);
            super_required = false;
        }
        for iface in self.types.interfaces_of(class) {
            if !seen.insert(iface.clone()) {
                continue;
            }
            if let Some(map) = self.registered(iface) {
                found.push(map);
            }
            for parent in self.types.interfaces_of(iface) {
                self.collect(parent, found, seen);
            }
        }
        if super_required {
            if let Some(superclass) = self.types.superclass_of(class) {
                self.collect(superclass, found, seen);
            }
        }
    }
}
