use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use super::runtime::RuntimeResource;
use crate::router::{RequestMapper, RequestPath};

/// Mapper over the runtime resources of one method key.
pub type ResourceMapper = RequestMapper<Arc<RuntimeResource>>;

/// Per-class mapping from HTTP method to a [`ResourceMapper`].
///
/// The `None` key is the null-method mapper: locators that apply to any
/// request method. A missing key means the method is not handled here.
#[derive(Debug, Clone, Default)]
pub struct MethodMap {
    mappers: HashMap<Option<Method>, ResourceMapper>,
}

impl MethodMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `paths` by method key, keeping declaration order within a key.
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = (Option<Method>, RequestPath<Arc<RuntimeResource>>)>,
    {
        let mut grouped: HashMap<Option<Method>, Vec<RequestPath<Arc<RuntimeResource>>>> =
            HashMap::new();
        for (method, path) in paths {
            grouped.entry(method).or_default().push(path);
        }
        Self {
            mappers: grouped
                .into_iter()
                .map(|(method, paths)| (method, RequestMapper::new(paths)))
                .collect(),
        }
    }

    /// Concatenate the templates of every map, per method key, in the order
    /// the maps are given.
    pub fn merge<'a, I>(maps: I) -> Self
    where
        I: IntoIterator<Item = &'a MethodMap>,
    {
        Self::from_paths(maps.into_iter().flat_map(|map| {
            map.mappers.iter().flat_map(|(method, mapper)| {
                mapper
                    .templates()
                    .iter()
                    .cloned()
                    .map(move |path| (method.clone(), path))
            })
        }))
    }

    /// Append the null-method templates to every concrete method's mapper,
    /// so locators stay reachable when a method has its own resources.
    ///
    /// Templates a mapper already carries are not appended twice, so maps
    /// merged from expanded maps can be expanded again.
    #[must_use]
    pub fn with_locators_for_every_method(self) -> Self {
        let Some(locators) = self.mappers.get(&None).cloned() else {
            return self;
        };
        let mappers = self
            .mappers
            .into_iter()
            .map(|(method, mapper)| {
                if method.is_none() {
                    return (method, mapper);
                }
                let mut paths = mapper.templates().to_vec();
                for locator in locators.templates() {
                    if !paths.iter().any(|p| Arc::ptr_eq(&p.value, &locator.value)) {
                        paths.push(locator.clone());
                    }
                }
                (method, RequestMapper::new(paths))
            })
            .collect();
        Self { mappers }
    }

    /// Mapper registered for exactly `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&ResourceMapper> {
        self.mappers.get(&Some(method.clone()))
    }

    #[must_use]
    pub fn null_mapper(&self) -> Option<&ResourceMapper> {
        self.mappers.get(&None)
    }

    /// Every non-null method key, sorted by name.
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.mappers.keys().flatten().cloned().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// Entries sorted with the null key first, then by method name.
    #[must_use]
    pub fn entries(&self) -> Vec<(Option<&Method>, &ResourceMapper)> {
        let mut entries: Vec<_> = self
            .mappers
            .iter()
            .map(|(method, mapper)| (method.as_ref(), mapper))
            .collect();
        entries.sort_by(|a, b| {
            a.0.map(Method::as_str)
                .unwrap_or("")
                .cmp(b.0.map(Method::as_str).unwrap_or(""))
        });
        entries
    }

    /// Sorted `(method, template)` pairs; two maps are equivalent when these
    /// are equal.
    #[must_use]
    pub fn pairs(&self) -> Vec<(Option<Method>, String)> {
        let mut pairs: Vec<_> = self
            .mappers
            .iter()
            .flat_map(|(method, mapper)| {
                mapper
                    .templates()
                    .iter()
                    .map(move |p| (method.clone(), p.template.as_str().to_owned()))
            })
            .collect();
        pairs.sort_by(|a, b| {
            let ka = a.0.as_ref().map(Method::as_str).unwrap_or("");
            let kb = b.0.as_ref().map(Method::as_str).unwrap_or("");
            ka.cmp(kb).then_with(|| a.1.cmp(&b.1))
        });
        pairs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
