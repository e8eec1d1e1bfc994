//! Router core module - hot path for template matching.
//!
//! # Allocation discipline
//!
//! Capture values live in `SmallVec`s sized for the common case so that a
//! match with up to [`MAX_INLINE_PARAMS`] captures does not touch the heap
//! for its parameter storage.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use smallvec::SmallVec;
use std::sync::Arc;
use tracing::trace;

use super::template::PathTemplate;

/// Maximum number of path captures before heap allocation.
/// Most resources have ≤4 captures per hop (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Decoded capture values of a single template, in declaration order.
pub type ParamStrings = SmallVec<[String; MAX_INLINE_PARAMS]>;

/// Positional capture array handed to the request context.
///
/// Always `RequestMapper::max_path_params` long; entries past the matched
/// template's capture count are `None`.
pub type ParamValues = SmallVec<[Option<String>; MAX_INLINE_PARAMS]>;

/// Named captures (`Arc<str>` names come from the compiled templates).
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// A template bound to the value it resolves to.
#[derive(Debug, Clone)]
pub struct RequestPath<T> {
    /// Compiled template (shared between merged mappers)
    pub template: Arc<PathTemplate>,
    /// Terminal resource or locator descriptor
    pub value: T,
}

impl<T> RequestPath<T> {
    pub fn new(template: PathTemplate, value: T) -> Self {
        Self {
            template: Arc::new(template),
            value,
        }
    }
}

/// Best match produced by [`RequestMapper::map`].
#[derive(Debug, Clone)]
pub struct RequestMatch<T> {
    /// Value bound to the winning template
    pub value: T,
    /// Winning template
    pub template: Arc<PathTemplate>,
    /// Positional captures, `None`-padded to the mapper's maximum
    pub path_param_values: ParamValues,
    /// Part of the input consumed by the template
    pub matched: String,
    /// Unconsumed suffix of the input, possibly empty
    pub remaining: String,
}

impl<T> RequestMatch<T> {
    /// Capture names of the winning template
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        self.template.names()
    }

    /// Pair each capture name with its value
    #[must_use]
    pub fn named_params(&self) -> ParamVec {
        self.template
            .names()
            .iter()
            .zip(self.path_param_values.iter())
            .filter_map(|(name, value)| value.as_ref().map(|v| (Arc::clone(name), v.clone())))
            .collect()
    }
}

/// Ordered list of templates with deterministic best-match selection.
///
/// Selection rule: the matching template with the longest literal prefix
/// wins; ties go to the template declared first.
#[derive(Debug, Clone)]
pub struct RequestMapper<T> {
    templates: Vec<RequestPath<T>>,
    max_path_params: usize,
}

impl<T> Default for RequestMapper<T> {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            max_path_params: 0,
        }
    }
}

impl<T: Clone> RequestMapper<T> {
    /// Build a mapper; declaration order is the order of `templates`.
    #[must_use]
    pub fn new(templates: Vec<RequestPath<T>>) -> Self {
        let max_path_params = templates
            .iter()
            .map(|t| t.template.capture_count())
            .max()
            .unwrap_or(0);
        Self {
            templates,
            max_path_params,
        }
    }

    #[must_use]
    pub fn templates(&self) -> &[RequestPath<T>] {
        &self.templates
    }

    /// Greatest capture count among the templates
    #[must_use]
    pub fn max_path_params(&self) -> usize {
        self.max_path_params
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Find the best template for `path`, or `None`.
    #[must_use]
    pub fn map(&self, path: &str) -> Option<RequestMatch<T>> {
        let mut best: Option<(usize, super::template::TemplateMatch)> = None;

        for (idx, candidate) in self.templates.iter().enumerate() {
            let literal_len = candidate.template.literal_prefix_len();
            if let Some((best_idx, _)) = &best {
                // Equal length loses to the earlier declaration.
                if literal_len <= self.templates[*best_idx].template.literal_prefix_len() {
                    continue;
                }
            }
            if let Some(m) = candidate.template.match_path(path) {
                best = Some((idx, m));
            }
        }

        let (idx, m) = best?;
        let winner = &self.templates[idx];

        let mut path_param_values = ParamValues::with_capacity(self.max_path_params);
        path_param_values.extend(m.values.into_iter().map(Some));
        path_param_values.resize(self.max_path_params, None);

        let consumed = path.len() - m.remainder.len();
        trace!(
            path = %path,
            template = %winner.template,
            remaining = %m.remainder,
            "Template matched"
        );

        Some(RequestMatch {
            value: winner.value.clone(),
            template: Arc::clone(&winner.template),
            path_param_values,
            matched: path[..consumed].to_owned(),
            remaining: m.remainder,
        })
    }
}
