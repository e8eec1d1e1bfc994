//! # Router Module
//!
//! Path matching for the dispatcher. A [`PathTemplate`] is the compiled form
//! of a URI template such as `/orders/{id}`; a [`RequestMapper`] holds an
//! ordered list of templates bound to values and picks the best one for a
//! path.
//!
//! ## Matching rules
//!
//! 1. A `{name}` capture consumes exactly one path segment; a trailing
//!    `{name: .*}` or `{name: .+}` consumes the rest of the path.
//! 2. Terminal templates must consume the whole path. Locator (prefix)
//!    templates stop on a segment boundary and return the rest as
//!    [`RequestMatch::remaining`].
//! 3. Among all matching templates the longest literal prefix wins; ties go
//!    to the template registered first.
//! 4. Captures are returned positionally and padded with `None` up to the
//!    mapper's largest capture count.
//!
//! ## Example
//!
//! ```rust
//! use subrouter::router::{PathTemplate, RequestMapper, RequestPath};
//!
//! let mapper = RequestMapper::new(vec![
//!     RequestPath::new(PathTemplate::terminal("/users/{id}").unwrap(), "get_user"),
//!     RequestPath::new(PathTemplate::terminal("/users/me").unwrap(), "get_me"),
//! ]);
//!
//! let m = mapper.map("/users/me").unwrap();
//! assert_eq!(m.value, "get_me");
//! assert_eq!(mapper.map("/users/7").unwrap().path_param_values[0].as_deref(), Some("7"));
//! ```

mod core;
mod template;
#[cfg(test)]
mod tests;

pub use core::{
    ParamStrings, ParamValues, ParamVec, RequestMapper, RequestMatch, RequestPath,
    MAX_INLINE_PARAMS,
};
pub use template::{PathTemplate, Segment, TemplateError, TemplateMatch};
