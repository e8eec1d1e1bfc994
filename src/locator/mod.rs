//! # Locator Module
//!
//! Sub-resource locators: methods whose return value, rather than a
//! response, decides which object handles the rest of the path.
//!
//! [`LocatorTable`] maps classes to their method maps and derives maps for
//! classes that only inherit resources from interfaces or superclasses.
//! [`ResourceLocatorHandler`] consumes the locator value a previous step left
//! in the request context and restarts dispatch on the matched resource.

mod handler;
mod table;

pub(crate) use handler::advance;
pub use handler::{LocatorStep, ResourceLocatorHandler};
pub use table::LocatorTable;
