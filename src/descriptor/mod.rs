//! # Descriptor Module
//!
//! Builds a [`crate::deployment::Deployment`] from a YAML or JSON file
//! instead of code, the way routes are otherwise registered by hand.
//!
//! ```yaml
//! roots: [Root]
//! runtime:
//!   max_locator_depth: 8
//! classes:
//!   - name: Root
//!     resources:
//!       - { method: GET, path: /hello, id: hello }
//!       - { path: /sub, locator: Leaf }
//!   - name: Leaf
//!     interfaces: [Named]
//!     resources:
//!       - { method: GET, path: "/leaf/{id}", id: leaf }
//! ```
//!
//! Terminal resources answer through [`crate::echo::EchoInvoker`]; locator
//! resources return their target class, which is built with its default
//! constructor as a [`DescriptorBean`].

mod build;
mod load;
mod types;

pub use build::DescriptorBean;
pub use load::{descriptor_from_str, load_descriptor, DescriptorFormat};
pub use types::{ClassDescriptor, Descriptor, ResourceDescriptor};
