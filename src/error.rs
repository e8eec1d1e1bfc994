use std::fmt;

use crate::resource::ClassId;

/// Structural failure raised while dispatching a request.
///
/// Protocol outcomes (404, 405, synthesized OPTIONS) are never reported
/// through this type: handlers return them as [`crate::dispatcher::Flow::Respond`].
/// Everything here terminates the request with [`DispatchError::status`].
#[derive(Debug)]
pub enum DispatchError {
    /// A locator method returned a value whose class has no registered or
    /// derivable method map.
    NoResourceFromLocator {
        /// Runtime class of the returned value
        class: ClassId,
    },
    /// The instantiator failed, or a class had neither a bean nor a constructor.
    Instantiation {
        /// Class that was being instantiated
        class: ClassId,
        /// Underlying cause
        source: anyhow::Error,
    },
    /// A resource method returned an error.
    Invocation {
        /// Identifier of the runtime resource
        resource: String,
        /// Underlying cause
        source: anyhow::Error,
    },
    /// The locator chain went deeper than `RuntimeConfig::max_locator_depth`.
    LocatorDepthExceeded {
        /// Configured maximum
        max: usize,
    },
    /// The transport cancelled the request before it completed.
    Cancelled,
}

impl DispatchError {
    /// HTTP status written when this error terminates a request.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::Cancelled => 503,
            _ => 500,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoResourceFromLocator { class } => write!(
                f,
                "Resource locator method returned object that was not a resource: {class}"
            ),
            DispatchError::Instantiation { class, source } => {
                write!(f, "Failed to instantiate {class}: {source:#}")
            }
            DispatchError::Invocation { resource, source } => {
                write!(f, "Resource '{resource}' failed: {source:#}")
            }
            DispatchError::LocatorDepthExceeded { max } => {
                write!(f, "Sub-resource locator chain exceeded {max} hops")
            }
            DispatchError::Cancelled => write!(f, "Request cancelled by transport"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Instantiation { source, .. }
            | DispatchError::Invocation { source, .. } => Some(&**source),
            _ => None,
        }
    }
}
