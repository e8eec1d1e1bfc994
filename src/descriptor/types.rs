use serde::Deserialize;
use serde_json::Value;

use crate::runtime_config::RuntimeConfig;

/// Declarative deployment: classes, their resources and the root classes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    /// Root resource classes; requests are matched against their merged map
    #[serde(default)]
    pub roots: Vec<String>,
    /// Overrides of the environment-derived runtime configuration
    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDescriptor {
    pub name: String,
    /// Superclass; omitted means `Object`
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    /// Whether a no-argument constructor exists (default true)
    #[serde(default = "default_true")]
    pub constructible: bool,
}

/// One resource method.
///
/// A resource with `locator` is a sub-resource locator returning that class
/// and must not declare a `method`. Any other resource needs a `method`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub method: Option<String>,
    pub path: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub locator: Option<String>,
    /// Fixed status for the echo response (default 200)
    #[serde(default)]
    pub status: Option<u16>,
    /// Fixed body replacing the echo body
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
}

fn default_true() -> bool {
    true
}
