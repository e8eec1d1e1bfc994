use std::path::Path;

use anyhow::Context;

use super::types::Descriptor;

/// Encoding of a descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Yaml,
    Json,
}

impl DescriptorFormat {
    /// `.json` is JSON; anything else is read as YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DescriptorFormat::Json,
            _ => DescriptorFormat::Yaml,
        }
    }
}

/// Parse descriptor text.
pub fn descriptor_from_str(text: &str, format: DescriptorFormat) -> anyhow::Result<Descriptor> {
    let descriptor = match format {
        DescriptorFormat::Yaml => {
            serde_yaml::from_str(text).context("failed to parse YAML descriptor")?
        }
        DescriptorFormat::Json => {
            serde_json::from_str(text).context("failed to parse JSON descriptor")?
        }
    };
    Ok(descriptor)
}

/// Read and parse a descriptor file; the format follows the extension.
pub fn load_descriptor(path: impl AsRef<Path>) -> anyhow::Result<Descriptor> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    descriptor_from_str(&text, DescriptorFormat::from_path(path))
        .with_context(|| format!("invalid descriptor {}", path.display()))
}
