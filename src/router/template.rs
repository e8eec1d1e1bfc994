//! Compiled URI templates.
//!
//! A template such as `/users/{id}/files/{path: .*}` is split into literal
//! segments, single-segment captures and an optional trailing catch-all, then
//! compiled into one anchored [`Regex`]. Templates used by sub-resource
//! locators are compiled in *prefix* mode: they only need to consume a
//! leading run of whole segments and hand the rest of the path back as the
//! remainder.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use super::core::ParamStrings;

/// `{name}` or `{name: regex}`
static CAPTURE_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*(?::\s*(.+?)\s*)?\}$")
        .expect("capture segment regex is valid")
});

/// Error raised when a template cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{...}` segment that is not a well formed capture
    InvalidCapture { template: String, segment: String },
    /// A capture with a regex other than the catch-all forms `.*` / `.+`
    UnsupportedRegex { template: String, segment: String },
    /// The same capture name appears twice
    DuplicateCapture { template: String, name: String },
    /// A catch-all capture that is not the final segment
    CatchAllNotLast { template: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::InvalidCapture { template, segment } => {
                write!(f, "invalid capture segment '{segment}' in template '{template}'")
            }
            TemplateError::UnsupportedRegex { template, segment } => write!(
                f,
                "unsupported capture regex in '{segment}' of template '{template}' \
                (only '.*' and '.+' catch-alls are allowed)"
            ),
            TemplateError::DuplicateCapture { template, name } => {
                write!(f, "capture '{name}' declared twice in template '{template}'")
            }
            TemplateError::CatchAllNotLast { template } => {
                write!(f, "catch-all capture must be the last segment of '{template}'")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// One `/`-separated piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matched byte for byte
    Literal(String),
    /// Matches exactly one non-empty path segment
    Capture(Arc<str>),
    /// Matches the rest of the path; `allow_empty` is true for `.*`
    CatchAll { name: Arc<str>, allow_empty: bool },
}

/// Result of matching a single template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    /// Decoded capture values, in declaration order
    pub values: ParamStrings,
    /// Unconsumed suffix of the input, possibly empty
    pub remainder: String,
}

/// Compiled URI template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
    names: Arc<[Arc<str>]>,
    literal_prefix_len: usize,
    prefix: bool,
    regex: Regex,
}

impl PathTemplate {
    /// Compile a template that must consume the whole path.
    pub fn terminal(template: &str) -> Result<Self, TemplateError> {
        Self::compile(template, false)
    }

    /// Compile a locator template that may leave a remainder.
    pub fn prefix(template: &str) -> Result<Self, TemplateError> {
        Self::compile(template, true)
    }

    /// Compile `template`; `prefix` selects locator semantics.
    pub fn compile(template: &str, prefix: bool) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut names: Vec<Arc<str>> = Vec::new();

        let raw: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        for (idx, seg) in raw.iter().enumerate() {
            if !seg.starts_with('{') {
                if seg.contains('{') || seg.contains('}') {
                    return Err(TemplateError::InvalidCapture {
                        template: template.to_string(),
                        segment: (*seg).to_string(),
                    });
                }
                segments.push(Segment::Literal((*seg).to_string()));
                continue;
            }

            let caps = CAPTURE_SEGMENT
                .captures(seg)
                .ok_or_else(|| TemplateError::InvalidCapture {
                    template: template.to_string(),
                    segment: (*seg).to_string(),
                })?;
            let name: Arc<str> = Arc::from(&caps[1]);
            if names.iter().any(|n| *n == name) {
                return Err(TemplateError::DuplicateCapture {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }
            names.push(Arc::clone(&name));

            match caps.get(2).map(|m| m.as_str()) {
                None => segments.push(Segment::Capture(name)),
                Some(re @ (".*" | ".+")) => {
                    if idx + 1 != raw.len() {
                        return Err(TemplateError::CatchAllNotLast {
                            template: template.to_string(),
                        });
                    }
                    segments.push(Segment::CatchAll {
                        name,
                        allow_empty: re == ".*",
                    });
                }
                Some(_) => {
                    return Err(TemplateError::UnsupportedRegex {
                        template: template.to_string(),
                        segment: (*seg).to_string(),
                    })
                }
            }
        }

        let literal_prefix_len = segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .map(|s| match s {
                Segment::Literal(lit) => lit.len() + 1,
                _ => 0,
            })
            .sum();

        let regex = Self::build_regex(&segments, prefix);

        Ok(Self {
            source: template.to_string(),
            segments,
            names: names.into(),
            literal_prefix_len,
            prefix,
            regex,
        })
    }

    fn build_regex(segments: &[Segment], prefix: bool) -> Regex {
        let mut pattern = String::with_capacity(16 * (segments.len() + 1));
        pattern.push('^');
        for seg in segments {
            match seg {
                Segment::Literal(lit) => {
                    pattern.push('/');
                    pattern.push_str(&regex::escape(lit));
                }
                Segment::Capture(_) => pattern.push_str("/([^/]+)"),
                Segment::CatchAll {
                    allow_empty: true, ..
                } => pattern.push_str("(?:/(.*))?"),
                Segment::CatchAll {
                    allow_empty: false, ..
                } => pattern.push_str("/(.+)"),
            }
        }
        if prefix {
            pattern.push_str("(/.*)?$");
        } else {
            pattern.push_str("/?$");
        }
        // Every piece is either escaped or one of the fixed fragments above.
        Regex::new(&pattern).expect("generated template regex is valid")
    }

    /// Match `path` against this template.
    ///
    /// Terminal templates require the whole path (a trailing `/` is tolerated);
    /// prefix templates stop at a segment boundary and return the rest.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<TemplateMatch> {
        let caps = self.regex.captures(path)?;
        let mut values = ParamStrings::new();
        for i in 0..self.names.len() {
            let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
            values.push(decode(raw));
        }
        let remainder = if self.prefix {
            caps.get(self.names.len() + 1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        } else {
            String::new()
        };
        Some(TemplateMatch { values, remainder })
    }

    /// Original template text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Capture names in declaration order
    #[must_use]
    pub fn names(&self) -> &Arc<[Arc<str>]> {
        &self.names
    }

    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.names.len()
    }

    /// Characters of literal text before the first capture, separators included.
    #[must_use]
    pub fn literal_prefix_len(&self) -> usize {
        self.literal_prefix_len
    }

    #[must_use]
    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    /// True when the template consumes nothing (`/` or empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for PathTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.segments == other.segments
    }
}

impl Eq for PathTemplate {}

fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
