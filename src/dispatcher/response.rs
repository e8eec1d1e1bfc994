use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names are `Arc<str>` since the same few names repeat on every
/// response; values stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Response written when a request terminates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderVec,
    /// `Null` means no body
    pub body: Value,
}

fn serialize_headers<S: serde::Serializer>(headers: &HeaderVec, s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(headers.iter().map(|(k, v)| (k.as_ref(), v.as_str())))
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a content-type header
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_owned()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// `{"error": message}` body
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Bare status, no headers or body
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::status(204)
    }

    /// `200` answering `OPTIONS` with an `Allow` header listing `methods`
    /// plus `OPTIONS` and `HEAD`.
    #[must_use]
    pub fn options(methods: &[Method]) -> Self {
        let mut allow: Vec<&str> = methods.iter().map(Method::as_str).collect();
        for extra in ["OPTIONS", "HEAD"] {
            if !allow.contains(&extra) {
                allow.push(extra);
            }
        }
        let mut resp = Self::status(200);
        resp.set_header("allow", allow.join(", "));
        resp
    }

    /// Methods listed in the `Allow` header
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<&str> {
        self.get_header("allow")
            .map(|v| v.split(',').map(str::trim).filter(|m| !m.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Header lookup, case-insensitive
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Serialize as `{status, headers, body}` for CLI output
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_allow_header() {
        let resp = Response::options(&[Method::GET, Method::HEAD]);
        assert_eq!(resp.status, 200);
        let allow = resp.allowed_methods();
        assert_eq!(allow.len(), 3);
        for m in ["GET", "HEAD", "OPTIONS"] {
            assert!(allow.contains(&m), "missing {m}");
        }
    }

    #[test]
    fn test_set_header_replaces() {
        let mut resp = Response::json(200, Value::Null);
        resp.set_header("Content-Type", "text/plain".to_owned());
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.get_header("content-type"), Some("text/plain"));
    }
}
