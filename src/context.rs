//! Per-request dispatch state.
//!
//! A [`RequestContext`] is owned by exactly one dispatch loop at a time. It
//! carries the unmatched path, the captures of every hop, the locator result
//! slot, the endpoint instance for the next invocation and the completion
//! callbacks that release per-request beans.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::dispatcher::Response;
use crate::error::DispatchError;
use crate::resource::{Instance, LocatorValue, RuntimeResource};
use crate::router::{ParamValues, ParamVec};

/// Request identifier (ULID) used to correlate log lines of one dispatch.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse an inbound id when it parses, otherwise mint a fresh one.
    #[must_use]
    pub fn from_header_or_new(value: Option<&str>) -> Self {
        value.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(Self)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transport-side handle used to cancel an in-flight request.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Captures of a completed hop, saved before the next hop matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriMatch {
    /// Path consumed up to and including this hop
    pub matched: String,
    pub params: ParamVec,
}

/// Hook fired once when the request terminates; receives the failure cause.
pub type CompletionCallback = Box<dyn FnOnce(Option<&DispatchError>) + Send>;

/// Mutable state of a single request.
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    remaining: String,
    matched: String,
    result: Option<LocatorValue>,
    endpoint: Option<Instance>,
    saved_matches: SmallVec<[UriMatch; 4]>,
    param_names: Arc<[Arc<str>]>,
    path_params: ParamValues,
    callbacks: Vec<CompletionCallback>,
    completed: bool,
    restart: Option<Arc<RuntimeResource>>,
    current: Option<Arc<RuntimeResource>>,
    locator_depth: usize,
    in_locator_chain: bool,
    aborted: Option<Response>,
    cancel: CancelHandle,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            request_id: RequestId::new(),
            method,
            remaining: path.clone(),
            path,
            matched: String::new(),
            result: None,
            endpoint: None,
            saved_matches: SmallVec::new(),
            param_names: Arc::from(Vec::new()),
            path_params: ParamValues::new(),
            callbacks: Vec::new(),
            completed: false,
            restart: None,
            current: None,
            locator_depth: 0,
            in_locator_chain: false,
            aborted: None,
            cancel: CancelHandle::default(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Share an externally owned cancel flag.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request path as received
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn remaining(&self) -> &str {
        &self.remaining
    }

    pub fn set_remaining(&mut self, remaining: impl Into<String>) {
        self.remaining = remaining.into();
    }

    /// Path consumed by every hop so far
    #[must_use]
    pub fn matched_path(&self) -> &str {
        &self.matched
    }

    pub fn push_matched(&mut self, matched: &str) {
        self.matched.push_str(matched);
    }

    #[must_use]
    pub fn result(&self) -> Option<&LocatorValue> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: Option<LocatorValue>) {
        self.result = result;
    }

    pub fn take_result(&mut self) -> Option<LocatorValue> {
        self.result.take()
    }

    #[must_use]
    pub fn endpoint_instance(&self) -> Option<&Instance> {
        self.endpoint.as_ref()
    }

    pub fn set_endpoint_instance(&mut self, instance: Instance) {
        self.endpoint = Some(instance);
    }

    /// Push the current hop's captures onto the saved stack and start a
    /// fresh capture array. Does nothing before the first hop.
    pub fn save_uri_match_state(&mut self) {
        if self.param_names.is_empty() && self.matched.is_empty() {
            return;
        }
        let params = self.current_params();
        self.saved_matches.push(UriMatch {
            matched: self.matched.clone(),
            params,
        });
        self.param_names = Arc::from(Vec::new());
        self.path_params.iter_mut().for_each(|v| *v = None);
    }

    /// Saved hops, outermost first
    #[must_use]
    pub fn saved_matches(&self) -> &[UriMatch] {
        &self.saved_matches
    }

    /// Reserve room for `additional` captures without changing the array length.
    pub fn reserve_path_params(&mut self, additional: usize) {
        self.path_params.reserve(additional);
    }

    /// Grow the capture array to at least `max` slots.
    pub fn set_max_path_params(&mut self, max: usize) {
        if max > self.path_params.len() {
            self.path_params.resize(max, None);
        }
    }

    #[must_use]
    pub fn max_path_params(&self) -> usize {
        self.path_params.len()
    }

    pub fn set_path_param_value(&mut self, index: usize, value: String) {
        if index >= self.path_params.len() {
            self.path_params.resize(index + 1, None);
        }
        self.path_params[index] = Some(value);
    }

    #[must_use]
    pub fn path_param_value(&self, index: usize) -> Option<&str> {
        self.path_params.get(index).and_then(|v| v.as_deref())
    }

    /// Capture names of the current hop, positionally aligned with the values.
    pub fn set_path_param_names(&mut self, names: Arc<[Arc<str>]>) {
        self.param_names = names;
    }

    /// Look a capture up by name: current hop first, then saved hops from
    /// the innermost outwards. The last declaration of a name wins.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        let current = self
            .param_names
            .iter()
            .zip(self.path_params.iter())
            .rfind(|(n, v)| n.as_ref() == name && v.is_some())
            .and_then(|(_, v)| v.as_deref());
        if current.is_some() {
            return current;
        }
        self.saved_matches.iter().rev().find_map(|m| {
            m.params
                .iter()
                .rfind(|(n, _)| n.as_ref() == name)
                .map(|(_, v)| v.as_str())
        })
    }

    /// Every capture of every hop, outermost first.
    #[must_use]
    pub fn all_path_params(&self) -> ParamVec {
        let mut all: ParamVec = self
            .saved_matches
            .iter()
            .flat_map(|m| m.params.iter().cloned())
            .collect();
        all.extend(self.current_params());
        all
    }

    fn current_params(&self) -> ParamVec {
        self.param_names
            .iter()
            .zip(self.path_params.iter())
            .filter_map(|(n, v)| v.as_ref().map(|v| (Arc::clone(n), v.clone())))
            .collect()
    }

    /// Append a completion callback. Fired once, in registration order.
    pub fn register_completion_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(Option<&DispatchError>) + Send + 'static,
    {
        if self.completed {
            // Late registration still runs exactly once.
            callback(None);
            return;
        }
        self.callbacks.push(Box::new(callback));
    }

    #[must_use]
    pub fn completion_callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Fire every completion callback with `cause`. Later calls are no-ops.
    pub fn complete(&mut self, cause: Option<&DispatchError>) {
        if self.completed {
            return;
        }
        self.completed = true;
        let callbacks = std::mem::take(&mut self.callbacks);
        trace!(
            request_id = %self.request_id,
            callbacks = callbacks.len(),
            failed = cause.is_some(),
            "Firing completion callbacks"
        );
        for callback in callbacks {
            callback(cause);
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Schedule dispatch to resume at `target`.
    ///
    /// `is_locator` marks the resumption as a continuation of a locator
    /// chain; it only affects depth bookkeeping.
    pub fn restart(&mut self, target: Arc<RuntimeResource>, is_locator: bool) {
        if is_locator {
            self.locator_depth += 1;
        }
        self.in_locator_chain = is_locator;
        self.restart = Some(target);
    }

    /// Consume a pending restart, making its target the current resource.
    pub fn take_restart(&mut self) -> Option<Arc<RuntimeResource>> {
        let target = self.restart.take()?;
        self.current = Some(Arc::clone(&target));
        Some(target)
    }

    #[must_use]
    pub fn current_resource(&self) -> Option<&Arc<RuntimeResource>> {
        self.current.as_ref()
    }

    /// Number of locator hops taken so far
    #[must_use]
    pub fn locator_depth(&self) -> usize {
        self.locator_depth
    }

    #[must_use]
    pub fn in_locator_chain(&self) -> bool {
        self.in_locator_chain
    }

    /// Short-circuit dispatch with a prepared response.
    pub fn abort_with(&mut self, response: Response) {
        debug!(
            request_id = %self.request_id,
            status = response.status,
            "Request aborted with response"
        );
        self.aborted = Some(response);
    }

    pub fn take_aborted(&mut self) -> Option<Response> {
        self.aborted.take()
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if !self.completed {
            self.complete(Some(&DispatchError::Cancelled));
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("remaining", &self.remaining)
            .field("result", &self.result)
            .field("endpoint", &self.endpoint.as_ref().map(|e| e.class_id()))
            .field("path_params", &self.path_params)
            .field("saved_matches", &self.saved_matches.len())
            .field("callbacks", &self.callbacks.len())
            .field("locator_depth", &self.locator_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_callbacks_fire_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = RequestContext::new(Method::GET, "/a");
        for i in 0..3 {
            let log = Arc::clone(&log);
            ctx.register_completion_callback(move |cause| {
                log.lock().push((i, cause.is_some()));
            });
        }
        ctx.complete(None);
        ctx.complete(Some(&DispatchError::Cancelled));
        drop(ctx);
        assert_eq!(*log.lock(), vec![(0, false), (1, false), (2, false)]);
    }

    #[test]
    fn test_drop_fires_with_cancelled() {
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = Arc::clone(&seen);
            let mut ctx = RequestContext::new(Method::GET, "/a");
            ctx.register_completion_callback(move |cause| {
                *seen.lock() = Some(matches!(cause, Some(DispatchError::Cancelled)));
            });
        }
        assert_eq!(*seen.lock(), Some(true));
    }

    #[test]
    fn test_path_params_across_hops() {
        let mut ctx = RequestContext::new(Method::GET, "/users/7/posts/9");
        ctx.set_max_path_params(1);
        ctx.set_path_param_value(0, "7".into());
        ctx.set_path_param_names(Arc::from(vec![Arc::<str>::from("id")]));
        ctx.push_matched("/users/7");
        ctx.save_uri_match_state();
        ctx.set_max_path_params(1);
        ctx.set_path_param_value(0, "9".into());
        ctx.set_path_param_names(Arc::from(vec![Arc::<str>::from("id")]));
        ctx.push_matched("/posts/9");

        assert_eq!(ctx.path_param("id"), Some("9"));
        let all: Vec<_> = ctx
            .all_path_params()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(
            all,
            vec![("id".to_owned(), "7".to_owned()), ("id".to_owned(), "9".to_owned())]
        );
        assert_eq!(ctx.saved_matches()[0].matched, "/users/7");
        assert_eq!(ctx.matched_path(), "/users/7/posts/9");
    }

    #[test]
    fn test_save_before_first_hop_is_noop() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.save_uri_match_state();
        assert!(ctx.saved_matches().is_empty());
    }

    #[test]
    fn test_request_id_round_trip_through_header() {
        let id = RequestId::new();
        let text = id.to_string();
        assert_eq!(RequestId::from_header_or_new(Some(text.as_str())), id);
        assert_ne!(RequestId::from_header_or_new(Some("not-a-ulid")), id);
    }
}
