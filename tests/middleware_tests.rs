//! Middleware hooks around dispatch.

mod common;

use common::{root_and_leaf, Log};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use subrouter::middleware::{Middleware, TracingMiddleware};
use subrouter::{Dispatcher, RequestContext, Response};

/// Records hook order and tags responses.
struct Recorder {
    name: &'static str,
    log: Log,
}

impl Middleware for Recorder {
    fn before(&self, ctx: &RequestContext) -> Option<Response> {
        self.log.push(format!("{} before {}", self.name, ctx.path()));
        None
    }

    fn after(&self, ctx: &RequestContext, res: &mut Response, _latency: Duration) {
        self.log
            .push(format!("{} after {} depth={}", self.name, res.status, ctx.locator_depth()));
        res.set_header("x-seen-by", self.name.to_owned());
    }
}

#[test]
fn test_hooks_run_in_insertion_order() {
    let log = Log::default();
    let mut d = Dispatcher::new(root_and_leaf(&log).build().expect("deployment"));
    d.add_middleware(Arc::new(Recorder {
        name: "a",
        log: log.clone(),
    }));
    d.add_middleware(Arc::new(Recorder {
        name: "b",
        log: log.clone(),
    }));

    let outcome = d.dispatch(Method::GET, "/sub/leaf");
    assert_eq!(outcome.status(), 200);
    assert_eq!(
        log.entries(),
        vec![
            "a before /sub/leaf",
            "b before /sub/leaf",
            "Locator",
            "R2",
            "a after 200 depth=1",
            "b after 200 depth=1",
        ]
    );
    assert_eq!(outcome.response.get_header("x-seen-by"), Some("b"));
}

#[test]
fn test_after_sees_error_responses() {
    let log = Log::default();
    let mut d = Dispatcher::new(root_and_leaf(&log).build().expect("deployment"));
    d.add_middleware(Arc::new(Recorder {
        name: "a",
        log: log.clone(),
    }));
    let outcome = d.dispatch(Method::GET, "/missing");
    assert_eq!(outcome.status(), 404);
    assert_eq!(log.entries().last().map(String::as_str), Some("a after 404 depth=0"));
}

#[test]
fn test_tracing_middleware_closes_spans() {
    let log = Log::default();
    let tracing_mw = Arc::new(TracingMiddleware::new());
    let mut d = Dispatcher::new(root_and_leaf(&log).build().expect("deployment"));
    d.add_middleware(Arc::clone(&tracing_mw) as Arc<dyn Middleware>);

    for path in ["/hello", "/sub/leaf", "/nope"] {
        let _ = d.dispatch(Method::GET, path);
    }
    assert_eq!(tracing_mw.open_spans(), 0);
}
