//! End-to-end routing through root maps and sub-resource locators.
//!
//! # Test Coverage
//!
//! - Terminal hits, HEAD to GET fallback and OPTIONS synthesis on the root
//! - Locator chains carrying captures across hops
//! - HEAD and OPTIONS fallbacks one hop below a locator
//! - 404 versus 405 depending on whether the null-method mapper was used
//! - Method maps derived from several interfaces

mod common;

use common::{constructible, instance_locator, root_and_leaf, terminal, Log};
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use subrouter::resource::{ClassId, ClassInfo, Endpoint, Instance, Invoked};
use subrouter::{Deployment, Dispatcher, RequestContext, Response, RuntimeResource};

fn dispatcher(log: &Log) -> Dispatcher {
    Dispatcher::new(root_and_leaf(log).build().expect("deployment"))
}

#[test]
fn test_terminal_get_hit() {
    let log = Log::default();
    let outcome = dispatcher(&log).dispatch(Method::GET, "/hello");
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.response.body["resource"], "R");
    assert_eq!(outcome.response.body["remaining"], "");
    assert_eq!(log.entries(), vec!["R"]);
}

#[test]
fn test_head_falls_back_to_get() {
    let log = Log::default();
    let d = Dispatcher::new(
        Deployment::builder()
            .root("Root")
            .class(constructible("Root"))
            .resource("Root", Some(Method::GET), "/hello", terminal("R", "Root", Method::GET, &log))
            .build()
            .expect("deployment"),
    );
    let outcome = d.dispatch(Method::HEAD, "/hello");
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.response.body, Value::Null);
    assert_eq!(log.entries(), vec!["R"]);
}

#[test]
fn test_options_synthesized_from_method_keys() {
    let log = Log::default();
    let d = Dispatcher::new(
        Deployment::builder()
            .root("Root")
            .class(constructible("Root"))
            .resource("Root", Some(Method::GET), "/hello", terminal("R", "Root", Method::GET, &log))
            .build()
            .expect("deployment"),
    );
    let outcome = d.dispatch(Method::OPTIONS, "/hello");
    assert_eq!(outcome.status(), 200);
    let mut allow = outcome.response.allowed_methods();
    allow.sort_unstable();
    assert_eq!(allow, vec!["GET", "HEAD", "OPTIONS"]);
    assert!(log.entries().is_empty());
}

#[test]
fn test_locator_chain_reaches_leaf() {
    let log = Log::default();
    let outcome = dispatcher(&log).dispatch(Method::GET, "/sub/leaf");
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.response.body["resource"], "R2");
    assert_eq!(outcome.response.body["endpoint"], "Leaf");
    assert_eq!(log.entries(), vec!["Locator", "R2"]);
}

#[test]
fn test_options_synthesized_below_locator() {
    let log = Log::default();
    let outcome = dispatcher(&log).dispatch(Method::OPTIONS, "/sub/leaf");
    assert_eq!(outcome.status(), 200);
    let mut allow = outcome.response.allowed_methods();
    allow.sort_unstable();
    assert_eq!(allow, vec!["GET", "HEAD", "OPTIONS"]);
    assert_eq!(log.entries(), vec!["Locator"]);
}

#[test]
fn test_head_falls_back_to_get_below_locator() {
    let log = Log::default();
    let outcome = dispatcher(&log).dispatch(Method::HEAD, "/sub/leaf");
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.response.body, Value::Null);
    assert_eq!(log.entries(), vec!["Locator", "R2"]);
}

#[test]
fn test_head_without_get_below_locator_is_405() {
    let log = Log::default();
    let d = Dispatcher::new(
        Deployment::builder()
            .root("Root")
            .class(constructible("Root"))
            .resource("Root", None, "/sub", instance_locator("Locator", "Root", "Inbox", &log))
            .resource("Inbox", Some(Method::POST), "/", terminal("post", "Inbox", Method::POST, &log))
            .build()
            .expect("deployment"),
    );
    let outcome = d.dispatch(Method::HEAD, "/sub");
    assert_eq!(outcome.status(), 405);
    assert!(outcome.error.is_none());
    assert_eq!(log.entries(), vec!["Locator"]);
}

#[test]
fn test_captures_from_every_hop_in_order() {
    let log = Log::default();
    let d = Dispatcher::new(
        Deployment::builder()
            .root("Users")
            .class(constructible("Users"))
            .resource("Users", None, "/users/{uid}", instance_locator("user", "Users", "User", &log))
            .resource(
                "User",
                Some(Method::GET),
                "/orders/{oid}",
                terminal("order", "User", Method::GET, &log),
            )
            .build()
            .expect("deployment"),
    );
    let outcome = d.dispatch(Method::GET, "/users/42/orders/7");
    assert_eq!(outcome.status(), 200);
    assert_eq!(
        outcome.response.body["params"],
        json!([["uid", "42"], ["oid", "7"]])
    );
}

#[test]
fn test_method_not_allowed_after_null_mapper() {
    let log = Log::default();
    let outcome = dispatcher(&log).dispatch(Method::POST, "/sub/leaf");
    assert_eq!(outcome.status(), 405);
    assert!(outcome.error.is_none());
    assert_eq!(log.entries(), vec!["Locator"]);
}

#[test]
fn test_not_found_when_nothing_matches() {
    let log = Log::default();
    let outcome = dispatcher(&log).dispatch(Method::GET, "/nope");
    assert_eq!(outcome.status(), 404);
    assert!(log.entries().is_empty());
}

#[test]
fn test_unmatched_under_null_mapper_is_405() {
    let log = Log::default();
    // DELETE has no mapper of its own, so the null-method mapper is used.
    let outcome = dispatcher(&log).dispatch(Method::DELETE, "/nope");
    assert_eq!(outcome.status(), 405);
}

#[test]
fn test_multi_interface_merge() {
    let log = Log::default();
    let deployment = Deployment::builder()
        .root("Root")
        .class(constructible("Root"))
        .class(ClassInfo::new("C").implements("I1").implements("I2"))
        .resource("Root", None, "/c", instance_locator("toC", "Root", "C", &log))
        .resource("I1", Some(Method::GET), "/a", terminal("Ra", "I1", Method::GET, &log))
        .resource("I2", Some(Method::GET), "/b", terminal("Rb", "I2", Method::GET, &log))
        .build()
        .expect("deployment");

    let merged = deployment
        .table()
        .find_target(&ClassId::new("C"))
        .expect("derived map");
    assert_eq!(merged.get(&Method::GET).map(|m| m.len()), Some(2));

    let d = Dispatcher::new(deployment);
    assert_eq!(d.dispatch(Method::GET, "/c/a").response.body["resource"], "Ra");
    assert_eq!(d.dispatch(Method::GET, "/c/b").response.body["resource"], "Rb");
}

struct Counter(usize);

impl Endpoint for Counter {
    fn class_id(&self) -> ClassId {
        ClassId::new("Counter")
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn test_endpoint_instance_is_locator_result() {
    let deployment = Deployment::builder()
        .root("Root")
        .class(common::constructible("Root"))
        .resource(
            "Root",
            None,
            "/count/{n}",
            RuntimeResource::locator("count", "Root", |_: &Instance, ctx: &RequestContext| -> anyhow::Result<Invoked> {
                let n = ctx.path_param("n").unwrap_or("0").parse().unwrap_or(0);
                Ok(Invoked::Locator(subrouter::LocatorValue::Instance(
                    Arc::new(Counter(n)) as Instance,
                )))
            }),
        )
        .resource(
            "Counter",
            Some(Method::GET),
            "/",
            RuntimeResource::terminal("show", "Counter", Method::GET, |i: &Instance, _: &RequestContext| -> anyhow::Result<Invoked> {
                let n = i.as_any().downcast_ref::<Counter>().map_or(0, |c| c.0);
                Ok(Invoked::Response(Response::json(200, json!({ "n": n }))))
            }),
        )
        .build()
        .expect("deployment");
    let outcome = Dispatcher::new(deployment).dispatch(Method::GET, "/count/5");
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.response.body["n"], 5);
}
