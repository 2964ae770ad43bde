//! Tests for the schema validation call-out
//!
//! # Test Coverage
//!
//! - Valid bodies reach the handler untouched
//! - Invalid bodies stop before `pre_handler` with a problem-details 422
//! - The failure status is configurable (422 → 400)
//! - `on_error` hooks transform validation envelopes
//! - Field-level error entries carry keyword, location, and input

use camshaft::context::RawRequest;
use camshaft::hooks::{request_hook, response_hook};
use camshaft::invoke::{HandlerCall, HandlerReturn};
use camshaft::response::ResponseEnvelope;
use camshaft::route::{RouteDescriptor, RouteMatch};
use camshaft::runtime_config::RuntimeConfig;
use camshaft::App;
use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod tracing_util;
use tracing_util::TestTracing;

fn pet_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 2},
            "age": {"type": "integer", "minimum": 0}
        }
    })
}

fn post(path: &str, body: Value) -> RawRequest {
    RawRequest {
        method: Method::POST,
        path: path.to_string(),
        body: Some(body),
        ..RawRequest::default()
    }
}

struct ValidatedApp {
    engine: camshaft::Engine,
    route: Arc<RouteDescriptor>,
    handler_runs: Arc<AtomicUsize>,
    pre_handler_runs: Arc<AtomicUsize>,
}

fn build(config: RuntimeConfig) -> ValidatedApp {
    let handler_runs = Arc::new(AtomicUsize::new(0));
    let pre_handler_runs = Arc::new(AtomicUsize::new(0));
    let mut app = App::with_config(config);

    let runs = Arc::clone(&pre_handler_runs);
    app.pre_handler(request_hook("count", move |_ctx| {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }));

    let route = app.route(
        RouteDescriptor::new(Method::POST, "/pets", "add_pet").with_request_schema(pet_schema()),
    );
    let runs = Arc::clone(&handler_runs);
    unsafe {
        app.register_handler("add_pet", move |call: HandlerCall| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerReturn::Json(json!({
                "created": call.body.unwrap_or(Value::Null)
            })))
        });
    }

    ValidatedApp {
        engine: unsafe { app.finalize() },
        route,
        handler_runs,
        pre_handler_runs,
    }
}

fn dispatch(app: &ValidatedApp, body: Value) -> ResponseEnvelope {
    app.engine
        .dispatch(
            post("/pets", body),
            RouteMatch::new(Arc::clone(&app.route), Default::default()),
        )
        .expect("not cancelled")
}

#[test]
fn valid_body_reaches_the_handler() {
    let _tracing = TestTracing::init();
    let app = build(RuntimeConfig::default());
    let resp = dispatch(&app, json!({"name": "Fluffy", "age": 3}));
    assert_eq!(resp.status, 200);
    assert_eq!(app.handler_runs.load(Ordering::SeqCst), 1);
    assert_eq!(app.pre_handler_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_body_stops_before_pre_handler() {
    let _tracing = TestTracing::init();
    let app = build(RuntimeConfig::default());
    let resp = dispatch(&app, json!({"age": -1}));

    assert_eq!(resp.status, 422);
    assert_eq!(resp.header("content-type"), Some("application/problem+json"));
    assert_eq!(app.handler_runs.load(Ordering::SeqCst), 0);
    assert_eq!(app.pre_handler_runs.load(Ordering::SeqCst), 0);

    let body = resp.body.as_json().expect("problem body");
    assert_eq!(body["status"], json!(422));
    assert_eq!(body["title"], json!("Validation Failed"));
    assert!(body["type"].as_str().unwrap_or("").starts_with("https://"));
    let errors = body["errors"].as_array().expect("error entries");
    assert!(!errors.is_empty());
}

#[test]
fn field_entries_carry_keyword_location_and_input() {
    let _tracing = TestTracing::init();
    let app = build(RuntimeConfig::default());
    let resp = dispatch(&app, json!({"name": "x"}));

    let body = resp.body.as_json().expect("problem body");
    let errors = body["errors"].as_array().expect("error entries");
    let entry = &errors[0];
    assert_eq!(entry["type"], json!("minLength"));
    assert_eq!(entry["loc"], json!(["body", "name"]));
    assert_eq!(entry["input"], json!("x"));
    assert!(entry["msg"].as_str().is_some());
}

#[test]
fn validation_status_is_configurable() {
    let _tracing = TestTracing::init();
    let mut config = RuntimeConfig::default();
    config.validation_status = 400;
    let app = build(config);
    let resp = dispatch(&app, json!({}));
    assert_eq!(resp.status, 400);
    let body = resp.body.as_json().expect("problem body");
    assert_eq!(body["status"], json!(400));
}

#[test]
fn on_error_hooks_see_validation_envelopes() {
    let _tracing = TestTracing::init();
    let mut app = App::with_config(RuntimeConfig::default());
    app.on_error(response_hook("brand", |_ctx, mut resp| {
        resp.set_header("x-error-source", "validation-suite");
        Ok(resp)
    }));
    let route = app.route(
        RouteDescriptor::new(Method::POST, "/pets", "add_pet").with_request_schema(pet_schema()),
    );
    unsafe {
        app.register_handler("add_pet", |_call: HandlerCall| Ok(HandlerReturn::Empty));
    }
    let engine = unsafe { app.finalize() };

    let resp = engine
        .dispatch(
            post("/pets", json!({})),
            RouteMatch::new(Arc::clone(&route), Default::default()),
        )
        .expect("not cancelled");
    assert_eq!(resp.status, 422);
    assert_eq!(resp.header("x-error-source"), Some("validation-suite"));
}

#[test]
fn missing_body_is_validated_as_null() {
    let _tracing = TestTracing::init();
    let app = build(RuntimeConfig::default());
    let resp = app
        .engine
        .dispatch(
            RawRequest {
                method: Method::POST,
                path: "/pets".to_string(),
                ..RawRequest::default()
            },
            RouteMatch::new(Arc::clone(&app.route), Default::default()),
        )
        .expect("not cancelled");
    // The schema requires an object, so an absent body fails validation.
    assert_eq!(resp.status, 422);
    assert_eq!(app.handler_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn routes_without_schema_skip_the_call_out() {
    let _tracing = TestTracing::init();
    let mut app = App::with_config(RuntimeConfig::default());
    let route = app.route(RouteDescriptor::new(Method::POST, "/raw", "raw"));
    unsafe {
        app.register_handler("raw", |call: HandlerCall| {
            Ok(HandlerReturn::Json(call.body.unwrap_or(Value::Null)))
        });
    }
    let engine = unsafe { app.finalize() };

    let resp = engine
        .dispatch(
            post("/raw", json!("anything goes")),
            RouteMatch::new(Arc::clone(&route), Default::default()),
        )
        .expect("not cancelled");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body.as_json(), Some(&json!("anything goes")));
}
