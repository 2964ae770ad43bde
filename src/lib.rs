//! # Camshaft
//!
//! **Camshaft** is a request lifecycle orchestration engine: it drives a
//! single HTTP request through ordered lifecycle hooks, schema validation,
//! dependency resolution, and handler invocation, and hands one canonical
//! response envelope back to the transport.
//!
//! It is deliberately *not* a web framework. The transport (socket I/O,
//! HTTP parsing, TLS) and the router (path matching) live elsewhere and talk
//! to this crate through narrow contracts: the transport supplies a decoded
//! [`context::RawRequest`] and a matched [`route::RouteMatch`], and receives
//! a [`response::ResponseEnvelope`].
//!
//! ## Architecture
//!
//! - **[`route`]** - Route descriptors and the read-only route table
//! - **[`hooks`]** - Ordered lifecycle hooks across five fixed phases
//! - **[`di`]** - Named dependency providers with singleton and per-request
//!   caching
//! - **[`validation`]** - The schema validation seam and its JSON Schema
//!   default engine
//! - **[`orchestrator`]** - The per-request state machine
//! - **[`invoke`]** - Handler traits, coroutine dispatch, and return-value
//!   normalization
//! - **[`background`]** - Bounded fire-and-forget job queue
//! - **[`streaming`]** - Chunk streams and SSE/WebSocket handler base traits
//! - **[`context`]** - Per-request context and cancellation
//! - **[`runtime_config`]** - Environment-driven runtime configuration
//!
//! ## Request flow
//!
//! ```text
//! transport ─▶ on_request ─▶ pre_validation ─▶ schema validation
//!           ─▶ pre_handler ─▶ resolve dependencies ─▶ handler
//!           ─▶ on_response ──────────────────────────▶ transport
//!                       ╰─ any failure ─▶ on_error ──▶ transport
//! ```
//!
//! Hooks in a phase run in registration order. A request-phase hook may
//! short-circuit with a response; that response is terminal and skips the
//! handler and both terminal hook phases. Every failure — hook error,
//! validation failure, dependency resolution error, handler error or panic —
//! is converted to a structured envelope and transformed by the `on_error`
//! hooks; nothing escapes the orchestrator uncaught.
//!
//! ## Quick start
//!
//! ```no_run
//! use camshaft::app::App;
//! use camshaft::context::RawRequest;
//! use camshaft::invoke::HandlerReturn;
//! use camshaft::route::{RouteDescriptor, RouteMatch};
//! use http::Method;
//!
//! let mut app = App::new();
//! let route = app.route(RouteDescriptor::new(Method::GET, "/pets/{id}", "get_pet"));
//! unsafe {
//!     app.register_handler("get_pet", |call: camshaft::invoke::HandlerCall| {
//!         let id = call.path_param("id").unwrap_or("unknown").to_string();
//!         Ok(HandlerReturn::Json(serde_json::json!({ "id": id })))
//!     });
//! }
//! let engine = unsafe { app.finalize() };
//!
//! // Per request, the external router supplies the match:
//! let raw = RawRequest { method: Method::GET, path: "/pets/42".into(), ..Default::default() };
//! let matched = RouteMatch::new(route, smallvec::smallvec![("id".into(), "42".into())]);
//! let response = engine.dispatch(raw, matched);
//! ```
//!
//! ## Runtime considerations
//!
//! Camshaft uses the `may` coroutine runtime, not tokio or async-std:
//!
//! - Handlers and background jobs run in coroutines (lightweight threads)
//! - A hook, factory, or handler that blocks inside a coroutine yields to
//!   the scheduler; the orchestrator advances only when the work completes
//! - Stack size is configurable via `CAMSHAFT_STACK_SIZE`
//! - Within one request every phase and hook runs strictly sequentially;
//!   concurrent requests are independent except for the read-only registries
//!   and the singleton dependency cache

pub mod app;
pub mod background;
pub mod context;
pub mod di;
pub mod hooks;
pub mod ids;
pub mod invoke;
pub mod orchestrator;
pub mod response;
pub mod route;
pub mod runtime_config;
pub mod sanitize;
pub mod streaming;
pub mod validation;

pub use app::App;
pub use context::{CancelToken, RawRequest, RequestContext};
pub use orchestrator::Engine;
pub use response::{Body, ResponseEnvelope};
pub use route::{RouteDescriptor, RouteMatch, RouteTable};
pub use runtime_config::RuntimeConfig;
