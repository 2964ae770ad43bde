//! # Lifecycle Hooks Module
//!
//! Ordered lifecycle hooks for request/response processing.
//!
//! ## Hook Points
//!
//! - `on_request`: first phase, can enrich the context or short-circuit
//! - `pre_validation`: before the schema validation call-out
//! - `pre_handler`: after validation, before the handler (auth/context)
//! - `on_response`: after a successful handler, transform-only
//! - `on_error`: on any failure, transforms the error envelope
//!
//! Hooks within a phase run in registration order. A request-phase hook that
//! returns a response instead of passing the request through short-circuits
//! the pipeline:
//! the response is terminal and no terminal hook phase runs for it (this
//! asymmetry is deliberate; see the orchestrator docs).
//!
//! Registration happens during single-threaded application setup; the
//! registry is immutable once the application is finalized and is shared
//! read-only across concurrent requests. When a phase has no hooks the
//! execution helpers return without iterating.

mod core;

pub use core::{
    request_hook, response_hook, HookError, HookKind, HookPhase, HookRegistry, InvalidHookError,
    RequestHook, ResponseHook,
};
