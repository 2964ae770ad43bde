//! # Orchestrator Module
//!
//! The per-request state machine at the center of the crate.
//!
//! ## Phase sequence
//!
//! ```text
//! Start → OnRequest → PreValidation → (schema validation) → PreHandler
//!       → Resolving → Invoking → OnResponse → Done
//! ```
//!
//! with an `OnError → Done` branch reachable from every phase on failure.
//!
//! ## Short-circuit rules
//!
//! A request-phase hook that returns a response instead of the context
//! terminates the pipeline immediately: remaining hooks in the phase, later
//! phases, dependency resolution, and the handler are all skipped, and the
//! short-circuit response is returned as-is — the `on_response` hooks do
//! **not** run for it (and neither do the `on_error` hooks; a short-circuit
//! is control flow, not a failure). This asymmetry mirrors the upstream
//! engine's observed behavior and is intentional.
//!
//! For requests that get past the hook phases, exactly one terminal hook
//! phase runs: `on_response` after a successful handler, `on_error` for
//! every failure (validation, resolution, handler error, hook failure).
//!
//! ## Error containment
//!
//! No error or panic escapes [`Engine::dispatch`]: hook failures, factory
//! errors, handler errors, and handler panics all become structured error
//! envelopes, and a catch-all boundary converts anything else into a
//! sanitized 500.
//!
//! ## Cancellation
//!
//! The cancel token is checked at every phase boundary. Once it fires the
//! state machine stops advancing, remaining hooks are skipped, and
//! `dispatch` returns `None` — there is no client left to answer. Per-request
//! state is dropped with the context; already-cached singletons stay.

mod core;

pub use core::Engine;
