//! # Dependency Injection Module
//!
//! Named providers resolved per request for handler dependencies.
//!
//! A provider is either an eager value (always a process singleton) or a
//! lazy factory with a `depends_on` list and `singleton`/`cacheable` flags.
//! Resolution is depth-first with explicit cycle detection. Singleton
//! results are cached for the process lifetime behind a write-once gate so a
//! singleton factory runs at most once even under concurrent first use;
//! cacheable non-singleton results live in the request's own cache and die
//! with it.
//!
//! Factories are assumed deterministic; a factory that opens connections or
//! performs other side effects handles its own retries. Factory errors
//! propagate to the orchestrator as resolution failures.

mod core;

pub use core::{
    DependencyDefinition, DependencyError, DependencyRegistry, FactoryFn, ResolvedDependencies,
};
