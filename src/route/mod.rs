//! # Route Module
//!
//! Route descriptors and the route table the orchestrator reads.
//!
//! Path matching is not done here — an external router matches the inbound
//! request and hands the orchestrator a [`RouteMatch`] (the descriptor plus
//! the parameters it extracted). The table exists so an application can
//! register its endpoints once at setup and share the descriptors read-only
//! for the process lifetime.

mod core;

pub use core::{RouteDescriptor, RouteMatch, RouteTable};
