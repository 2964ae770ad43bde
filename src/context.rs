//! Per-request state: the [`RequestContext`] owned by the orchestrator for
//! the duration of one dispatch, plus the stack-allocated parameter and
//! header storage shared across the request-side types.

use crate::ids::{RequestId, REQUEST_ID_HEADER};
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Maximum path/query parameters before heap allocation.
/// Most REST routes carry ≤4 path params.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers/cookies before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated parameter storage.
///
/// Names use `Arc<str>` because they come from the static route pattern and
/// are cloned per request; values are per-request strings.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Stack-allocated header/cookie storage; same `Arc<str>` name sharing as
/// [`ParamVec`].
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Cancellation signal shared between the external transport and the
/// orchestrator.
///
/// The transport calls [`CancelToken::cancel`] on client disconnect; the
/// orchestrator checks the token at every phase boundary and stops advancing
/// the state machine once it fires.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The raw request handed over by the external transport: method, path,
/// headers, cookies, query string pairs, and the already-read body.
///
/// The transport has done all wire-level work (header parsing, body reads,
/// decompression); this type is plain data.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub query_params: ParamVec,
    pub body: Option<Value>,
}

/// Per-request context threaded through the lifecycle phases.
///
/// Created fresh for every dispatch and owned exclusively by the orchestrator
/// (hooks receive it by value and hand it back). Carries the raw request
/// data, a mutable extension map for hook-attached metadata, and the
/// per-request dependency cache. Discarded when the dispatch completes.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub body: Option<Value>,
    extensions: HashMap<String, Value>,
    /// Values produced by cacheable non-singleton factories this request.
    pub(crate) dependency_cache: HashMap<String, Value>,
    cancel: CancelToken,
}

impl RequestContext {
    /// Build a context from transport data plus the path parameters the
    /// external router extracted. The request id is adopted from the
    /// `x-request-id` header when present and valid.
    #[must_use]
    pub fn from_raw(raw: RawRequest, path_params: ParamVec, cancel: CancelToken) -> Self {
        let request_id = RequestId::from_header_or_new(
            raw.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(REQUEST_ID_HEADER))
                .map(|(_, v)| v.as_str()),
        );
        Self {
            request_id,
            method: raw.method,
            path: raw.path,
            path_params,
            query_params: raw.query_params,
            headers: raw.headers,
            cookies: raw.cookies,
            body: raw.body,
            extensions: HashMap::new(),
            dependency_cache: HashMap::new(),
            cancel,
        }
    }

    /// Minimal context for tests and embedding.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self::from_raw(
            RawRequest {
                method,
                path: path.into(),
                ..RawRequest::default()
            },
            ParamVec::new(),
            CancelToken::new(),
        )
    }

    /// Get a path parameter by name.
    ///
    /// Last write wins: with duplicate names at different path depths the
    /// deepest occurrence is returned.
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last write wins for duplicates).
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name.
    #[inline]
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attach hook metadata (request id echo, authenticated user, ...) for
    /// later phases and the handler to read.
    pub fn set_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }

    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Snapshot of all extensions, for building the handler call.
    #[must_use]
    pub fn extensions(&self) -> &HashMap<String, Value> {
        &self.extensions
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
