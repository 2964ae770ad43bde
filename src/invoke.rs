//! Handler invocation adapter.
//!
//! Handlers run in dedicated coroutines fed by a channel; the orchestrator
//! sends one [`HandlerCall`] per request and waits on a reply channel. The
//! adapter owns the contract around the call: the handler is invoked exactly
//! once, panics become error replies instead of killing the coroutine, and
//! the returned value is normalized into a [`ResponseEnvelope`] by the
//! orchestrator using the rules in [`normalize_return`].

use crate::context::{HeaderVec, ParamVec};
use crate::di::ResolvedDependencies;
use crate::ids::RequestId;
use crate::response::{Body, ResponseEnvelope};
use crate::runtime_config::RuntimeConfig;
use http::Method;
use may::sync::mpsc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// What a handler hands back on success.
pub enum HandlerReturn {
    /// No body; the configured empty-body status applies.
    Empty,
    /// A bare structured value, serialized as JSON with status 200.
    Json(Value),
    /// An explicit response, used verbatim (defaults filled for unset
    /// fields only).
    Response(ResponseEnvelope),
}

/// What a handler hands back on failure.
#[derive(Debug)]
pub enum HandlerError {
    /// Intentional HTTP error: carried status/body are used verbatim.
    Http { status: u16, body: Value },
    /// Anything else; mapped to a sanitized 500 by the orchestrator.
    Internal(anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn http(status: u16, body: Value) -> Self {
        Self::Http { status, body }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// The call handed to a handler: parsed request data, hook-attached
/// extensions, and the resolved dependency map, all bound per the route's
/// declarations.
#[derive(Debug, Clone)]
pub struct HandlerCall {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub handler_id: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub body: Option<Value>,
    pub extensions: HashMap<String, Value>,
    pub dependencies: ResolvedDependencies,
}

impl HandlerCall {
    /// Get a path parameter by name (last write wins for duplicates).
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

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a resolved dependency by key.
    #[inline]
    #[must_use]
    pub fn dependency(&self, key: &str) -> Option<&Value> {
        self.dependencies.get(key)
    }

    /// Get hook-attached metadata by key.
    #[inline]
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }
}

/// Trait implemented by request handlers.
pub trait Handler: Send + 'static {
    fn handle(&self, call: HandlerCall) -> Result<HandlerReturn, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(HandlerCall) -> Result<HandlerReturn, HandlerError> + Send + 'static,
{
    fn handle(&self, call: HandlerCall) -> Result<HandlerReturn, HandlerError> {
        self(call)
    }
}

pub(crate) struct HandlerJob {
    pub call: HandlerCall,
    pub reply_tx: mpsc::Sender<Result<HandlerReturn, HandlerError>>,
}

/// Channel sender feeding one handler coroutine.
pub(crate) type HandlerSender = mpsc::Sender<HandlerJob>;

/// Spawn a handler coroutine and return the sender used to dispatch to it.
///
/// The coroutine processes calls until its channel closes. Handler panics
/// are caught and converted to error replies so one failing request cannot
/// take the handler down.
///
/// # Safety
///
/// Calls `may::coroutine::Builder::spawn()`, which is unsafe in the `may`
/// runtime. The caller must ensure the coroutine runtime is initialized and
/// that spawning happens during application setup.
pub(crate) unsafe fn spawn_handler<H>(
    handler_id: &str,
    handler: H,
    stack_size: usize,
) -> std::io::Result<HandlerSender>
where
    H: Handler,
{
    let (tx, rx) = mpsc::channel::<HandlerJob>();
    let id = handler_id.to_string();

    // SAFETY: spawn is unsafe per the may runtime contract; the closure owns
    // its captures (Send + 'static) and replies through the job's channel.
    let spawn_result = unsafe {
        may::coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                debug!(handler = %id, stack_size, "handler coroutine started");
                for job in rx.iter() {
                    let HandlerJob { call, reply_tx } = job;
                    let request_id = call.request_id;
                    let handler_id = call.handler_id.clone();

                    info!(
                        request_id = %request_id,
                        handler = %handler_id,
                        "handler execution start"
                    );

                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handler.handle(call)
                    }));

                    let reply = match outcome {
                        Ok(reply) => reply,
                        Err(panic) => {
                            error!(
                                request_id = %request_id,
                                handler = %handler_id,
                                panic = ?panic,
                                "handler panicked"
                            );
                            Err(HandlerError::Internal(anyhow::anyhow!(
                                "handler '{handler_id}' panicked"
                            )))
                        }
                    };
                    let _ = reply_tx.send(reply);
                }
                debug!(handler = %id, "handler coroutine exiting");
            })
    };

    spawn_result.map(|_| tx)
}

/// Normalize a handler's return value into the canonical envelope.
///
/// - no body → empty envelope with the configured empty-body status
/// - bare value → JSON body, status 200
/// - explicit response → verbatim, defaults filled for unset fields only
#[must_use]
pub fn normalize_return(ret: HandlerReturn, config: &RuntimeConfig) -> ResponseEnvelope {
    match ret {
        HandlerReturn::Empty => ResponseEnvelope::new(config.empty_body_status),
        HandlerReturn::Json(value) => ResponseEnvelope::json(200, value),
        HandlerReturn::Response(mut resp) => {
            resp.fill_defaults();
            resp
        }
    }
}
