use crate::context::RequestContext;
use crate::response::ResponseEnvelope;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Failure signalled by a hook.
///
/// A hook failure is not a short-circuit: the orchestrator converts it into
/// the error path (sanitized 500 plus `on_error` hooks).
#[derive(Debug, Error)]
#[error("hook '{hook}' failed: {message}")]
pub struct HookError {
    pub hook: String,
    pub message: String,
}

impl HookError {
    #[must_use]
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Registering a hook of the wrong kind for a phase.
#[derive(Debug, Error)]
#[error("hook '{hook}' has the wrong signature for phase {phase:?}")]
pub struct InvalidHookError {
    pub hook: String,
    pub phase: HookPhase,
}

/// The five fixed lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    OnRequest,
    PreValidation,
    PreHandler,
    OnResponse,
    OnError,
}

/// Hook invoked during a request phase (`on_request`, `pre_validation`,
/// `pre_handler`).
///
/// May enrich the context in place; returning `Some(response)` short-circuits
/// the pipeline with that response as the terminal result.
pub trait RequestHook: Send + Sync {
    /// Hook name for log events and error messages.
    fn name(&self) -> &str {
        "request_hook"
    }

    fn call(&self, ctx: &mut RequestContext) -> Result<Option<ResponseEnvelope>, HookError>;
}

/// Hook invoked during a terminal phase (`on_response`, `on_error`).
/// Transform-only: receives the envelope and must return one.
pub trait ResponseHook: Send + Sync {
    fn name(&self) -> &str {
        "response_hook"
    }

    fn call(
        &self,
        ctx: &RequestContext,
        resp: ResponseEnvelope,
    ) -> Result<ResponseEnvelope, HookError>;
}

/// Either kind of hook, for the phase-generic [`HookRegistry::register`].
pub enum HookKind {
    Request(Arc<dyn RequestHook>),
    Response(Arc<dyn ResponseHook>),
}

struct RequestHookFn<F> {
    name: String,
    func: F,
}

impl<F> RequestHook for RequestHookFn<F>
where
    F: Fn(&mut RequestContext) -> Result<Option<ResponseEnvelope>, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, ctx: &mut RequestContext) -> Result<Option<ResponseEnvelope>, HookError> {
        (self.func)(ctx)
    }
}

struct ResponseHookFn<F> {
    name: String,
    func: F,
}

impl<F> ResponseHook for ResponseHookFn<F>
where
    F: Fn(&RequestContext, ResponseEnvelope) -> Result<ResponseEnvelope, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(
        &self,
        ctx: &RequestContext,
        resp: ResponseEnvelope,
    ) -> Result<ResponseEnvelope, HookError> {
        (self.func)(ctx, resp)
    }
}

/// Create a request-phase hook from a closure.
///
/// ```
/// use camshaft::hooks::request_hook;
///
/// let tag = request_hook("request_id_echo", |ctx| {
///     let id = ctx.request_id.to_string();
///     ctx.set_extension("request_id", serde_json::json!(id));
///     Ok(None)
/// });
/// ```
pub fn request_hook<F>(name: impl Into<String>, func: F) -> Arc<dyn RequestHook>
where
    F: Fn(&mut RequestContext) -> Result<Option<ResponseEnvelope>, HookError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(RequestHookFn {
        name: name.into(),
        func,
    })
}

/// Create a terminal-phase hook from a closure.
///
/// ```
/// use camshaft::hooks::response_hook;
///
/// let security = response_hook("security_headers", |_ctx, mut resp| {
///     resp.set_header("x-frame-options", "DENY");
///     Ok(resp)
/// });
/// ```
pub fn response_hook<F>(name: impl Into<String>, func: F) -> Arc<dyn ResponseHook>
where
    F: Fn(&RequestContext, ResponseEnvelope) -> Result<ResponseEnvelope, HookError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(ResponseHookFn {
        name: name.into(),
        func,
    })
}

/// Container for all registered lifecycle hooks.
///
/// Mutated only during application setup; the finalized application shares it
/// read-only. Execution helpers skip iteration entirely for empty phases, so
/// an application without hooks pays a length check per phase and nothing
/// else.
#[derive(Default)]
pub struct HookRegistry {
    on_request: Vec<Arc<dyn RequestHook>>,
    pre_validation: Vec<Arc<dyn RequestHook>>,
    pre_handler: Vec<Arc<dyn RequestHook>>,
    on_response: Vec<Arc<dyn ResponseHook>>,
    on_error: Vec<Arc<dyn ResponseHook>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_request", &self.on_request.len())
            .field("pre_validation", &self.pre_validation.len())
            .field("pre_handler", &self.pre_handler.len())
            .field("on_response", &self.on_response.len())
            .field("on_error", &self.on_error.len())
            .finish()
    }
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_request.is_empty()
            && self.pre_validation.is_empty()
            && self.pre_handler.is_empty()
            && self.on_response.is_empty()
            && self.on_error.is_empty()
    }

    /// Append a hook to a phase, checking that the hook kind matches the
    /// phase. The typed `add_*` methods cannot fail; this entry point exists
    /// for callers that carry the phase as data.
    pub fn register(&mut self, phase: HookPhase, hook: HookKind) -> Result<(), InvalidHookError> {
        match (phase, hook) {
            (HookPhase::OnRequest, HookKind::Request(h)) => self.on_request.push(h),
            (HookPhase::PreValidation, HookKind::Request(h)) => self.pre_validation.push(h),
            (HookPhase::PreHandler, HookKind::Request(h)) => self.pre_handler.push(h),
            (HookPhase::OnResponse, HookKind::Response(h)) => self.on_response.push(h),
            (HookPhase::OnError, HookKind::Response(h)) => self.on_error.push(h),
            (phase, HookKind::Request(h)) => {
                return Err(InvalidHookError {
                    hook: h.name().to_string(),
                    phase,
                })
            }
            (phase, HookKind::Response(h)) => {
                return Err(InvalidHookError {
                    hook: h.name().to_string(),
                    phase,
                })
            }
        }
        Ok(())
    }

    pub fn add_on_request(&mut self, hook: Arc<dyn RequestHook>) {
        self.on_request.push(hook);
    }

    pub fn add_pre_validation(&mut self, hook: Arc<dyn RequestHook>) {
        self.pre_validation.push(hook);
    }

    pub fn add_pre_handler(&mut self, hook: Arc<dyn RequestHook>) {
        self.pre_handler.push(hook);
    }

    pub fn add_on_response(&mut self, hook: Arc<dyn ResponseHook>) {
        self.on_response.push(hook);
    }

    pub fn add_on_error(&mut self, hook: Arc<dyn ResponseHook>) {
        self.on_error.push(hook);
    }

    fn request_slot(&self, phase: HookPhase) -> &[Arc<dyn RequestHook>] {
        match phase {
            HookPhase::OnRequest => &self.on_request,
            HookPhase::PreValidation => &self.pre_validation,
            HookPhase::PreHandler => &self.pre_handler,
            HookPhase::OnResponse | HookPhase::OnError => &[],
        }
    }

    /// Run a request phase in registration order.
    ///
    /// `Ok(None)` means every hook passed the request through; `Ok(Some(_))`
    /// is a short-circuit (remaining hooks in the phase were skipped).
    pub fn run_request_phase(
        &self,
        phase: HookPhase,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponseEnvelope>, HookError> {
        let hooks = self.request_slot(phase);
        if hooks.is_empty() {
            return Ok(None);
        }
        for hook in hooks {
            if let Some(resp) = hook.call(ctx)? {
                return Ok(Some(resp));
            }
        }
        Ok(None)
    }

    /// Run the `on_response` hooks in order, each transforming the envelope.
    pub fn run_on_response(
        &self,
        ctx: &RequestContext,
        mut resp: ResponseEnvelope,
    ) -> Result<ResponseEnvelope, HookError> {
        if self.on_response.is_empty() {
            return Ok(resp);
        }
        for hook in &self.on_response {
            resp = hook.call(ctx, resp)?;
        }
        Ok(resp)
    }

    /// Run the `on_error` hooks in order.
    ///
    /// A failing error hook stops the chain but keeps the envelope shaped by
    /// the hooks before it: the client still gets an error response.
    pub fn run_on_error(
        &self,
        ctx: &RequestContext,
        mut resp: ResponseEnvelope,
    ) -> ResponseEnvelope {
        if self.on_error.is_empty() {
            return resp;
        }
        for hook in &self.on_error {
            let backup = resp.try_clone();
            match hook.call(ctx, resp) {
                Ok(next) => resp = next,
                Err(err) => {
                    warn!(
                        request_id = %ctx.request_id,
                        hook = %err.hook,
                        error = %err.message,
                        "on_error hook failed; keeping previous envelope"
                    );
                    return backup.unwrap_or_else(|| {
                        ResponseEnvelope::error(500, "internal error", "error_hook_failed")
                    });
                }
            }
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/")
    }

    #[test]
    fn empty_phase_is_a_fast_path() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        let mut ctx = ctx();
        let flow = registry
            .run_request_phase(HookPhase::OnRequest, &mut ctx)
            .unwrap();
        assert!(flow.is_none());
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let mut registry = HookRegistry::new();
        for n in 1..=3 {
            registry.add_on_request(request_hook(format!("tag_{n}"), move |ctx| {
                let mut seen = ctx
                    .extension("order")
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                seen.push(json!(n));
                ctx.set_extension("order", json!(seen));
                Ok(None)
            }));
        }
        let mut ctx = ctx();
        registry
            .run_request_phase(HookPhase::OnRequest, &mut ctx)
            .unwrap();
        assert_eq!(ctx.extension("order"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn short_circuit_skips_remaining_hooks() {
        let mut registry = HookRegistry::new();
        registry.add_pre_handler(request_hook("gate", |_ctx| {
            Ok(Some(ResponseEnvelope::json(
                401,
                json!({"error": "unauthorized"}),
            )))
        }));
        registry.add_pre_handler(request_hook("never_runs", |ctx| {
            ctx.set_extension("leaked", json!(true));
            Ok(None)
        }));
        let mut ctx = ctx();
        let resp = registry
            .run_request_phase(HookPhase::PreHandler, &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, 401);
        assert!(ctx.extension("leaked").is_none());
    }

    #[test]
    fn register_rejects_kind_mismatch() {
        let mut registry = HookRegistry::new();
        let hook = response_hook("transform", |_ctx, resp| Ok(resp));
        let err = registry
            .register(HookPhase::OnRequest, HookKind::Response(hook))
            .unwrap_err();
        assert_eq!(err.phase, HookPhase::OnRequest);
        assert_eq!(err.hook, "transform");
    }

    #[test]
    fn register_accepts_matching_kinds() {
        let mut registry = HookRegistry::new();
        registry
            .register(
                HookPhase::PreHandler,
                HookKind::Request(request_hook("auth", |_ctx| Ok(None))),
            )
            .unwrap();
        registry
            .register(
                HookPhase::OnError,
                HookKind::Response(response_hook("shape", |_ctx, resp| Ok(resp))),
            )
            .unwrap();
        assert!(!registry.is_empty());
    }

    #[test]
    fn failing_error_hook_keeps_previous_envelope() {
        let mut registry = HookRegistry::new();
        registry.add_on_error(response_hook("retag", |_ctx, mut resp| {
            resp.set_header("x-handled", "yes");
            Ok(resp)
        }));
        registry.add_on_error(response_hook("broken", |_ctx, _resp| {
            Err(HookError::new("broken", "bad transform"))
        }));
        let resp = registry.run_on_error(&ctx(), ResponseEnvelope::error(500, "boom", "internal"));
        assert_eq!(resp.status, 500);
        assert_eq!(resp.header("x-handled"), Some("yes"));
    }
}
