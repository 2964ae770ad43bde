use crate::background::BackgroundQueue;
use crate::context::{CancelToken, RawRequest, RequestContext};
use crate::di::{DependencyError, DependencyRegistry, ResolvedDependencies};
use crate::hooks::{HookPhase, HookRegistry};
use crate::ids::RequestId;
use crate::invoke::{normalize_return, HandlerCall, HandlerError, HandlerJob, HandlerReturn, HandlerSender};
use crate::response::ResponseEnvelope;
use crate::route::{RouteMatch, RouteTable};
use crate::runtime_config::RuntimeConfig;
use crate::sanitize::sanitize_message;
use crate::validation::SchemaValidator;
use may::sync::mpsc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How a request-phase step left the state machine.
enum Step {
    Continue,
    /// Terminal response (short-circuit or already-shaped error envelope).
    Finish(ResponseEnvelope),
    Cancelled,
}

/// The finalized application: immutable registries plus the dispatch entry
/// point. Built by [`crate::app::App::finalize`]; shared read-only across
/// request-dispatching threads and coroutines.
pub struct Engine {
    pub(crate) routes: RouteTable,
    pub(crate) hooks: HookRegistry,
    pub(crate) dependencies: DependencyRegistry,
    pub(crate) handlers: HashMap<String, HandlerSender>,
    pub(crate) validator: Arc<dyn SchemaValidator>,
    pub(crate) config: RuntimeConfig,
    pub(crate) background: BackgroundQueue,
}

impl Engine {
    /// Read-only view of the registered routes for the external router.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The background job queue started with this engine.
    #[must_use]
    pub fn background(&self) -> &BackgroundQueue {
        &self.background
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Drive one request through the lifecycle.
    ///
    /// `raw` is the transport's decoded request; `route_match` is the
    /// descriptor and path parameters the external router produced. Returns
    /// the final envelope for the transport, or `None` when the request was
    /// cancelled mid-flight.
    #[must_use]
    pub fn dispatch(&self, raw: RawRequest, route_match: RouteMatch) -> Option<ResponseEnvelope> {
        self.dispatch_cancellable(raw, route_match, CancelToken::new())
    }

    /// [`Engine::dispatch`] with an externally-owned cancel token (the
    /// transport cancels it on client disconnect).
    #[must_use]
    pub fn dispatch_cancellable(
        &self,
        raw: RawRequest,
        route_match: RouteMatch,
        cancel: CancelToken,
    ) -> Option<ResponseEnvelope> {
        // Catch-all boundary: nothing escapes to the transport uncaught.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.dispatch_inner(raw, route_match, cancel)
        }));
        match outcome {
            Ok(result) => result,
            Err(panic) => {
                error!(panic = ?panic, "dispatch panicked outside handler");
                Some(ResponseEnvelope::error(
                    500,
                    "internal error",
                    "internal_error",
                ))
            }
        }
    }

    fn dispatch_inner(
        &self,
        raw: RawRequest,
        route_match: RouteMatch,
        cancel: CancelToken,
    ) -> Option<ResponseEnvelope> {
        let RouteMatch { route, path_params } = route_match;
        let mut ctx = RequestContext::from_raw(raw, path_params, cancel);
        let request_id = ctx.request_id;
        let started = Instant::now();

        info!(
            request_id = %request_id,
            method = %ctx.method,
            path = %ctx.path,
            handler = %route.handler_id,
            "request dispatch start"
        );

        for phase in [HookPhase::OnRequest, HookPhase::PreValidation] {
            match self.run_request_phase(phase, &mut ctx) {
                Step::Continue => {}
                Step::Finish(resp) => return Some(self.log_finish(resp, &request_id, started)),
                Step::Cancelled => return None,
            }
        }

        // Schema validation call-out sits between pre_validation and
        // pre_handler.
        if let Some(schema) = route.request_schema.as_ref() {
            if ctx.is_cancelled() {
                debug!(request_id = %request_id, "request cancelled before validation");
                return None;
            }
            let body = ctx.body.clone().unwrap_or(Value::Null);
            if let Err(mut failure) = self.validator.validate(schema, &body) {
                if failure.status == 422 {
                    failure.status = self.config.validation_status;
                }
                debug!(
                    request_id = %request_id,
                    errors = failure.errors.len(),
                    "request validation failed"
                );
                let resp = self.hooks.run_on_error(&ctx, failure.into_envelope());
                return Some(self.log_finish(resp, &request_id, started));
            }
        }

        match self.run_request_phase(HookPhase::PreHandler, &mut ctx) {
            Step::Continue => {}
            Step::Finish(resp) => return Some(self.log_finish(resp, &request_id, started)),
            Step::Cancelled => return None,
        }

        // Resolving
        if ctx.is_cancelled() {
            debug!(request_id = %request_id, "request cancelled before dependency resolution");
            return None;
        }
        let dependencies = match self
            .dependencies
            .resolve_all(&route.declared_dependencies, &mut ctx)
        {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    handler = %route.handler_id,
                    error = %err,
                    "dependency resolution failed"
                );
                let resp = self.hooks.run_on_error(&ctx, dependency_error_envelope(&err));
                return Some(self.log_finish(resp, &request_id, started));
            }
        };

        // Invoking
        if ctx.is_cancelled() {
            debug!(request_id = %request_id, "request cancelled before handler");
            return None;
        }
        let resp = match self.invoke_handler(&ctx, &route.handler_id, dependencies) {
            Ok(ret) => {
                if ctx.is_cancelled() {
                    debug!(request_id = %request_id, "request cancelled after handler");
                    return None;
                }
                let resp = normalize_return(ret, &self.config);
                match self.hooks.run_on_response(&ctx, resp) {
                    Ok(resp) => resp,
                    Err(hook_err) => {
                        // A failing on_response hook diverts to the error path.
                        warn!(
                            request_id = %request_id,
                            hook = %hook_err.hook,
                            error = %hook_err.message,
                            "on_response hook failed"
                        );
                        let resp = ResponseEnvelope::error(
                            500,
                            &sanitize_message(&hook_err.message),
                            "hook_failed",
                        );
                        self.hooks.run_on_error(&ctx, resp)
                    }
                }
            }
            Err(err) => {
                let resp = handler_error_envelope(err, &request_id, &route.handler_id);
                self.hooks.run_on_error(&ctx, resp)
            }
        };

        Some(self.log_finish(resp, &request_id, started))
    }

    /// Run one request-phase hook slot, folding cancellation, short-circuit,
    /// and hook failure into a [`Step`].
    fn run_request_phase(&self, phase: HookPhase, ctx: &mut RequestContext) -> Step {
        if ctx.is_cancelled() {
            debug!(request_id = %ctx.request_id, ?phase, "request cancelled at phase boundary");
            return Step::Cancelled;
        }
        match self.hooks.run_request_phase(phase, ctx) {
            Ok(None) => Step::Continue,
            Ok(Some(resp)) => {
                // Control flow, not a failure: the response is terminal and
                // neither terminal hook phase runs for it.
                debug!(
                    request_id = %ctx.request_id,
                    ?phase,
                    status = resp.status,
                    "hook short-circuit"
                );
                Step::Finish(resp)
            }
            Err(err) => {
                warn!(
                    request_id = %ctx.request_id,
                    ?phase,
                    hook = %err.hook,
                    error = %err.message,
                    "lifecycle hook failed"
                );
                let resp =
                    ResponseEnvelope::error(500, &sanitize_message(&err.message), "hook_failed");
                Step::Finish(self.hooks.run_on_error(ctx, resp))
            }
        }
    }

    fn log_finish(
        &self,
        resp: ResponseEnvelope,
        request_id: &RequestId,
        started: Instant,
    ) -> ResponseEnvelope {
        info!(
            request_id = %request_id,
            status = resp.status,
            latency_ms = started.elapsed().as_millis() as u64,
            "request dispatch finished"
        );
        resp
    }

    fn invoke_handler(
        &self,
        ctx: &RequestContext,
        handler_id: &str,
        dependencies: ResolvedDependencies,
    ) -> Result<HandlerReturn, HandlerError> {
        let Some(sender) = self.handlers.get(handler_id) else {
            error!(handler = %handler_id, "handler not registered");
            return Err(HandlerError::Internal(anyhow::anyhow!(
                "handler '{handler_id}' is not registered"
            )));
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let call = HandlerCall {
            request_id: ctx.request_id,
            method: ctx.method.clone(),
            path: ctx.path.clone(),
            handler_id: handler_id.to_string(),
            path_params: ctx.path_params.clone(),
            query_params: ctx.query_params.clone(),
            headers: ctx.headers.clone(),
            body: ctx.body.clone(),
            extensions: ctx.extensions().clone(),
            dependencies,
        };

        if sender.send(HandlerJob { call, reply_tx }).is_err() {
            error!(
                request_id = %ctx.request_id,
                handler = %handler_id,
                "handler channel closed; coroutine may have exited"
            );
            return Err(HandlerError::Internal(anyhow::anyhow!(
                "handler '{handler_id}' is not responding"
            )));
        }

        debug!(request_id = %ctx.request_id, handler = %handler_id, "waiting for handler reply");
        match reply_rx.recv() {
            Ok(reply) => reply,
            Err(_) => {
                error!(
                    request_id = %ctx.request_id,
                    handler = %handler_id,
                    "handler reply channel closed without a response"
                );
                Err(HandlerError::Internal(anyhow::anyhow!(
                    "handler '{handler_id}' dropped the request"
                )))
            }
        }
    }
}

/// Envelope for a dependency-resolution failure: a 500 naming only the
/// dependency key.
fn dependency_error_envelope(err: &DependencyError) -> ResponseEnvelope {
    let code = match err {
        DependencyError::Missing(_) => "missing_dependency",
        DependencyError::Cycle(_) => "dependency_cycle",
        DependencyError::Factory { .. } => "dependency_failed",
    };
    ResponseEnvelope::error(500, &err.to_string(), code)
}

/// Envelope for a handler failure: intentional HTTP errors verbatim,
/// everything else a sanitized 500.
fn handler_error_envelope(
    err: HandlerError,
    request_id: &RequestId,
    handler_id: &str,
) -> ResponseEnvelope {
    match err {
        HandlerError::Http { status, body } => {
            debug!(
                request_id = %request_id,
                handler = %handler_id,
                status,
                "handler returned http error"
            );
            ResponseEnvelope::json(status, body)
        }
        HandlerError::Internal(source) => {
            error!(
                request_id = %request_id,
                handler = %handler_id,
                error = %source,
                "handler failed"
            );
            ResponseEnvelope::error(500, &sanitize_message(&source.to_string()), "internal_error")
        }
    }
}
