//! Application setup container.
//!
//! An [`App`] owns all registration state — routes, hooks, dependency
//! providers, handlers, configuration. Nothing in this crate is a process
//! global: multiple independent applications can coexist in one process,
//! each with its own registries and singleton caches.
//!
//! Setup is single-threaded. [`App::finalize`] consumes the container and
//! produces the immutable [`Engine`]; registration after that point is
//! impossible by construction, which is what makes the engine safe to share
//! across concurrent requests.

use crate::background::BackgroundQueue;
use crate::di::{DependencyRegistry, ResolvedDependencies};
use crate::hooks::{
    HookKind, HookPhase, HookRegistry, InvalidHookError, RequestHook, ResponseHook,
};
use crate::invoke::{spawn_handler, Handler, HandlerSender};
use crate::orchestrator::Engine;
use crate::route::{RouteDescriptor, RouteTable};
use crate::runtime_config::RuntimeConfig;
use crate::validation::{JsonSchemaValidator, SchemaValidator};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Mutable application under construction.
pub struct App {
    routes: RouteTable,
    hooks: HookRegistry,
    dependencies: DependencyRegistry,
    handlers: HashMap<String, HandlerSender>,
    validator: Option<Arc<dyn SchemaValidator>>,
    config: RuntimeConfig,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// New application with configuration from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            routes: RouteTable::new(),
            hooks: HookRegistry::new(),
            dependencies: DependencyRegistry::new(),
            handlers: HashMap::new(),
            validator: None,
            config,
        }
    }

    /// Register a route. Returns the shared descriptor for the external
    /// router's matching table.
    pub fn route(&mut self, descriptor: RouteDescriptor) -> Arc<RouteDescriptor> {
        self.routes.register(descriptor)
    }

    /// Register a handler under the id routes refer to.
    ///
    /// Spawns the handler's coroutine immediately. Registering the same id
    /// again replaces the previous handler; the old coroutine exits when its
    /// channel drops.
    ///
    /// # Safety
    ///
    /// Spawns a coroutine via `may::coroutine::Builder::spawn()`, which is
    /// unsafe in the `may` runtime. The caller must ensure the coroutine
    /// runtime is initialized and that registration happens during
    /// single-threaded setup.
    pub unsafe fn register_handler<H>(&mut self, handler_id: &str, handler: H)
    where
        H: Handler,
    {
        if self.handlers.remove(handler_id).is_some() {
            warn!(handler = %handler_id, "replacing existing handler");
        }
        // SAFETY: forwarded to spawn_handler under the same contract.
        match unsafe { spawn_handler(handler_id, handler, self.config.stack_size) } {
            Ok(sender) => {
                info!(handler = %handler_id, total = self.handlers.len() + 1, "handler registered");
                self.handlers.insert(handler_id.to_string(), sender);
            }
            Err(err) => {
                tracing::error!(handler = %handler_id, error = %err, "failed to spawn handler coroutine");
            }
        }
    }

    /// Register a hook on a phase carried as data; fails on a kind mismatch.
    pub fn register_hook(
        &mut self,
        phase: HookPhase,
        hook: HookKind,
    ) -> Result<(), InvalidHookError> {
        self.hooks.register(phase, hook)
    }

    pub fn on_request(&mut self, hook: Arc<dyn RequestHook>) -> &mut Self {
        self.hooks.add_on_request(hook);
        self
    }

    pub fn pre_validation(&mut self, hook: Arc<dyn RequestHook>) -> &mut Self {
        self.hooks.add_pre_validation(hook);
        self
    }

    pub fn pre_handler(&mut self, hook: Arc<dyn RequestHook>) -> &mut Self {
        self.hooks.add_pre_handler(hook);
        self
    }

    pub fn on_response(&mut self, hook: Arc<dyn ResponseHook>) -> &mut Self {
        self.hooks.add_on_response(hook);
        self
    }

    pub fn on_error(&mut self, hook: Arc<dyn ResponseHook>) -> &mut Self {
        self.hooks.add_on_error(hook);
        self
    }

    /// Register an eagerly-available dependency value.
    pub fn provide_value(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.dependencies.register_value(key, value);
        self
    }

    /// Register a lazy dependency factory.
    pub fn provide_factory<F>(
        &mut self,
        key: impl Into<String>,
        factory: F,
        depends_on: Vec<String>,
        singleton: bool,
        cacheable: bool,
    ) -> &mut Self
    where
        F: Fn(&ResolvedDependencies) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.dependencies
            .register_factory(key, factory, depends_on, singleton, cacheable);
        self
    }

    /// Replace the default JSON Schema engine behind the validation seam.
    pub fn set_validator(&mut self, validator: Arc<dyn SchemaValidator>) -> &mut Self {
        self.validator = Some(validator);
        self
    }

    /// Finalize setup: start the background queue and produce the immutable
    /// engine.
    ///
    /// # Safety
    ///
    /// Starts background worker coroutines via
    /// `may::coroutine::Builder::spawn()`, which is unsafe in the `may`
    /// runtime. The caller must ensure the coroutine runtime is initialized.
    #[must_use]
    pub unsafe fn finalize(self) -> Engine {
        info!(
            routes = self.routes.len(),
            handlers = self.handlers.len(),
            dependencies = self.dependencies.len(),
            "application finalized"
        );
        // SAFETY: forwarded to BackgroundQueue::start under the same contract.
        let background = unsafe { BackgroundQueue::start(self.config.background) };
        Engine {
            routes: self.routes,
            hooks: self.hooks,
            dependencies: self.dependencies,
            handlers: self.handlers,
            validator: self
                .validator
                .unwrap_or_else(|| Arc::new(JsonSchemaValidator::new())),
            config: self.config,
            background,
        }
    }
}
