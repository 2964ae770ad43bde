use crate::context::RequestContext;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Resolution failure surfaced to the orchestrator.
///
/// Messages name the dependency key and nothing else — no internal paths or
/// frames leak into the client-facing envelope built from these.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("dependency '{0}' is not registered")]
    Missing(String),
    #[error("circular dependency detected for '{0}'")]
    Cycle(String),
    #[error("dependency factory for '{key}' failed")]
    Factory { key: String, cause: anyhow::Error },
}

/// Dependencies resolved for one handler call, keyed by provider name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    values: HashMap<String, Value>,
}

impl ResolvedDependencies {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }
}

/// Factory signature: receives the resolved `depends_on` values, produces
/// the dependency value.
pub type FactoryFn = Arc<dyn Fn(&ResolvedDependencies) -> anyhow::Result<Value> + Send + Sync>;

/// A registered provider.
#[derive(Clone)]
pub enum DependencyDefinition {
    /// Eagerly-available value; always a singleton, always cacheable.
    Value { value: Value },
    /// Lazily-invoked factory.
    Factory {
        factory: FactoryFn,
        depends_on: Vec<String>,
        singleton: bool,
        cacheable: bool,
    },
}

impl std::fmt::Debug for DependencyDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyDefinition::Value { value } => {
                f.debug_struct("Value").field("value", value).finish()
            }
            DependencyDefinition::Factory {
                depends_on,
                singleton,
                cacheable,
                ..
            } => f
                .debug_struct("Factory")
                .field("depends_on", depends_on)
                .field("singleton", singleton)
                .field("cacheable", cacheable)
                .finish(),
        }
    }
}

/// Registry of named providers plus the process-lifetime singleton cache.
///
/// Registration happens during single-threaded setup; `resolve` is safe to
/// call from concurrent requests afterwards. The singleton gate serializes
/// first-time singleton construction so each singleton factory runs at most
/// once; reads after that go straight to the lock-free cache.
#[derive(Default)]
pub struct DependencyRegistry {
    definitions: HashMap<String, DependencyDefinition>,
    singletons: DashMap<String, Value>,
    singleton_gate: Mutex<()>,
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("definitions", &self.definitions.len())
            .field("singletons_cached", &self.singletons.len())
            .finish()
    }
}

impl DependencyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an eagerly-available value (always singleton, always
    /// cacheable). Re-registering a key replaces the previous provider.
    pub fn register_value(&mut self, key: impl Into<String>, value: Value) {
        self.definitions
            .insert(key.into(), DependencyDefinition::Value { value });
    }

    /// Register a lazy factory with its dependency keys and caching flags.
    pub fn register_factory<F>(
        &mut self,
        key: impl Into<String>,
        factory: F,
        depends_on: Vec<String>,
        singleton: bool,
        cacheable: bool,
    ) where
        F: Fn(&ResolvedDependencies) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.definitions.insert(
            key.into(),
            DependencyDefinition::Factory {
                factory: Arc::new(factory),
                depends_on,
                singleton,
                cacheable,
            },
        );
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve one key for the given request.
    pub fn resolve(
        &self,
        key: &str,
        ctx: &mut RequestContext,
    ) -> Result<Value, DependencyError> {
        let mut resolving = HashSet::new();
        self.resolve_inner(key, ctx, &mut resolving)
    }

    /// Resolve a route's declared dependencies in declaration order.
    pub fn resolve_all(
        &self,
        keys: &[String],
        ctx: &mut RequestContext,
    ) -> Result<ResolvedDependencies, DependencyError> {
        let mut resolved = ResolvedDependencies::default();
        let mut resolving = HashSet::new();
        for key in keys {
            let value = self.resolve_inner(key, ctx, &mut resolving)?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    fn resolve_inner(
        &self,
        key: &str,
        ctx: &mut RequestContext,
        resolving: &mut HashSet<String>,
    ) -> Result<Value, DependencyError> {
        if let Some(cached) = self.singletons.get(key) {
            return Ok(cached.value().clone());
        }
        if let Some(cached) = ctx.dependency_cache.get(key) {
            return Ok(cached.clone());
        }

        if !resolving.insert(key.to_string()) {
            return Err(DependencyError::Cycle(key.to_string()));
        }

        let definition = self
            .definitions
            .get(key)
            .ok_or_else(|| DependencyError::Missing(key.to_string()))?;

        let value = match definition {
            DependencyDefinition::Value { value } => value.clone(),
            DependencyDefinition::Factory {
                factory,
                depends_on,
                singleton,
                cacheable,
            } => {
                // Resolve prerequisites before taking the singleton gate so
                // nested singleton construction never holds it re-entrantly.
                let mut inputs = ResolvedDependencies::default();
                for dep_key in depends_on {
                    let dep_value = self.resolve_inner(dep_key, ctx, resolving)?;
                    inputs.insert(dep_key.clone(), dep_value);
                }

                if *singleton {
                    let guard = self
                        .singleton_gate
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    // Another request may have won the race while we were
                    // resolving prerequisites.
                    if let Some(cached) = self.singletons.get(key) {
                        let value = cached.value().clone();
                        drop(cached);
                        drop(guard);
                        resolving.remove(key);
                        return Ok(value);
                    }
                    let value = self.invoke_factory(key, factory, &inputs)?;
                    self.singletons.insert(key.to_string(), value.clone());
                    drop(guard);
                    debug!(dependency = key, "singleton dependency cached");
                    resolving.remove(key);
                    return Ok(value);
                }

                let value = self.invoke_factory(key, factory, &inputs)?;
                if *cacheable {
                    ctx.dependency_cache
                        .insert(key.to_string(), value.clone());
                }
                value
            }
        };

        resolving.remove(key);
        Ok(value)
    }

    fn invoke_factory(
        &self,
        key: &str,
        factory: &FactoryFn,
        inputs: &ResolvedDependencies,
    ) -> Result<Value, DependencyError> {
        factory(inputs).map_err(|cause| DependencyError::Factory {
            key: key.to_string(),
            cause,
        })
    }
}
