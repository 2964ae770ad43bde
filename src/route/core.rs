use crate::context::ParamVec;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Immutable metadata describing one registered endpoint.
///
/// Created at registration time and never mutated; the table hands out
/// `Arc`s so descriptors can be shared with the external router and with
/// in-flight requests without copying.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub method: Method,
    /// Path pattern with `{name}` placeholders. Matching is the external
    /// router's job; the pattern is opaque here.
    pub path_pattern: String,
    /// Key of the handler registered for this route.
    pub handler_id: String,
    /// Dependency keys the handler requires, resolved in this order.
    pub declared_dependencies: Vec<String>,
    /// Opaque request-body schema for the validation seam.
    pub request_schema: Option<Value>,
    /// Opaque response schema; carried for tooling, not interpreted here.
    pub response_schema: Option<Value>,
}

impl RouteDescriptor {
    /// Descriptor with no dependencies or schemas.
    #[must_use]
    pub fn new(method: Method, path_pattern: impl Into<String>, handler_id: impl Into<String>) -> Self {
        Self {
            method,
            path_pattern: path_pattern.into(),
            handler_id: handler_id.into(),
            declared_dependencies: Vec::new(),
            request_schema: None,
            response_schema: None,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.declared_dependencies = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_request_schema(mut self, schema: Value) -> Self {
        self.request_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A matched route: the descriptor plus the path parameters the external
/// router extracted from the request path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteDescriptor>,
    pub path_params: ParamVec,
}

impl RouteMatch {
    #[must_use]
    pub fn new(route: Arc<RouteDescriptor>, path_params: ParamVec) -> Self {
        Self { route, path_params }
    }
}

/// Ordered collection of route descriptors, registered during setup and
/// read-only once the application starts serving.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteDescriptor>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor, returning the shared handle the external router
    /// keeps for matching.
    pub fn register(&mut self, descriptor: RouteDescriptor) -> Arc<RouteDescriptor> {
        let route = Arc::new(descriptor);
        self.routes.push(Arc::clone(&route));
        route
    }

    /// Registration-ordered read-only view.
    #[must_use]
    pub fn routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.routes
    }

    /// Find a descriptor by verb and literal pattern (registration helper;
    /// not a path matcher).
    #[must_use]
    pub fn find(&self, method: &Method, path_pattern: &str) -> Option<&Arc<RouteDescriptor>> {
        self.routes
            .iter()
            .find(|r| r.method == *method && r.path_pattern == path_pattern)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_preserves_order() {
        let mut table = RouteTable::new();
        table.register(RouteDescriptor::new(Method::GET, "/pets", "list_pets"));
        table.register(RouteDescriptor::new(Method::POST, "/pets", "add_pet"));
        table.register(RouteDescriptor::new(Method::GET, "/pets/{id}", "get_pet"));

        let ids: Vec<_> = table
            .routes()
            .iter()
            .map(|r| r.handler_id.as_str())
            .collect();
        assert_eq!(ids, ["list_pets", "add_pet", "get_pet"]);
    }

    #[test]
    fn find_matches_method_and_pattern() {
        let mut table = RouteTable::new();
        table.register(RouteDescriptor::new(Method::GET, "/pets", "list_pets"));
        assert!(table.find(&Method::GET, "/pets").is_some());
        assert!(table.find(&Method::POST, "/pets").is_none());
    }

    #[test]
    fn builder_attaches_dependencies_and_schema() {
        let route = RouteDescriptor::new(Method::POST, "/pets", "add_pet")
            .with_dependencies(["db", "audit"])
            .with_request_schema(json!({"type": "object"}));
        assert_eq!(route.declared_dependencies, ["db", "audit"]);
        assert!(route.request_schema.is_some());
    }
}
