//! Schema validation seam.
//!
//! The orchestrator calls out here between the `pre_validation` and
//! `pre_handler` phases with the route's request schema. The engine that
//! interprets schemas is pluggable via [`SchemaValidator`]; the default
//! [`JsonSchemaValidator`] compiles JSON Schemas once per distinct schema and
//! validates request bodies against them.
//!
//! Failures are reported as problem details with field-level entries and are
//! converted by the orchestrator into a 422-class envelope before the
//! `on_error` hooks run.

use crate::response::ResponseEnvelope;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const VALIDATION_TYPE: &str = "https://camshaft.dev/errors/validation";
const INVALID_SCHEMA_TYPE: &str = "https://camshaft.dev/errors/invalid-schema";

/// One field-level validation error.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationItem {
    /// Constraint keyword that failed (`required`, `minLength`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Path segments locating the offending value in the body.
    pub loc: Vec<String>,
    /// Human-readable description of the violation.
    pub msg: String,
    /// The offending input value.
    pub input: Value,
    /// Constraint context (expected bounds etc.), when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
}

/// Structured validation failure: problem details plus field entries.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub errors: Vec<ValidationItem>,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(detail: impl Into<String>, errors: Vec<ValidationItem>) -> Self {
        Self {
            kind: VALIDATION_TYPE.to_string(),
            title: "Validation Failed".to_string(),
            status: 422,
            detail: detail.into(),
            errors,
        }
    }

    /// Failure for a schema that itself does not compile. This is a server
    /// bug, not client input, so it maps to a 500-class problem.
    #[must_use]
    pub fn invalid_schema(detail: impl Into<String>) -> Self {
        Self {
            kind: INVALID_SCHEMA_TYPE.to_string(),
            title: "Invalid Schema".to_string(),
            status: 500,
            detail: detail.into(),
            errors: Vec::new(),
        }
    }

    /// Render the failure as a problem-details envelope.
    #[must_use]
    pub fn into_envelope(self) -> ResponseEnvelope {
        let status = self.status;
        let body = serde_json::to_value(&self).unwrap_or_else(|_| {
            serde_json::json!({
                "type": VALIDATION_TYPE,
                "title": "Validation Failed",
                "status": status,
                "detail": "request validation failed",
                "errors": [],
            })
        });
        let mut resp = ResponseEnvelope::json(status, body);
        resp.set_header("content-type", "application/problem+json");
        resp
    }
}

/// Pluggable validation engine.
///
/// Implementations receive the route's opaque schema and the parsed request
/// body; `Err` carries the structured failure the orchestrator converts into
/// the client response.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, schema: &Value, body: &Value) -> Result<(), ValidationFailure>;
}

/// Default JSON Schema engine.
///
/// Compiled validators are cached keyed by the serialized schema, so each
/// distinct schema compiles once per process no matter how many routes or
/// requests use it.
#[derive(Default)]
pub struct JsonSchemaValidator {
    compiled: DashMap<String, Arc<jsonschema::Validator>>,
}

impl JsonSchemaValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled_for(&self, schema: &Value) -> Result<Arc<jsonschema::Validator>, ValidationFailure> {
        let cache_key = schema.to_string();
        if let Some(found) = self.compiled.get(&cache_key) {
            return Ok(Arc::clone(found.value()));
        }
        let validator = jsonschema::validator_for(schema)
            .map_err(|err| ValidationFailure::invalid_schema(err.to_string()))?;
        let validator = Arc::new(validator);
        self.compiled.insert(cache_key, Arc::clone(&validator));
        Ok(validator)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, body: &Value) -> Result<(), ValidationFailure> {
        let validator = self.compiled_for(schema)?;
        let errors: Vec<ValidationItem> = validator
            .iter_errors(body)
            .map(|err| {
                let mut loc = vec!["body".to_string()];
                loc.extend(
                    err.instance_path()
                        .to_string()
                        .split('/')
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string),
                );
                // The last schema-path segment is the keyword that failed.
                let kind = err
                    .schema_path()
                    .as_str()
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .unwrap_or("schema")
                    .to_string();
                ValidationItem {
                    kind,
                    loc,
                    msg: err.to_string(),
                    input: err.instance().clone().into_owned(),
                    ctx: None,
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            let detail = format!(
                "request body failed validation with {} error(s)",
                errors.len()
            );
            Err(ValidationFailure::new(detail, errors))
        }
    }
}
