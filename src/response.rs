//! Canonical response representation handed back to the external transport.

use crate::context::HeaderVec;
use crate::streaming::ChunkStream;
use serde_json::Value;
use std::sync::Arc;

/// Response body variants.
///
/// `Stream` is a lazy chunk sequence (SSE/chunked responses); the
/// orchestrator never materializes it — the transport drains the stream
/// after the envelope is returned.
pub enum Body {
    Empty,
    Json(Value),
    Bytes(Vec<u8>),
    Stream(ChunkStream),
}

impl Body {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Structured body, if this is the JSON variant.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The canonical status/headers/body triple produced by a handler or a
/// short-circuiting hook, transformed by the terminal hook phase, and
/// finalized for the transport.
///
/// Header names are matched case-insensitively; insertion order is kept.
#[derive(Debug)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Body,
}

impl ResponseEnvelope {
    /// Empty-bodied response with the given status.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Body::Empty,
        }
    }

    /// JSON response with a `content-type: application/json` header.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body: Body::Json(body),
        }
    }

    /// Structured error response: `{"error": <message>, "code": <code>}`.
    ///
    /// Used for every synthesized error envelope so clients never see a raw
    /// exception string.
    #[must_use]
    pub fn error(status: u16, message: &str, code: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({ "error": message, "code": code }),
        )
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

    /// Add or replace a header (case-insensitive match on the name).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    /// Clone the envelope when the body allows it.
    ///
    /// Stream bodies are single-consumer and cannot be duplicated; everything
    /// else clones. Used to keep a fallback copy while a hook transforms the
    /// envelope by value.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        let body = match &self.body {
            Body::Empty => Body::Empty,
            Body::Json(v) => Body::Json(v.clone()),
            Body::Bytes(b) => Body::Bytes(b.clone()),
            Body::Stream(_) => return None,
        };
        Some(Self {
            status: self.status,
            headers: self.headers.clone(),
            body,
        })
    }

    /// Fill defaults for fields the producer left unset: a JSON body without
    /// a content type gets `application/json`.
    pub(crate) fn fill_defaults(&mut self) {
        if matches!(self.body, Body::Json(_)) && self.header("content-type").is_none() {
            self.set_header("content-type", "application/json");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_sets_content_type() {
        let resp = ResponseEnvelope::json(200, json!({"ok": true}));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut resp = ResponseEnvelope::new(200);
        resp.set_header("X-Version", "1");
        resp.set_header("x-version", "2");
        assert_eq!(resp.header("x-version"), Some("2"));
        assert_eq!(resp.headers.len(), 1);
    }

    #[test]
    fn error_body_is_structured() {
        let resp = ResponseEnvelope::error(500, "boom", "internal_error");
        assert_eq!(
            resp.body.as_json(),
            Some(&json!({"error": "boom", "code": "internal_error"}))
        );
    }

    #[test]
    fn fill_defaults_only_touches_unset_fields() {
        let mut resp = ResponseEnvelope {
            status: 201,
            headers: HeaderVec::new(),
            body: Body::Json(json!([1, 2])),
        };
        resp.fill_defaults();
        assert_eq!(resp.header("content-type"), Some("application/json"));

        let mut custom = ResponseEnvelope::new(200);
        custom.set_header("content-type", "text/plain");
        custom.body = Body::Json(json!("hi"));
        custom.fill_defaults();
        assert_eq!(custom.header("content-type"), Some("text/plain"));
    }
}
