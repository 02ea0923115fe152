//! Tolerant request-body normalization.
//!
//! Clients of the gateway are curl one-liners, shortcut apps, and home
//! automation boxes that routinely omit or mislabel `Content-Type`. The
//! normalizer turns whatever arrived into one flat string map using an
//! explicit ordered strategy chain, first non-empty result wins:
//!
//! 1. Body declared as JSON: parse it; a failed parse yields an empty
//!    payload and ends the chain (downstream decides what "missing" means)
//! 2. Undeclared JSON sniff: try the parse anyway
//! 3. Form-encoded body
//! 4. Query-string parameters
//!
//! An all-empty result is a valid empty payload, not an error.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

/// Flat key/value view of a request body, however it was encoded.
pub type NormalizedPayload = HashMap<String, String>;

/// Normalize a request into a key/value payload.
///
/// `content_type` is the declared `Content-Type` header, if any;
/// `raw` is the unparsed body; `query` is the raw query string.
pub fn normalize(
    content_type: Option<&str>,
    raw: &[u8],
    query: Option<&str>,
) -> NormalizedPayload {
    // Strategy 1: declared JSON. The declaration is trusted: a body that
    // claims JSON but fails to parse resolves to an empty payload rather
    // than falling through to the form/query strategies.
    if declares_json(content_type) {
        return parse_json(raw).unwrap_or_default();
    }

    // Strategy 2: sniff JSON despite the missing/incorrect header.
    if let Some(payload) = parse_json(raw).filter(|p| !p.is_empty()) {
        debug!("parsed undeclared JSON body");
        return payload;
    }

    // Strategy 3: form-encoded body.
    if let Some(payload) = parse_form(raw).filter(|p| !p.is_empty()) {
        return payload;
    }

    // Strategy 4: query-string parameters.
    query
        .and_then(|q| parse_form(q.as_bytes()))
        .unwrap_or_default()
}

/// Resolve the `/print` message with its extra raw-body fallback.
///
/// Precedence: payload `message`, then query `message`, then the whole
/// raw body trimmed of surrounding whitespace and double quotes. Returns
/// `None` only when every source is empty.
pub fn resolve_message(
    payload: &NormalizedPayload,
    query: &NormalizedPayload,
    raw: &[u8],
) -> Option<String> {
    if let Some(message) = payload.get("message").or_else(|| query.get("message")) {
        return Some(message.clone());
    }

    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whether the declared content type is JSON (parameters tolerated).
fn declares_json(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim())
        .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json"))
}

/// Parse a JSON object body into a flat string map.
///
/// Scalar values are coerced to strings (`true` -> "true", `1` -> "1");
/// nested arrays/objects are skipped. Non-object JSON yields `None`.
fn parse_json(raw: &[u8]) -> Option<NormalizedPayload> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    let object = value.as_object()?;

    let mut payload = NormalizedPayload::new();
    for (key, value) in object {
        let coerced = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        payload.insert(key.clone(), coerced);
    }
    Some(payload)
}

/// Parse URL-encoded pairs (form body or query string).
fn parse_form(raw: &[u8]) -> Option<NormalizedPayload> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(raw).ok()?;
    Some(pairs.into_iter().collect())
}
