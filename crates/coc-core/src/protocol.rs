//! Provider error classification.
//!
//! The developer portal (login, key management) wraps every successful reply in
//! a `status` envelope. Game-API resources carry no envelope and report failures
//! as `{"reason": ..., "message": ...}` with a non-2xx status.

use serde_json::Value;

use crate::{errors::Error, Result};

/// Developer-portal replies are errors unless they carry a `status` field.
pub fn classify_portal_response(body: &Value) -> Result<()> {
    let Some(obj) = body.as_object() else {
        return Err(Error::protocol(
            "portal response is not a JSON object",
            Some(body.clone()),
        ));
    };

    if obj.contains_key("status") {
        return Ok(());
    }
    if obj.contains_key("error") {
        return Err(Error::protocol(
            format!("portal reported an error: {body}"),
            Some(body.clone()),
        ));
    }
    Err(Error::protocol(
        "expected key \"status\" was not found in portal response",
        Some(body.clone()),
    ))
}

/// Game-API replies are errors on a non-2xx status, a non-container body, or
/// a top-level `reason`/`error` field.
pub fn classify_api_response(http_status: u16, body: &Value) -> Result<()> {
    let provider_error = body
        .as_object()
        .map(|o| o.contains_key("reason") || o.contains_key("error"))
        .unwrap_or(false);

    if !(200..300).contains(&http_status) || provider_error {
        let reason = body
            .get("reason")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(Error::protocol(
            format!("provider returned {http_status} ({reason})"),
            Some(body.clone()),
        ));
    }

    if !(body.is_object() || body.is_array()) {
        return Err(Error::protocol(
            "response body is not a JSON object or array",
            Some(body.clone()),
        ));
    }
    Ok(())
}
