//! Helpers for parsing structured JSON out of free-text model output.

use serde::de::DeserializeOwned;

use crate::error::LlmError;

/// Parse a JSON value from a model response, tolerating markdown fences.
///
/// Models frequently wrap JSON in ```` ```json ```` blocks despite being
/// told not to; the fence is stripped before deserializing.
///
/// # Errors
///
/// Returns an error if the remaining text is not valid JSON for `T`.
pub fn from_response<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let stripped = strip_fences(text);
    serde_json::from_str(stripped).map_err(LlmError::Json)
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
