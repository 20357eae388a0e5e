//! Argument helpers for the MCP tool handlers

use serde::de::DeserializeOwned;
use serde_json::{from_value, Value};

use crate::mcp::protocol::{error_codes, Response};

/// Helper function to extract a required argument from a JSON object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Like [`get_required_arg`], but a missing or null key is `None`.
pub fn get_optional_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<Option<T>, Response> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_required_arg(args, key, req_id).map(Some),
    }
}

/// Amounts may arrive as JSON strings or numbers; both are kept as decimal text.
pub fn get_amount_arg(args: &Value, key: &str, req_id: &Value) -> Result<String, Response> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )),
    }
}
