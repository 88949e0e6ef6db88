//! Response inspection: business-failure detection and id extraction.

use serde_json::Value;

use crate::error::{Result, SyncError};

/// Fails when a 2xx body reports `"success": false`.
pub fn ensure_success(operation: &str, response: &Value) -> Result<()> {
    if response.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(SyncError::RemoteRejected {
            operation: operation.to_string(),
            message: display_message(response)
                .unwrap_or_else(|| "remote reported success=false".to_string()),
        });
    }
    Ok(())
}

/// Human-readable message supplied by the remote service, if any.
pub fn display_message(response: &Value) -> Option<String> {
    ["displayMessage", "message"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_str))
        .or_else(|| match response.get("error") {
            Some(Value::String(message)) => Some(message.as_str()),
            Some(error) => error.get("message").and_then(Value::as_str),
            None => None,
        })
        .map(str::to_string)
}

/// Numeric id from a number or a numeric string.
pub fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Product id lookup order: `product.id`, `product.entityId`, then `productId`.
pub fn extract_product_id(response: &Value) -> Option<i64> {
    let product = response.get("product");
    product
        .and_then(|p| p.get("id"))
        .and_then(parse_id)
        .or_else(|| product.and_then(|p| p.get("entityId")).and_then(parse_id))
        .or_else(|| response.get("productId").and_then(parse_id))
}

/// Customer and address responses carry their id under `data.id`.
pub fn extract_data_id(response: &Value) -> Option<i64> {
    response
        .get("data")
        .and_then(|data| data.get("id"))
        .and_then(parse_id)
}
