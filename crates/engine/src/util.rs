//! Internal helpers for input validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so every operation enforces the same
//! invariants.

use serde_json::{Map, Value};

use crate::{EngineError, Money, ResultEngine};

/// Reject zero and negative amounts.
pub(crate) fn ensure_positive(amount: Money, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!(
            "{label} must be > 0, got {amount}"
        )));
    }
    Ok(())
}

/// Trim free text; blank input counts as absent.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Caller-supplied metadata must be a JSON object (or absent).
pub(crate) fn metadata_object(value: Option<Value>) -> ResultEngine<Map<String, Value>> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(EngineError::Validation(format!(
            "metadata must be a JSON object, got {other}"
        ))),
    }
}

/// Shallow-merge `extra` into `base`, `extra` wins on key clashes.
pub(crate) fn merge_metadata(base: Value, extra: Map<String, Value>) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merged.extend(extra);
    Value::Object(merged)
}

pub(crate) fn to_u32(value: u64, label: &str) -> ResultEngine<u32> {
    u32::try_from(value).map_err(|_| EngineError::Validation(format!("{label} out of range")))
}
