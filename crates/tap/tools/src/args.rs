//! Argument decoding shared by every tool.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tap_types::{AgentAddress, Amount, IntentAddress, IntentHash};

use crate::error::{ToolError, ToolOutcome};

/// Decode the `arguments` object into `T`. A missing object decodes as `{}`.
pub(crate) fn decode<T: DeserializeOwned>(arguments: Value) -> ToolOutcome<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> ToolOutcome<Value> {
    serde_json::to_value(value).map_err(|e| ToolError::Encode(e.to_string()))
}

/// Amounts travel as signed JSON integers so a negative value gets a
/// readable rejection instead of a type error.
pub(crate) fn amount(field: &str, raw: i64) -> ToolOutcome<Amount> {
    Amount::try_from(raw)
        .map_err(|_| ToolError::InvalidArguments(format!("{field} must not be negative, got {raw}")))
}

pub(crate) fn positive_ttl(raw: i64) -> ToolOutcome<i64> {
    if raw <= 0 {
        return Err(ToolError::InvalidArguments(format!(
            "ttl_seconds must be positive, got {raw}"
        )));
    }
    Ok(raw)
}

pub(crate) fn counter(field: &str, raw: Option<i64>) -> ToolOutcome<u64> {
    raw.map(|v| {
        u64::try_from(v).map_err(|_| {
            ToolError::InvalidArguments(format!("{field} must not be negative, got {v}"))
        })
    })
    .transpose()
    .map(Option::unwrap_or_default)
}

pub(crate) fn timestamp(field: &str, raw: &str) -> ToolOutcome<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ToolError::InvalidArguments(format!("{field} is not an RFC 3339 timestamp: {e}")))
}

pub(crate) fn agent(raw: String) -> ToolOutcome<AgentAddress> {
    Ok(AgentAddress::parse(raw)?)
}

pub(crate) fn intent_address(raw: String) -> ToolOutcome<IntentAddress> {
    Ok(IntentAddress::parse(raw)?)
}

pub(crate) fn intent_hash(raw: &str) -> ToolOutcome<IntentHash> {
    Ok(IntentHash::parse(raw)?)
}

/// Empty strings stand for "no value" in loosely typed callers.
pub(crate) fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_amount_is_invalid_input() {
        let err = amount("max_amount", -1).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        assert_eq!(amount("max_amount", 0).unwrap(), 0);
    }

    #[test]
    fn null_arguments_decode_as_empty_object() {
        #[derive(serde::Deserialize)]
        struct Nothing {}
        assert!(decode::<Nothing>(Value::Null).is_ok());
    }

    #[test]
    fn blank_strings_are_absent() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("tx".into())), Some("tx".into()));
    }

    #[test]
    fn counters_default_to_zero() {
        assert_eq!(counter("total_intents", None).unwrap(), 0);
        assert!(counter("total_intents", Some(-2)).is_err());
    }
}
