//! Subscription filter evaluation.
//!
//! A filter condition is a JSON object mapping field paths (dotted for
//! nesting) to an expectation: either a bare value compared for
//! equality, or an operator object `{"op": "...", "value": ...}`.
//! A payload field that is absent makes the condition fail - it is
//! never an error.

use serde_json::Value;

use crate::error::{Result, WebhookError};

const OPERATORS: &[&str] = &["eq", "ne", "gt", "gte", "lt", "lte", "in", "contains"];

/// Evaluate a filter condition against an event payload.
///
/// `None` matches everything. All entries of the condition must hold
/// (conjunction).
pub fn matches(condition: Option<&Value>, payload: &Value) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    let Some(entries) = condition.as_object() else {
        // Malformed conditions never match; creation-time validation
        // should have rejected them.
        return false;
    };

    entries.iter().all(|(path, expected)| {
        match lookup(payload, path) {
            Some(actual) => entry_matches(expected, actual),
            None => false,
        }
    })
}

/// Validate a condition's shape so configuration errors surface to the
/// management API caller instead of silently never matching.
pub fn validate(condition: &Value) -> Result<()> {
    let entries = condition
        .as_object()
        .ok_or_else(|| WebhookError::invalid_filter("condition must be a JSON object"))?;

    for (path, expected) in entries {
        if path.is_empty() {
            return Err(WebhookError::invalid_filter("empty field path"));
        }
        if let Some(op_obj) = operator_entry(expected) {
            let (op, value) = op_obj;
            if !OPERATORS.contains(&op) {
                return Err(WebhookError::invalid_filter(format!(
                    "unknown operator '{}' for field '{}'",
                    op, path
                )));
            }
            if op == "in" && !value.is_array() {
                return Err(WebhookError::invalid_filter(format!(
                    "operator 'in' for field '{}' requires an array value",
                    path
                )));
            }
        }
    }
    Ok(())
}

/// Resolve a dotted field path inside a payload object.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Split an expectation into (op, value) when it is an operator object.
fn operator_entry(expected: &Value) -> Option<(&str, &Value)> {
    let obj = expected.as_object()?;
    let op = obj.get("op")?.as_str()?;
    Some((op, obj.get("value").unwrap_or(&Value::Null)))
}

fn entry_matches(expected: &Value, actual: &Value) -> bool {
    match operator_entry(expected) {
        Some((op, value)) => apply_operator(op, value, actual),
        None => expected == actual,
    }
}

fn apply_operator(op: &str, expected: &Value, actual: &Value) -> bool {
    match op {
        "eq" => actual == expected,
        "ne" => actual != expected,
        "gt" => compare(actual, expected).map(|o| o == std::cmp::Ordering::Greater).unwrap_or(false),
        "gte" => compare(actual, expected).map(|o| o != std::cmp::Ordering::Less).unwrap_or(false),
        "lt" => compare(actual, expected).map(|o| o == std::cmp::Ordering::Less).unwrap_or(false),
        "lte" => compare(actual, expected).map(|o| o != std::cmp::Ordering::Greater).unwrap_or(false),
        "in" => expected
            .as_array()
            .map(|candidates| candidates.contains(actual))
            .unwrap_or(false),
        "contains" => contains(actual, expected),
        _ => false,
    }
}

/// Order two values when both are numbers or both are strings.
fn compare(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) {
        return Some(a.cmp(b));
    }
    None
}

/// `contains` matches substrings of string fields and members of array fields.
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => expected.as_str().map(|needle| s.contains(needle)).unwrap_or(false),
        Value::Array(items) => items.contains(expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_condition_matches_everything() {
        assert!(matches(None, &json!({"level": "INFO"})));
    }

    #[test]
    fn test_equality_match() {
        let cond = json!({"level": "ERROR"});
        assert!(matches(Some(&cond), &json!({"level": "ERROR"})));
        assert!(!matches(Some(&cond), &json!({"level": "INFO"})));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let cond = json!({"level": "ERROR"});
        assert!(!matches(Some(&cond), &json!({"message": "boom"})));
        assert!(!matches(Some(&cond), &json!(null)));
    }

    #[test]
    fn test_dotted_path_traversal() {
        let cond = json!({"meta.region": "eu-west-1"});
        assert!(matches(Some(&cond), &json!({"meta": {"region": "eu-west-1"}})));
        assert!(!matches(Some(&cond), &json!({"meta": {"region": "us-east-1"}})));
        assert!(!matches(Some(&cond), &json!({"meta": "eu-west-1"})));
    }

    #[test]
    fn test_numeric_comparison_operators() {
        let cond = json!({"count": {"op": "gte", "value": 10}});
        assert!(matches(Some(&cond), &json!({"count": 10})));
        assert!(matches(Some(&cond), &json!({"count": 11.5})));
        assert!(!matches(Some(&cond), &json!({"count": 9})));
        assert!(!matches(Some(&cond), &json!({"count": "ten"})));
    }

    #[test]
    fn test_in_operator() {
        let cond = json!({"level": {"op": "in", "value": ["ERROR", "CRITICAL"]}});
        assert!(matches(Some(&cond), &json!({"level": "CRITICAL"})));
        assert!(!matches(Some(&cond), &json!({"level": "INFO"})));
    }

    #[test]
    fn test_contains_operator() {
        let cond = json!({"message": {"op": "contains", "value": "timeout"}});
        assert!(matches(Some(&cond), &json!({"message": "request timeout after 5s"})));
        assert!(!matches(Some(&cond), &json!({"message": "connection refused"})));

        let cond = json!({"tags": {"op": "contains", "value": "billing"}});
        assert!(matches(Some(&cond), &json!({"tags": ["auth", "billing"]})));
    }

    #[test]
    fn test_conjunction_of_entries() {
        let cond = json!({"level": "ERROR", "source": "billing"});
        assert!(matches(Some(&cond), &json!({"level": "ERROR", "source": "billing"})));
        assert!(!matches(Some(&cond), &json!({"level": "ERROR", "source": "auth"})));
    }

    #[test]
    fn test_validate_rejects_unknown_operator() {
        assert!(validate(&json!({"level": {"op": "like", "value": "x"}})).is_err());
        assert!(validate(&json!({"level": {"op": "in", "value": "not-an-array"}})).is_err());
        assert!(validate(&json!(["not", "an", "object"])).is_err());
        assert!(validate(&json!({"level": "ERROR"})).is_ok());
        assert!(validate(&json!({"count": {"op": "gt", "value": 5}})).is_ok());
    }
}
