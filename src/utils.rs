//! Typed accessors over the untyped tool argument map.
//!
//! A field that is missing or carries the wrong JSON type is treated as
//! absent; only the `required` variants turn that into an error.

use serde_json::{Map, Value};

use crate::blockchain::validation::ValidationError;

/// Returns the string at `key`, or an empty string when absent or not a string.
pub fn get_string(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Returns the array at `key`, or an empty vector.
pub fn get_array(args: &Value, key: &str) -> Vec<Value> {
    args.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Returns the string elements of the array at `key`, skipping anything else.
pub fn get_string_array(args: &Value, key: &str) -> Vec<String> {
    get_array(args, key)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Returns the object at `key`, or `None` when absent or not an object.
pub fn get_object(args: &Value, key: &str) -> Option<Map<String, Value>> {
    args.get(key).and_then(Value::as_object).cloned()
}

/// Returns the string at `key`, failing with a field-scoped error when empty.
pub fn get_required_string(args: &Value, key: &str) -> Result<String, ValidationError> {
    let value = get_string(args, key);
    if value.is_empty() {
        return Err(ValidationError::required(key));
    }
    Ok(value)
}

/// Builds a query-string pair list, dropping empty values.
pub fn query_pairs<'a>(pairs: &[(&'a str, String)]) -> Vec<(&'a str, String)> {
    pairs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (*k, v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrong_types_are_absent() {
        let args = json!({"chain": 1, "name": "eth", "list": "nope", "obj": [1]});
        assert_eq!(get_string(&args, "chain"), "");
        assert_eq!(get_string(&args, "name"), "eth");
        assert_eq!(get_string(&args, "missing"), "");
        assert!(get_array(&args, "list").is_empty());
        assert!(get_object(&args, "obj").is_none());
        assert!(get_string(&Value::Null, "chain").is_empty());
    }

    #[test]
    fn string_array_skips_non_strings() {
        let args = json!({"bridges": ["hop", 3, "across", null]});
        assert_eq!(get_string_array(&args, "bridges"), vec!["hop", "across"]);
    }

    #[test]
    fn required_string_reports_field() {
        let args = json!({"token": ""});
        let err = get_required_string(&args, "token").unwrap_err();
        assert_eq!(err.to_string(), "token: is required");
    }

    #[test]
    fn query_pairs_drop_empty() {
        let pairs = query_pairs(&[("a", "1".into()), ("b", String::new())]);
        assert_eq!(pairs, vec![("a", "1".to_string())]);
    }
}
