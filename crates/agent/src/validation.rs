//! Validate tool call arguments against a tool's JSON Schema.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Checks `type`, `required`, `enum`, nested `properties` and array `items`.
/// Unknown keywords are ignored. Returns `Err(message)` describing the first
/// violation found, naming the field by its dotted path.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if let Some(schema_type) = schema.get("type").and_then(|v| v.as_str())
        && schema_type == "object"
        && !args.is_object()
    {
        return Err(format!(
            "expected object arguments, got {}",
            json_type_name(args)
        ));
    }
    check_value(args, schema, "")
}

fn check_value(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    if !path.is_empty() {
        if let Some(expected) = schema.get("type").and_then(|t| t.as_str())
            && !value_matches_type(value, expected)
        {
            return Err(format!(
                "field '{path}' expected type '{expected}', got {}",
                json_type_name(value)
            ));
        }
        if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array())
            && !allowed.contains(value)
        {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(format!(
                "field '{path}' must be one of {}, got {value}",
                options.join(", ")
            ));
        }
    }

    match value {
        Value::Object(obj) => {
            if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
                for name in required.iter().filter_map(|f| f.as_str()) {
                    if !obj.contains_key(name) {
                        return Err(format!("missing required field '{}'", child(path, name)));
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
                for (key, field) in obj {
                    if let Some(field_schema) = properties.get(key) {
                        check_value(field, field_schema, &child(path, key))?;
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check_value(item, item_schema, &format!("{path}[{i}]"))?;
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
