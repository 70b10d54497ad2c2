//! A minimal JSON-Schema-shaped validator covering exactly the constraints
//! the tool catalog uses: required keys, `string`/`integer`/`number`/`boolean`
//! types, `enum`, `minimum`/`maximum`, and `minLength`/`maxLength`. Not a
//! general-purpose schema engine — the catalog never needs one.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

pub fn validate(schema: &Value, args: &Value) -> Result<(), SchemaViolation> {
    let object = args.as_object().cloned().unwrap_or_default();
    let args = Value::Object(object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required {
            let key = key.as_str().unwrap_or_default();
            if args.get(key).is_none() {
                return Err(SchemaViolation {
                    path: key.to_string(),
                    message: format!("missing required field `{key}`"),
                });
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, prop_schema) in properties {
            if let Some(value) = args.get(key) {
                validate_value(key, prop_schema, value)?;
            }
        }
    }

    Ok(())
}

fn validate_value(path: &str, schema: &Value, value: &Value) -> Result<(), SchemaViolation> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !matches {
            return Err(SchemaViolation {
                path: path.to_string(),
                message: format!("expected type `{expected}`, got `{value}`"),
            });
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(SchemaViolation {
                path: path.to_string(),
                message: format!("`{value}` is not one of the allowed values"),
            });
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                return Err(SchemaViolation {
                    path: path.to_string(),
                    message: format!("{n} is below the minimum of {min}"),
                });
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                return Err(SchemaViolation {
                    path: path.to_string(),
                    message: format!("{n} is above the maximum of {max}"),
                });
            }
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(min_len) = schema.get("minLength").and_then(Value::as_u64) {
            if (s.len() as u64) < min_len {
                return Err(SchemaViolation {
                    path: path.to_string(),
                    message: format!("string shorter than minLength {min_len}"),
                });
            }
        }
        if let Some(max_len) = schema.get("maxLength").and_then(Value::as_u64) {
            if (s.len() as u64) > max_len {
                return Err(SchemaViolation {
                    path: path.to_string(),
                    message: format!("string longer than maxLength {max_len}"),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["server", "command"],
            "properties": {
                "server": {"type": "string"},
                "command": {"type": "string"},
                "timeout": {"type": "integer", "minimum": 1, "maximum": 600},
            }
        })
    }

    #[test]
    fn accepts_valid_args() {
        let args = json!({"server": "h1", "command": "echo ok"});
        assert!(validate(&schema(), &args).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let args = json!({"server": "h1"});
        let err = validate(&schema(), &args).unwrap_err();
        assert_eq!(err.path, "command");
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let args = json!({"server": "h1", "command": "x", "timeout": 999});
        let err = validate(&schema(), &args).unwrap_err();
        assert_eq!(err.path, "timeout");
    }

    #[test]
    fn rejects_wrong_type() {
        let args = json!({"server": 5, "command": "x"});
        let err = validate(&schema(), &args).unwrap_err();
        assert_eq!(err.path, "server");
    }
}
