//! Conversions between runtime values and JSON.
//!
//! Stored rows arrive as JSON from the data store and leave as JSON when a
//! script result is rendered. Tables whose entries all live in the array
//! part become JSON arrays; everything else becomes an object.

use serde_json::{Map, Number, Value as JsonValue};

use crate::runtime::RuntimeError;
use crate::value::{LuaKey, LuaTable, LuaValue};

/// Build a runtime value from stored JSON.
pub fn to_lua(json: &JsonValue) -> LuaValue {
    match json {
        JsonValue::Null => LuaValue::Nil,
        JsonValue::Bool(b) => LuaValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                LuaValue::Int(i)
            } else {
                LuaValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => LuaValue::str(s.clone()),
        JsonValue::Array(items) => {
            let mut table = LuaTable::new();
            for item in items {
                table.push(to_lua(item));
            }
            LuaValue::table(table)
        }
        JsonValue::Object(fields) => {
            let mut table = LuaTable::new();
            for (key, value) in fields {
                table.set_str(key, to_lua(value));
            }
            LuaValue::table(table)
        }
    }
}

/// Render a runtime value as JSON. Functions and host objects have no JSON
/// form and error out.
pub fn to_json(value: &LuaValue) -> Result<JsonValue, RuntimeError> {
    match value {
        LuaValue::Nil => Ok(JsonValue::Null),
        LuaValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
        LuaValue::Int(n) => Ok(JsonValue::Number(Number::from(*n))),
        LuaValue::Float(n) => Ok(Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        LuaValue::Str(s) => Ok(JsonValue::String(s.clone())),
        LuaValue::Table(t) => {
            let table = t.borrow();
            if table.is_array() {
                let mut items = Vec::new();
                for item in table.array_values() {
                    items.push(to_json(&item)?);
                }
                Ok(JsonValue::Array(items))
            } else {
                let mut fields = Map::new();
                for (key, value) in table.entries() {
                    let key = match key {
                        LuaKey::Str(s) => s,
                        LuaKey::Int(n) => n.to_string(),
                        LuaKey::Bool(b) => b.to_string(),
                    };
                    fields.insert(key, to_json(&value)?);
                }
                Ok(JsonValue::Object(fields))
            }
        }
        other => Err(RuntimeError::type_error(format!(
            "cannot serialize a {} value to JSON",
            other.type_name()
        ))),
    }
}

/// Pretty-printed JSON rendering, for CLI output.
pub fn to_json_pretty(value: &LuaValue) -> Result<String, RuntimeError> {
    let json = to_json(value)?;
    serde_json::to_string_pretty(&json)
        .map_err(|e| RuntimeError::type_error(format!("JSON rendering failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_object() {
        let json = json!({"name": "x", "tags": ["a", "b"], "count": 3});
        let value = to_lua(&json);
        assert_eq!(to_json(&value).unwrap(), json);
    }

    #[test]
    fn test_array_table_becomes_json_array() {
        let mut t = LuaTable::new();
        t.push(LuaValue::Int(1));
        t.push(LuaValue::Int(2));
        assert_eq!(to_json(&LuaValue::table(t)).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_integer_subtype_survives() {
        assert_eq!(to_lua(&json!(3)), LuaValue::Int(3));
        assert_eq!(to_lua(&json!(3.5)), LuaValue::Float(3.5));
    }

    #[test]
    fn test_function_is_not_serializable() {
        let f = LuaValue::host_fn("f", |_| Ok(Vec::new()));
        assert!(to_json(&f).is_err());
    }
}
