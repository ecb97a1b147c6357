//! Rewrites tool argument schemas into the type vocabulary Gemini accepts.

use serde_json::{Map, Value};

/// Gemini's name for a primitive type tag, if the tag needs translating.
fn gemini_type(tag: &str) -> Option<&'static str> {
    match tag {
        "str" => Some("string"),
        "int" => Some("integer"),
        "float" => Some("number"),
        "bool" => Some("boolean"),
        _ => None,
    }
}

/// Normalize every property schema in a `properties` mapping.
///
/// Recurses into nested `properties` and array `items`. Unknown or already
/// correct types pass through, so applying this twice equals applying it once.
pub fn normalize_properties(properties: &Map<String, Value>) -> Map<String, Value> {
    properties
        .iter()
        .map(|(name, schema)| (name.clone(), normalize_schema(schema)))
        .collect()
}

/// Normalize a parameters object (`{"type": "object", "properties": {...}}`).
pub fn normalize_parameters(parameters: &Value) -> Value {
    let mut parameters = parameters.clone();
    if let Some(Value::Object(properties)) = parameters.get_mut("properties") {
        *properties = normalize_properties(properties);
    }
    parameters
}

fn normalize_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut map = map.clone();
    if let Some(mapped) = map
        .get("type")
        .and_then(Value::as_str)
        .and_then(gemini_type)
    {
        map.insert("type".to_string(), Value::String(mapped.to_string()));
    }
    if let Some(Value::Object(nested)) = map.get_mut("properties") {
        *nested = normalize_properties(nested);
    }
    if let Some(items) = map.get_mut("items") {
        *items = normalize_schema(items);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_primitive_types_translated() {
        let normalized = normalize_properties(&props(json!({
            "url": {"type": "str", "description": "Page URL"},
            "limit": {"type": "int"},
            "ratio": {"type": "float"},
            "verbose": {"type": "bool"}
        })));

        assert_eq!(normalized["url"], json!({"type": "string", "description": "Page URL"}));
        assert_eq!(normalized["limit"]["type"], "integer");
        assert_eq!(normalized["ratio"]["type"], "number");
        assert_eq!(normalized["verbose"]["type"], "boolean");
    }

    #[test]
    fn test_nested_properties_and_items() {
        let normalized = normalize_properties(&props(json!({
            "filter": {
                "type": "object",
                "properties": {"site": {"type": "str"}}
            },
            "tags": {"type": "array", "items": {"type": "str"}}
        })));

        assert_eq!(normalized["filter"]["properties"]["site"]["type"], "string");
        assert_eq!(normalized["filter"]["type"], "object");
        assert_eq!(normalized["tags"]["items"]["type"], "string");
    }

    #[test]
    fn test_unknown_types_and_non_objects_pass_through() {
        let input = props(json!({
            "payload": {"type": "dict"},
            "raw": "string",
            "n": 3
        }));
        assert_eq!(normalize_properties(&input), input);
    }

    #[test]
    fn test_idempotent() {
        let input = props(json!({
            "query": {"type": "str"},
            "opts": {"type": "object", "properties": {"n": {"type": "int"}, "deep": {"type": "object", "properties": {"b": {"type": "bool"}}}}},
            "list": {"type": "array", "items": {"type": "float"}},
            "already": {"type": "string"}
        }));
        let once = normalize_properties(&input);
        let twice = normalize_properties(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_parameters() {
        let params = json!({"type": "object", "properties": {"q": {"type": "str"}}, "required": ["q"]});
        assert_eq!(
            normalize_parameters(&params),
            json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]})
        );
        assert_eq!(normalize_parameters(&json!({"type": "object"})), json!({"type": "object"}));
    }
}
