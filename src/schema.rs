//! Provider-safe JSON Schema shaping and structured-output validation.
//!
//! Providers disagree about which JSON Schema keywords their structured
//! output modes accept. The shaping helpers here rewrite one caller-supplied
//! schema into each provider's dialect; [`coerce_output`] validates the
//! provider's reply against the original schema.

use serde_json::{Map, Value, json};

use crate::error::PromptError;

/// Keywords Anthropic output schemas currently reject.
const ANTHROPIC_UNSUPPORTED_KEYS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minItems",
    "maxItems",
    "uniqueItems",
];

fn is_objectish(node: &Map<String, Value>) -> bool {
    let is_object = match node.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => false,
    };
    is_object
        || ["properties", "required", "patternProperties", "additionalProperties"]
            .iter()
            .any(|key| node.contains_key(*key))
}

/// Set `additionalProperties: false` on all object-like schema nodes.
pub fn enforce_closed_objects(schema: &Value) -> Value {
    let mut normalized = schema.clone();
    walk_objects(&mut normalized, &mut |node| {
        if is_objectish(node) {
            node.insert("additionalProperties".into(), Value::Bool(false));
        }
    });
    normalized
}

/// Remove unsupported JSON Schema keywords recursively.
pub fn strip_schema_keywords(schema: &Value, keys: &[&str]) -> Value {
    let mut normalized = schema.clone();
    walk_objects(&mut normalized, &mut |node| {
        for key in keys {
            node.remove(*key);
        }
    });
    normalized
}

/// OpenAI strict mode requires every object property to be listed in
/// `required`; properties the caller left optional are rewritten as nullable
/// via `anyOf` with `{"type": "null"}`, since strict mode rejects
/// `type: [t, "null"]`.
pub fn enforce_required_all_properties(schema: &Value) -> Value {
    let mut normalized = schema.clone();
    walk_objects(&mut normalized, &mut |node| {
        if !is_objectish(node) {
            return;
        }
        let Some(Value::Object(properties)) = node.get("properties").cloned() else {
            // OpenAI wants a `required` array even without properties.
            node.entry("required".to_string())
                .or_insert_with(|| Value::Array(vec![]));
            return;
        };

        let required: Vec<String> = match node.get("required") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let mut rewritten = properties.clone();
        for (key, prop) in &properties {
            if !required.contains(key) {
                rewritten.insert(key.clone(), make_nullable(prop));
            }
        }

        let all_keys: Vec<Value> = rewritten.keys().cloned().map(Value::String).collect();
        node.insert("properties".into(), Value::Object(rewritten));
        node.insert("required".into(), Value::Array(all_keys));
    });
    normalized
}

/// Return a schema variant that also accepts `null`.
fn make_nullable(schema: &Value) -> Value {
    let Value::Object(node) = schema else {
        return json!({"anyOf": [schema, {"type": "null"}]});
    };

    match node.get("type") {
        Some(Value::String(t)) if t == "null" => return schema.clone(),
        Some(Value::Array(types)) if types.iter().any(|t| t == "null") => return schema.clone(),
        _ => {}
    }

    if let Some(Value::Array(any_of)) = node.get("anyOf") {
        let mut any_of = any_of.clone();
        if !any_of
            .iter()
            .any(|item| item.get("type").is_some_and(|t| t == "null"))
        {
            any_of.push(json!({"type": "null"}));
        }
        let mut out = node.clone();
        out.insert("anyOf".into(), Value::Array(any_of));
        return Value::Object(out);
    }

    if let Some(Value::Array(one_of)) = node.get("oneOf") {
        let mut any_of = one_of.clone();
        if !any_of
            .iter()
            .any(|item| item.get("type").is_some_and(|t| t == "null"))
        {
            any_of.push(json!({"type": "null"}));
        }
        let mut out = node.clone();
        out.remove("oneOf");
        out.insert("anyOf".into(), Value::Array(any_of));
        return Value::Object(out);
    }

    match node.get("type").cloned() {
        Some(Value::String(t)) => {
            let mut out = node.clone();
            out.remove("type");
            out.insert(
                "anyOf".into(),
                json!([{"type": t}, {"type": "null"}]),
            );
            Value::Object(out)
        }
        Some(Value::Array(types)) => {
            let mut variants: Vec<Value> = types
                .into_iter()
                .filter(|t| t != "null")
                .map(|t| json!({"type": t}))
                .collect();
            variants.push(json!({"type": "null"}));
            let mut out = node.clone();
            out.remove("type");
            out.insert("anyOf".into(), Value::Array(variants));
            Value::Object(out)
        }
        _ => json!({"anyOf": [schema, {"type": "null"}]}),
    }
}

/// Strict-schema payload for the OpenAI Responses API.
pub fn openai_response_schema(schema: &Value) -> Value {
    let shaped = enforce_closed_objects(schema);
    let shaped = enforce_required_all_properties(&shaped);
    // Strict mode rejects `default` and `title`; strip those last.
    strip_schema_keywords(&shaped, &["default", "title"])
}

/// Output schema compatible with Anthropic `output_config` constraints.
pub fn anthropic_response_schema(schema: &Value) -> Value {
    strip_schema_keywords(&enforce_closed_objects(schema), ANTHROPIC_UNSUPPORTED_KEYS)
}

/// JSON Schema payload for Perplexity structured responses.
pub fn perplexity_response_schema(schema: &Value) -> Value {
    enforce_closed_objects(schema)
}

/// Validate the provider's reply against the caller's schema and return the
/// parsed value. The reply may wrap the JSON in prose; the first parseable
/// JSON object/array is used.
pub fn coerce_output(text: &str, schema: &Value) -> Result<Value, PromptError> {
    let candidate = extract_candidate_json(text).ok_or_else(|| PromptError::OutputValidation {
        message: "could not find a JSON object/array in the model output".into(),
        raw: text.to_string(),
    })?;

    let validator = jsonschema::validator_for(schema).map_err(|e| PromptError::OutputValidation {
        message: format!("output schema is not a valid JSON Schema: {e}"),
        raw: text.to_string(),
    })?;

    if let Err(error) = validator.validate(&candidate) {
        return Err(PromptError::OutputValidation {
            message: error.to_string(),
            raw: text.to_string(),
        });
    }
    Ok(candidate)
}

/// Find the first parseable JSON object or array inside free-form text.
fn extract_candidate_json(text: &str) -> Option<Value> {
    let stripped = text.trim();
    if stripped.is_empty() {
        return None;
    }

    if (stripped.starts_with('{') && stripped.ends_with('}'))
        || (stripped.starts_with('[') && stripped.ends_with(']'))
    {
        if let Ok(value) = serde_json::from_str(stripped) {
            return Some(value);
        }
    }

    for (idx, ch) in stripped.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&stripped[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
    }
    None
}

fn walk_objects(value: &mut Value, visit: &mut impl FnMut(&mut Map<String, Value>)) {
    match value {
        Value::Object(map) => {
            visit(map);
            for child in map.values_mut() {
                walk_objects(child, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_objects(item, visit);
            }
        }
        _ => {}
    }
}
