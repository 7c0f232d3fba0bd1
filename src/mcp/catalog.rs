use crate::errors::{ErrorCode, McpError};
use crate::mcp::aliases::builtin_tool_aliases;
use crate::utils::suggest::suggest;
use jsonschema::error::{ValidationError, ValidationErrorKind};
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

/// Accepted by every tool, handled by the executor, never shown to clients.
const TRACE_FIELDS: &[&str] = &["trace_id", "span_id"];

const MAX_REPORTED_VIOLATIONS: usize = 8;

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let (Some(tool), Some(schema)) = (tool_by_name(tool_name), TOOL_VALIDATORS.get(tool_name))
    else {
        return Ok(());
    };
    let Err(errors) = schema.validate(args) else {
        return Ok(());
    };

    let known_fields: Vec<String> = tool
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();

    let mut problems = Vec::new();
    let mut guesses = Vec::new();
    for error in errors.take(MAX_REPORTED_VIOLATIONS) {
        let (problem, guess) = describe_violation(&error, args, &known_fields);
        problems.push(problem);
        guesses.extend(guess);
    }

    let header = match args.get("action").and_then(Value::as_str) {
        Some(action) => format!("Invalid arguments for {}:{}", tool_name, action),
        None => format!("Invalid arguments for {}", tool_name),
    };
    let mut lines = vec![header];
    lines.extend(problems.into_iter().map(|problem| format!("- {}", problem)));
    if !guesses.is_empty() {
        lines.push(format!("Did you mean: {}", guesses.join(" | ")));
    }
    lines.push(format!(
        "Hint: tools/list shows the input schema of {}",
        tool_name
    ));
    Err(McpError::new(ErrorCode::InvalidParams, lines.join("\n")))
}

/// One line for the violation, plus a "did you mean" guess when a close
/// field name or enum value exists.
fn describe_violation(
    error: &ValidationError<'_>,
    args: &Value,
    known_fields: &[String],
) -> (String, Option<String>) {
    let location = error.instance_path.to_string();
    let at = if location.is_empty() {
        "(root)".to_string()
    } else {
        location.clone()
    };

    match &error.kind {
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            let guesses: Vec<String> = unexpected
                .iter()
                .filter_map(|name| {
                    let close = suggest(name, known_fields, 3);
                    (!close.is_empty()).then(|| format!("'{}' -> {}", name, close.join(", ")))
                })
                .collect();
            let names: Vec<String> = unexpected.iter().map(|n| format!("'{}'", n)).collect();
            let guess = (!guesses.is_empty()).then(|| guesses.join(", "));
            (format!("{}: unknown field {}", at, names.join(", ")), guess)
        }
        ValidationErrorKind::Enum { options } => {
            let allowed: Vec<String> = options
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            let received = args
                .pointer(&location)
                .and_then(Value::as_str)
                .unwrap_or("");
            let close = suggest(received, &allowed, 3);
            let guess = (!close.is_empty()).then(|| format!("{}: {}", at, close.join(", ")));
            (format!("{}: expected one of {}", at, allowed.join(", ")), guess)
        }
        _ => (format!("{}: {}", at, error), None),
    }
}

/// Rewrites `"type": [..]` unions as `anyOf`, which some clients require.
fn expand_type_unions(schema: &Value) -> Value {
    match schema {
        Value::Array(items) => Value::Array(items.iter().map(expand_type_unions).collect()),
        Value::Object(map) => {
            let mut out: Map<String, Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), expand_type_unions(value)))
                .collect();
            let union = match out.get("type") {
                Some(Value::Array(types)) => Some(types.clone()),
                _ => None,
            };
            if let Some(types) = union {
                out.remove("type");
                let items = out.remove("items").unwrap_or_else(|| Value::Object(Map::new()));
                let variants = types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|kind| match kind {
                        "array" => serde_json::json!({"type": "array", "items": items.clone()}),
                        other => serde_json::json!({"type": other}),
                    })
                    .collect();
                out.insert("anyOf".to_string(), Value::Array(variants));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn listed_schema(schema: &Value) -> Value {
    let mut listed = expand_type_unions(schema);
    if let Some(props) = listed.get_mut("properties").and_then(Value::as_object_mut) {
        for field in TRACE_FIELDS {
            props.remove(*field);
        }
    }
    listed
}

/// Catalog tools plus one entry per builtin alias.
pub fn list_tools() -> Vec<ToolDef> {
    let mut tools: Vec<ToolDef> = TOOL_CATALOG
        .iter()
        .map(|tool| ToolDef {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: listed_schema(&tool.input_schema),
        })
        .collect();

    let mut names: HashSet<String> = tools.iter().map(|tool| tool.name.clone()).collect();
    for (alias, target) in builtin_tool_aliases().iter() {
        if names.contains(*alias) {
            continue;
        }
        let Some(schema) = tools
            .iter()
            .find(|tool| tool.name == *target)
            .map(|tool| tool.input_schema.clone())
        else {
            continue;
        };
        tools.push(ToolDef {
            name: (*alias).to_string(),
            description: format!("Alias for {}.", target),
            input_schema: schema,
        });
        names.insert((*alias).to_string());
    }

    tools
}
