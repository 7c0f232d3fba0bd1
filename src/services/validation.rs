use crate::errors::ToolError;
use crate::services::custom_fields::{EntityKind, FieldEntry, FieldInput, FieldKey};
use serde_json::Value;

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_bool(
        &self,
        value: Option<&Value>,
        label: &str,
        fallback: bool,
    ) -> Result<bool, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(fallback),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(_) => Err(ToolError::invalid_params(format!(
                "{} must be a boolean",
                label
            ))),
        }
    }

    /// Accepts a positive integer or a string holding one.
    pub fn ensure_positive_id(&self, value: Option<&Value>, label: &str) -> Result<i64, ToolError> {
        let invalid = || ToolError::invalid_params(format!("{} must be a positive integer", label));
        let value = value.ok_or_else(invalid)?;
        let numeric = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
            .ok_or_else(invalid)?;
        if numeric <= 0 {
            return Err(invalid());
        }
        Ok(numeric)
    }

    pub fn ensure_entity_kind(&self, value: Option<&Value>) -> Result<EntityKind, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(EntityKind::Leads);
        };
        let raw = self.ensure_string(value, "entity", true)?;
        EntityKind::parse(&raw).ok_or_else(|| {
            let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
            ToolError::invalid_params(format!("Unsupported entity: {}", raw))
                .with_hint(format!("Use one of: {}", known.join(", ")))
        })
    }

    /// Field entries in caller order, from either `{key: value}` or
    /// `[{field, value}]`.
    pub fn ensure_field_entries(&self, value: Option<&Value>) -> Result<Vec<FieldEntry>, ToolError> {
        let Some(value) = value else {
            return Err(ToolError::invalid_params("fields is required"));
        };
        let entries = match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, raw)| {
                    let input = self.ensure_field_input(raw, key)?;
                    Ok(FieldEntry::new(FieldKey::Text(key.clone()), input))
                })
                .collect::<Result<Vec<_>, ToolError>>()?,
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| self.ensure_field_item(item, idx))
                .collect::<Result<Vec<_>, ToolError>>()?,
            _ => {
                return Err(ToolError::invalid_params(
                    "fields must be an object or an array of {field, value}",
                ))
            }
        };
        if entries.is_empty() {
            return Err(ToolError::invalid_params("fields must not be empty"));
        }
        Ok(entries)
    }

    fn ensure_field_item(&self, item: &Value, idx: usize) -> Result<FieldEntry, ToolError> {
        let label = format!("fields[{}]", idx);
        let obj = item
            .as_object()
            .ok_or_else(|| ToolError::invalid_params(format!("{} must be an object", label)))?;
        let key_value = obj
            .get("field")
            .or_else(|| obj.get("field_id"))
            .ok_or_else(|| ToolError::invalid_params(format!("{}.field is required", label)))?;
        let key = match key_value {
            Value::Number(number) => number
                .as_i64()
                .map(FieldKey::Id)
                .ok_or_else(|| {
                    ToolError::invalid_params(format!("{}.field must be an integer id", label))
                })?,
            Value::String(text) => FieldKey::Text(text.clone()),
            _ => {
                return Err(ToolError::invalid_params(format!(
                    "{}.field must be a string or an integer id",
                    label
                )))
            }
        };
        let raw = obj
            .get("value")
            .ok_or_else(|| ToolError::invalid_params(format!("{}.value is required", label)))?;
        let input = self.ensure_field_input(raw, &key.label())?;
        Ok(FieldEntry::new(key, input))
    }

    fn ensure_field_input(&self, raw: &Value, field: &str) -> Result<FieldInput, ToolError> {
        let unsupported = || {
            ToolError::invalid_params(format!(
                "Unsupported value for field '{}': expected a string, number, boolean or array of them",
                field
            ))
        };
        match raw {
            Value::Array(items) if items.is_empty() => Err(ToolError::invalid_params(format!(
                "fields value for '{}' must not be an empty array",
                field
            ))),
            Value::Array(items) => items
                .iter()
                .map(|item| scalar_text(item).ok_or_else(unsupported))
                .collect::<Result<Vec<_>, ToolError>>()
                .map(FieldInput::List),
            other => scalar_text(other).map(FieldInput::Text).ok_or_else(unsupported),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
