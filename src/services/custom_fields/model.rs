use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Kommo entity collections that carry custom fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Leads,
    Contacts,
    Companies,
    Customers,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Leads,
        EntityKind::Contacts,
        EntityKind::Companies,
        EntityKind::Customers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Leads => "leads",
            EntityKind::Contacts => "contacts",
            EntityKind::Companies => "companies",
            EntityKind::Customers => "customers",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "leads" | "lead" => Some(EntityKind::Leads),
            "contacts" | "contact" => Some(EntityKind::Contacts),
            "companies" | "company" => Some(EntityKind::Companies),
            "customers" | "customer" => Some(EntityKind::Customers),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied handle for a field: a numeric id or a name/code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    Id(i64),
    Text(String),
}

impl FieldKey {
    pub fn label(&self) -> String {
        match self {
            FieldKey::Id(id) => id.to_string(),
            FieldKey::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Id(id) => write!(f, "{}", id),
            FieldKey::Text(text) => f.write_str(text),
        }
    }
}

/// Raw value for one field as the caller wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub key: FieldKey,
    pub value: FieldInput,
}

impl FieldEntry {
    pub fn new(key: FieldKey, value: FieldInput) -> Self {
        Self { key, value }
    }

    pub fn text(key: &str, value: &str) -> Self {
        Self::new(FieldKey::Text(key.to_string()), FieldInput::Text(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    IdLiteral,
    MatchedByName,
    MatchedByCode,
}

/// A field key pinned to a concrete CRM field id. `field_id` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub field_id: i64,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_code: Option<String>,
}

/// One entry of an entity's `custom_fields_values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulatedField {
    pub field_id: i64,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub field_code: Option<String>,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: Vec<StoredValue>,
}

/// Custom fields that currently hold a value on one entity.
///
/// Kommo only reports fields that were set at least once, so a field that
/// exists in the catalog but was never filled in is absent here. Lookups
/// against the snapshot must treat a miss as normal, not as proof that the
/// field does not exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldValueSnapshot {
    fields: Vec<PopulatedField>,
}

impl FieldValueSnapshot {
    pub fn new(fields: Vec<PopulatedField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[PopulatedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Lowercased field name to id. First occurrence wins on duplicate names.
    pub fn name_index(&self) -> HashMap<String, i64> {
        let mut index = HashMap::new();
        for field in &self.fields {
            if let Some(name) = field.field_name.as_deref() {
                index
                    .entry(name.trim().to_lowercase())
                    .or_insert(field.field_id);
            }
        }
        index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    #[serde(rename = "id")]
    pub enum_id: i64,
    pub value: String,
    #[serde(rename = "sort", default)]
    pub sort_order: i64,
}

/// Catalog entry for one custom field of an entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(rename = "enums", default, deserialize_with = "null_as_empty")]
    pub enum_options: Vec<EnumOption>,
}

impl FieldDefinition {
    pub fn is_enumerated(&self) -> bool {
        matches!(self.field_type.as_str(), "select" | "multiselect")
    }

    pub fn is_multiselect(&self) -> bool {
        self.field_type == "multiselect"
    }

    /// Options ordered by their catalog sort key; ties keep catalog order.
    pub fn sorted_options(&self) -> Vec<&EnumOption> {
        let mut options: Vec<&EnumOption> = self.enum_options.iter().collect();
        options.sort_by_key(|option| option.sort_order);
        options
    }

    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_id: Option<i64>,
}

/// One element of the `custom_fields_values` array sent in the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    pub field_id: i64,
    pub values: Vec<UpdateValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Per-batch tally: every input key lands either in `resolved_count` or in
/// `errors`, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchUpdateOutcome {
    resolved_count: usize,
    errors: Vec<FieldError>,
}

impl BatchUpdateOutcome {
    pub(crate) fn record_resolved(&mut self) {
        self.resolved_count += 1;
    }

    pub(crate) fn record_error(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved_count
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

/// Result of the agent-facing update operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub success: bool,
    pub updated_fields: usize,
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
