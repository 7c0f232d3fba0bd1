use super::matcher::{find_definition, match_in_definition, MatchRule, OptionMatch};
use super::model::{
    BatchUpdateOutcome, FieldDefinition, FieldEntry, FieldError, FieldInput, FieldKey,
    FieldUpdate, FieldValueSnapshot, ResolutionSource, UpdateValue,
};
use super::resolver::resolve;
use serde::Serialize;

const UNSET_FIELD_HINT: &str = "Fields that were never filled in on this entity cannot be found by name; pass the numeric field id instead (see action=catalog).";

/// How the builder obtained a field id for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldIdOrigin {
    IdLiteral,
    MatchedByName,
    MatchedByCode,
    NumericFallback,
}

impl From<ResolutionSource> for FieldIdOrigin {
    fn from(source: ResolutionSource) -> Self {
        match source {
            ResolutionSource::IdLiteral => FieldIdOrigin::IdLiteral,
            ResolutionSource::MatchedByName => FieldIdOrigin::MatchedByName,
            ResolutionSource::MatchedByCode => FieldIdOrigin::MatchedByCode,
        }
    }
}

/// Per-entry trace of a successful resolution, reported by dry runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDecision {
    pub field: String,
    pub field_id: i64,
    pub origin: FieldIdOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_rule: Option<MatchRule>,
}

/// Everything decided for one batch before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    pub outcome: BatchUpdateOutcome,
    pub payload: Vec<FieldUpdate>,
    pub decisions: Vec<FieldDecision>,
}

/// Resolves and matches every entry in caller order.
///
/// Each entry yields exactly one payload element or one error. Nothing here
/// touches the network.
pub fn build(
    entries: &[FieldEntry],
    snapshot: &FieldValueSnapshot,
    catalog: &[FieldDefinition],
) -> BatchPlan {
    let mut plan = BatchPlan::default();

    for entry in entries {
        let label = entry.key.label();
        let (field_id, origin) = match resolve(&entry.key, snapshot) {
            Some(resolved) => (resolved.field_id, FieldIdOrigin::from(resolved.source)),
            None => match numeric_fallback(&entry.key) {
                Some(field_id) => (field_id, FieldIdOrigin::NumericFallback),
                None => {
                    plan.outcome.record_error(
                        FieldError::new(&label, format!("Field not found: {}", label))
                            .with_hint(UNSET_FIELD_HINT),
                    );
                    continue;
                }
            },
        };

        match build_values(field_id, &entry.value, catalog) {
            Ok((values, match_rule)) => {
                plan.payload.push(FieldUpdate { field_id, values });
                plan.outcome.record_resolved();
                plan.decisions.push(FieldDecision {
                    field: label,
                    field_id,
                    origin,
                    match_rule,
                });
            }
            Err(message) => plan.outcome.record_error(FieldError::new(label, message)),
        }
    }

    plan
}

/// Second chance for keys the snapshot could not place: any number, even one
/// written as `501.0`, is taken as a literal id.
fn numeric_fallback(key: &FieldKey) -> Option<i64> {
    let FieldKey::Text(text) = key else {
        return None;
    };
    let parsed = text.trim().parse::<f64>().ok()?;
    if !parsed.is_finite() || parsed.fract() != 0.0 || parsed < 1.0 || parsed > i64::MAX as f64 {
        return None;
    }
    Some(parsed as i64)
}

fn build_values(
    field_id: i64,
    input: &FieldInput,
    catalog: &[FieldDefinition],
) -> Result<(Vec<UpdateValue>, Option<MatchRule>), String> {
    let definition = find_definition(field_id, catalog).filter(|d| d.is_enumerated());
    let Some(definition) = definition else {
        let values = match input {
            FieldInput::Text(text) => vec![plain(text)],
            FieldInput::List(items) => items.iter().map(|item| plain(item)).collect(),
        };
        return Ok((values, None));
    };

    let raw_values: Vec<&String> = match input {
        FieldInput::Text(text) => vec![text],
        FieldInput::List(items) => items.iter().collect(),
    };
    if raw_values.len() > 1 && !definition.is_multiselect() {
        return Err(format!(
            "Select field '{}' accepts a single option, got {} values",
            definition.display_name(),
            raw_values.len()
        ));
    }

    let mut values = Vec::with_capacity(raw_values.len());
    let mut loosest: Option<MatchRule> = None;
    for raw in raw_values {
        match match_in_definition(definition, raw) {
            OptionMatch::Matched(found) => {
                loosest = Some(match loosest {
                    Some(rule) if rule_rank(rule) >= rule_rank(found.rule) => rule,
                    _ => found.rule,
                });
                values.push(UpdateValue {
                    value: found.value,
                    enum_id: Some(found.enum_id),
                });
            }
            OptionMatch::NoMatch {
                field_name,
                suggestions,
            } => return Err(no_match_message(raw, &field_name, &suggestions)),
            OptionMatch::NotEnumerated => values.push(plain(raw)),
        }
    }
    Ok((values, loosest))
}

fn plain(text: &str) -> UpdateValue {
    UpdateValue {
        value: text.to_string(),
        enum_id: None,
    }
}

fn rule_rank(rule: MatchRule) -> usize {
    super::matcher::cascade()
        .iter()
        .position(|step| step.rule == rule)
        .unwrap_or(usize::MAX)
}

fn no_match_message(raw: &str, field_name: &str, suggestions: &[String]) -> String {
    let options = if suggestions.is_empty() {
        "(none defined)".to_string()
    } else {
        suggestions.join(", ")
    };
    format!(
        "Value '{}' is not valid for select field '{}'. Valid options include: {}",
        raw, field_name, options
    )
}
