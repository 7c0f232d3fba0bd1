use super::model::{EnumOption, FieldDefinition};
use crate::constants::matching::{MAX_SUGGESTIONS, NOISE_TOKEN_MAX_LEN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NON_WORD_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s]+").expect("valid non-word pattern"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    NormalizedExact,
    Substring,
    NormalizedSubstring,
    WordSubset,
}

impl MatchRule {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchRule::Exact => "exact",
            MatchRule::NormalizedExact => "normalized_exact",
            MatchRule::Substring => "substring",
            MatchRule::NormalizedSubstring => "normalized_substring",
            MatchRule::WordSubset => "word_subset",
        }
    }
}

/// One rung of the cascade: both sides go through `normalize`, then `accepts`
/// compares (input, option).
pub struct CascadeStep {
    pub rule: MatchRule,
    normalize: fn(&str) -> String,
    accepts: fn(&str, &str) -> bool,
}

impl CascadeStep {
    pub fn applies(&self, input: &str, option: &str) -> bool {
        (self.accepts)(&(self.normalize)(input), &(self.normalize)(option))
    }
}

/// Strictest first. Each step is tried against every option before the next
/// step runs.
static CASCADE: [CascadeStep; 5] = [
    CascadeStep {
        rule: MatchRule::Exact,
        normalize: fold_case,
        accepts: equals,
    },
    CascadeStep {
        rule: MatchRule::NormalizedExact,
        normalize: normalize_text,
        accepts: equals,
    },
    CascadeStep {
        rule: MatchRule::Substring,
        normalize: fold_case,
        accepts: contains_either,
    },
    CascadeStep {
        rule: MatchRule::NormalizedSubstring,
        normalize: normalize_text,
        accepts: contains_either,
    },
    CascadeStep {
        rule: MatchRule::WordSubset,
        normalize: normalize_text,
        accepts: all_tokens_contained,
    },
];

pub fn cascade() -> &'static [CascadeStep] {
    &CASCADE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedOption {
    pub enum_id: i64,
    pub value: String,
    pub rule: MatchRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionMatch {
    Matched(MatchedOption),
    NoMatch {
        field_name: String,
        suggestions: Vec<String>,
    },
    NotEnumerated,
}

pub fn find_definition(field_id: i64, catalog: &[FieldDefinition]) -> Option<&FieldDefinition> {
    catalog.iter().find(|definition| definition.id == field_id)
}

/// Matches free text against the options of an enumerated field.
///
/// Fields missing from the catalog, or whose type is not select/multiselect,
/// come back as `NotEnumerated` so the caller can send the text as-is.
pub fn match_option(field_id: i64, raw_value: &str, catalog: &[FieldDefinition]) -> OptionMatch {
    match find_definition(field_id, catalog) {
        Some(definition) if definition.is_enumerated() => match_in_definition(definition, raw_value),
        _ => OptionMatch::NotEnumerated,
    }
}

pub fn match_in_definition(definition: &FieldDefinition, raw_value: &str) -> OptionMatch {
    if !definition.is_enumerated() {
        return OptionMatch::NotEnumerated;
    }
    let options = definition.sorted_options();
    for step in CASCADE.iter() {
        let input = (step.normalize)(raw_value);
        let hit = options
            .iter()
            .find(|option| (step.accepts)(&input, &(step.normalize)(&option.value)));
        if let Some(option) = hit {
            return OptionMatch::Matched(matched(option, step.rule));
        }
    }
    OptionMatch::NoMatch {
        field_name: definition.display_name(),
        suggestions: options
            .iter()
            .take(MAX_SUGGESTIONS)
            .map(|option| option.value.clone())
            .collect(),
    }
}

fn matched(option: &EnumOption, rule: MatchRule) -> MatchedOption {
    MatchedOption {
        enum_id: option.enum_id,
        value: option.value.clone(),
        rule,
    }
}

fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Lowercases, turns every run of non-word, non-space characters into one
/// space, collapses whitespace and trims. Word characters are ASCII only, so
/// accented letters become separators.
pub fn normalize_text(value: &str) -> String {
    let lowered = value.to_lowercase();
    let spaced = NON_WORD_RUN.replace_all(&lowered, " ");
    WHITESPACE_RUN.replace_all(&spaced, " ").trim().to_string()
}

/// Blank sides never match: text with no ASCII word characters normalizes to
/// an empty string.
fn equals(input: &str, option: &str) -> bool {
    !input.is_empty() && input == option
}

fn contains_either(input: &str, option: &str) -> bool {
    if input.is_empty() || option.is_empty() {
        return false;
    }
    input.contains(option) || option.contains(input)
}

fn all_tokens_contained(input: &str, option: &str) -> bool {
    let tokens: Vec<&str> = input
        .split_whitespace()
        .filter(|token| token.chars().count() > NOISE_TOKEN_MAX_LEN)
        .collect();
    if tokens.is_empty() {
        return false;
    }
    tokens.iter().all(|token| option.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(id: i64, name: &str, values: &[&str]) -> FieldDefinition {
        FieldDefinition {
            id,
            name: name.to_string(),
            code: None,
            field_type: "select".to_string(),
            enum_options: values
                .iter()
                .enumerate()
                .map(|(idx, value)| EnumOption {
                    enum_id: id * 10 + idx as i64,
                    value: value.to_string(),
                    sort_order: idx as i64,
                })
                .collect(),
        }
    }

    fn city() -> FieldDefinition {
        select(501, "City", &["Bogotá", "Medellín", "Cali"])
    }

    fn step(rule: MatchRule) -> &'static CascadeStep {
        cascade()
            .iter()
            .find(|step| step.rule == rule)
            .expect("rule present")
    }

    #[test]
    fn cascade_order_is_strict_to_loose() {
        let order: Vec<MatchRule> = cascade().iter().map(|step| step.rule).collect();
        assert_eq!(
            order,
            vec![
                MatchRule::Exact,
                MatchRule::NormalizedExact,
                MatchRule::Substring,
                MatchRule::NormalizedSubstring,
                MatchRule::WordSubset,
            ]
        );
    }

    #[test]
    fn normalize_replaces_punctuation_and_collapses_space() {
        assert_eq!(normalize_text("  Foo--Bar!!  baz "), "foo bar baz");
        assert_eq!(normalize_text("Bogotá"), "bogot");
        assert_eq!(normalize_text("snake_case"), "snake_case");
    }

    #[test]
    fn each_rule_in_isolation() {
        assert!(step(MatchRule::Exact).applies("CALI", "Cali"));
        assert!(!step(MatchRule::Exact).applies("Cali.", "Cali"));
        assert!(step(MatchRule::NormalizedExact).applies("Cali.", "cali"));
        assert!(step(MatchRule::Substring).applies("Medell", "Medellín"));
        assert!(step(MatchRule::Substring).applies("Ciudad de Cali", "Cali"));
        assert!(!step(MatchRule::Substring).applies("", "Cali"));
        assert!(step(MatchRule::NormalizedSubstring).applies("bogota", "Bogotá"));
        assert!(step(MatchRule::WordSubset).applies("plan premium", "Premium anual (plan)"));
        assert!(!step(MatchRule::WordSubset).applies("a b", "a b c"));
    }

    #[test]
    fn accent_free_input_finds_accented_option() {
        let catalog = vec![city()];
        match match_option(501, "bogota", &catalog) {
            OptionMatch::Matched(found) => {
                assert_eq!(found.value, "Bogotá");
                assert_eq!(found.enum_id, 5010);
                assert_eq!(found.rule, MatchRule::NormalizedSubstring);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        let definition = select(7, "Plan", &["Premium Plus", "Basic", "Premium"]);
        match match_in_definition(&definition, "premium") {
            OptionMatch::Matched(found) => {
                assert_eq!(found.value, "Premium");
                assert_eq!(found.rule, MatchRule::Exact);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn no_match_lists_first_five_options_in_sort_order() {
        let definition = select(
            8,
            "Source",
            &["Web", "Phone", "Email", "Referral", "Event", "Partner"],
        );
        match match_in_definition(&definition, "Cartagena") {
            OptionMatch::NoMatch {
                field_name,
                suggestions,
            } => {
                assert_eq!(field_name, "Source");
                assert_eq!(
                    suggestions,
                    vec!["Web", "Phone", "Email", "Referral", "Event"]
                );
            }
            other => panic!("expected no match, got {:?}", other),
        }
    }

    #[test]
    fn unknown_or_plain_fields_are_not_enumerated() {
        let mut notes = city();
        notes.id = 600;
        notes.field_type = "text".to_string();
        let catalog = vec![city(), notes];
        assert_eq!(match_option(9999, "x", &catalog), OptionMatch::NotEnumerated);
        assert_eq!(match_option(600, "Cali", &catalog), OptionMatch::NotEnumerated);
    }

    #[test]
    fn matching_is_repeatable() {
        let catalog = vec![city()];
        let first = match_option(501, "medellin", &catalog);
        let second = match_option(501, "medellin", &catalog);
        assert_eq!(first, second);
        // "í" splits the normalized option into "medell n", so no rule fires.
        assert!(matches!(first, OptionMatch::NoMatch { .. }));
        match match_option(501, "Medellín", &catalog) {
            OptionMatch::Matched(found) => assert_eq!(found.rule, MatchRule::Exact),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn non_latin_text_does_not_collapse_to_a_match() {
        let catalog = vec![select(1, "Город", &["Москва", "Санкт-Петербург"])];
        for input in ["Новосибирск", "???"] {
            match match_option(1, input, &catalog) {
                OptionMatch::NoMatch { suggestions, .. } => {
                    assert_eq!(suggestions, vec!["Москва", "Санкт-Петербург"]);
                }
                other => panic!("{} must not match, got {:?}", input, other),
            }
        }
        match match_option(1, "москва", &catalog) {
            OptionMatch::Matched(found) => {
                assert_eq!(found.value, "Москва");
                assert_eq!(found.rule, MatchRule::Exact);
            }
            other => panic!("expected match, got {:?}", other),
        }
        assert!(!step(MatchRule::NormalizedExact).applies("???", "Москва"));
    }
}
