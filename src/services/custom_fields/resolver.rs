use super::model::{FieldKey, FieldValueSnapshot, ResolutionSource, ResolvedField};

/// Parses a key that is a positive integer literal.
pub fn parse_literal_id(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

/// Maps a caller key to a field id using only the entity snapshot.
///
/// Order: integer literal, then substring of a populated field's name or code,
/// then exact lookup in the snapshot's name index. A `None` covers both "no
/// such field" and "field exists but has never been set".
pub fn resolve(key: &FieldKey, snapshot: &FieldValueSnapshot) -> Option<ResolvedField> {
    let text = match key {
        FieldKey::Id(id) if *id > 0 => {
            return Some(ResolvedField {
                field_id: *id,
                source: ResolutionSource::IdLiteral,
            })
        }
        FieldKey::Id(_) => return None,
        FieldKey::Text(text) => text,
    };

    if let Some(field_id) = parse_literal_id(text) {
        return Some(ResolvedField {
            field_id,
            source: ResolutionSource::IdLiteral,
        });
    }

    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some(found) = search_snapshot(&needle, snapshot) {
        return Some(found);
    }

    snapshot
        .name_index()
        .get(&needle)
        .map(|field_id| ResolvedField {
            field_id: *field_id,
            source: ResolutionSource::MatchedByName,
        })
}

fn search_snapshot(needle: &str, snapshot: &FieldValueSnapshot) -> Option<ResolvedField> {
    for field in snapshot.fields() {
        if field.field_id <= 0 {
            continue;
        }
        let name_hit = field
            .field_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(needle));
        if name_hit {
            return Some(ResolvedField {
                field_id: field.field_id,
                source: ResolutionSource::MatchedByName,
            });
        }
        let code_hit = field
            .field_code
            .as_deref()
            .is_some_and(|code| code.to_lowercase().contains(needle));
        if code_hit {
            return Some(ResolvedField {
                field_id: field.field_id,
                source: ResolutionSource::MatchedByCode,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::custom_fields::model::PopulatedField;

    fn field(id: i64, name: &str, code: Option<&str>) -> PopulatedField {
        PopulatedField {
            field_id: id,
            field_name: Some(name.to_string()),
            field_code: code.map(|c| c.to_string()),
            field_type: Some("text".to_string()),
            values: Vec::new(),
        }
    }

    fn snapshot() -> FieldValueSnapshot {
        FieldValueSnapshot::new(vec![
            field(100, "Nombre completo", None),
            field(200, "Teléfono", Some("PHONE")),
            field(300, "Campaign 42", None),
        ])
    }

    fn text(key: &str) -> FieldKey {
        FieldKey::Text(key.to_string())
    }

    #[test]
    fn numeric_key_wins_over_name_substring() {
        let resolved = resolve(&text("42"), &snapshot()).expect("resolved");
        assert_eq!(resolved.field_id, 42);
        assert_eq!(resolved.source, ResolutionSource::IdLiteral);
    }

    #[test]
    fn numeric_field_key_is_literal() {
        let resolved = resolve(&FieldKey::Id(9999), &FieldValueSnapshot::default())
            .expect("resolved");
        assert_eq!(resolved.field_id, 9999);
        assert_eq!(resolved.source, ResolutionSource::IdLiteral);
    }

    #[test]
    fn name_substring_is_case_insensitive() {
        let resolved = resolve(&text("NOMBRE"), &snapshot()).expect("resolved");
        assert_eq!(resolved.field_id, 100);
        assert_eq!(resolved.source, ResolutionSource::MatchedByName);
    }

    #[test]
    fn code_match_reports_code_source() {
        let resolved = resolve(&text("phone"), &snapshot()).expect("resolved");
        assert_eq!(resolved.field_id, 200);
        assert_eq!(resolved.source, ResolutionSource::MatchedByCode);
    }

    #[test]
    fn unknown_key_is_not_found() {
        assert_eq!(resolve(&text("City"), &snapshot()), None);
        assert_eq!(resolve(&text("   "), &snapshot()), None);
    }

    #[test]
    fn non_positive_numbers_are_not_literal_ids() {
        assert_eq!(parse_literal_id("0"), None);
        assert_eq!(parse_literal_id("-7"), None);
        assert_eq!(parse_literal_id(" 501 "), Some(501));
        assert_eq!(resolve(&FieldKey::Id(0), &snapshot()), None);
    }
}
