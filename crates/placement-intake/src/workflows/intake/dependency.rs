//! Field-dependency resolution: conditional visibility and derived option sets.
//!
//! Everything here is a pure function of the current values, so validation and record assembly
//! always agree on which fields count.

use std::collections::BTreeMap;

use super::domain::{Choice, FieldId, FieldValue, Selection};
use super::schema::{FieldKind, FieldSchema, Questionnaire, SectionSchema, Visibility};

pub type FieldValues = BTreeMap<FieldId, FieldValue>;

/// Whether `schema` currently takes part in validation and in the final record.
pub fn is_visible(questionnaire: &Questionnaire, values: &FieldValues, schema: &FieldSchema) -> bool {
    let governing = match &schema.visibility {
        Visibility::Always => return true,
        Visibility::WhenOther { governing } => {
            let includes_other = values
                .get(governing)
                .map(FieldValue::includes_other)
                .unwrap_or(false);
            if !includes_other {
                return false;
            }
            *governing
        }
        Visibility::WhenAnyOf { field, values: accepted } => {
            let matches = values
                .get(field)
                .and_then(FieldValue::as_choice)
                .and_then(Selection::as_selected)
                .map(|choice| match choice {
                    Choice::Listed(value) => accepted.iter().any(|candidate| *candidate == value.as_str()),
                    Choice::Other => false,
                })
                .unwrap_or(false);
            if !matches {
                return false;
            }
            *field
        }
    };

    // A field hidden behind a hidden field is hidden too.
    questionnaire
        .field(governing)
        .map(|parent| is_visible(questionnaire, values, parent))
        .unwrap_or(true)
}

pub fn visible_fields<'a>(
    questionnaire: &'a Questionnaire,
    values: &'a FieldValues,
    section: &'a SectionSchema,
) -> impl Iterator<Item = &'a FieldSchema> + 'a {
    section
        .fields
        .iter()
        .filter(move |schema| is_visible(questionnaire, values, schema))
}

/// Companion free-text fields currently revealed by an "other" selection.
pub fn active_companions(questionnaire: &Questionnaire, values: &FieldValues) -> Vec<FieldId> {
    questionnaire
        .fields()
        .filter(|schema| schema.governing_field().is_some())
        .filter(|schema| is_visible(questionnaire, values, schema))
        .map(|schema| schema.id)
        .collect()
}

/// Trimmed companion text for `governing`, if any was entered.
pub fn companion_text<'a>(
    questionnaire: &Questionnaire,
    values: &'a FieldValues,
    governing: FieldId,
) -> Option<&'a str> {
    let companion = questionnaire.companion_of(governing)?;
    values
        .get(&companion.id)
        .and_then(FieldValue::as_text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Choices currently held by `source`, with the "other" sentinel replaced by the companion text
/// or dropped when that text is blank.
pub fn resolved_choices(questionnaire: &Questionnaire, values: &FieldValues, source: FieldId) -> Vec<String> {
    let held: Vec<&Choice> = match values.get(&source) {
        Some(FieldValue::Choices(choices)) => choices.iter().collect(),
        Some(FieldValue::Choice(Selection::Selected(choice))) => vec![choice],
        _ => Vec::new(),
    };

    let mut resolved: Vec<String> = Vec::with_capacity(held.len());
    for choice in held {
        let value = match choice {
            Choice::Listed(value) => Some(value.as_str()),
            Choice::Other => companion_text(questionnaire, values, source),
        };
        if let Some(value) = value {
            if !resolved.iter().any(|existing| existing == value) {
                resolved.push(value.to_string());
            }
        }
    }
    resolved
}

/// Option set of a derived "top choice" field: the unselected marker followed by the source's
/// resolved choices.
pub fn derived_options(
    questionnaire: &Questionnaire,
    values: &FieldValues,
    source: FieldId,
) -> Vec<Selection<Choice>> {
    std::iter::once(Selection::Unselected)
        .chain(
            resolved_choices(questionnaire, values, source)
                .into_iter()
                .map(|value| Selection::Selected(Choice::Listed(value))),
        )
        .collect()
}

/// Reset every derived choice whose stored value is no longer offered. Returns the fields that
/// were reset.
pub fn reconcile(questionnaire: &Questionnaire, values: &mut FieldValues) -> Vec<FieldId> {
    let derived: Vec<(FieldId, FieldId)> = questionnaire
        .fields()
        .filter_map(|schema| match schema.kind {
            FieldKind::DerivedChoice { source } => Some((schema.id, source)),
            _ => None,
        })
        .collect();

    let mut reset = Vec::new();
    for (field, source) in derived {
        let stale = match values.get(&field).and_then(FieldValue::as_choice) {
            Some(current @ Selection::Selected(_)) => {
                !derived_options(questionnaire, values, source).contains(current)
            }
            _ => false,
        };
        if stale {
            values.insert(field, FieldValue::unselected());
            reset.push(field);
        }
    }
    reset
}
