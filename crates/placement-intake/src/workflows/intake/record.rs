use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::catalog::SiteCatalog;
use super::dependency;
use super::domain::{Choice, FieldId, FieldValue, Selection, Submission};
use super::ranking;
use super::schema::{FieldKind, Questionnaire};

pub const SUBMITTED_AT_COLUMN: &str = "submitted_at";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const JOIN_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordColumn {
    pub name: String,
    pub value: String,
}

/// Flat, ordered projection of one completed submission: one row of the tabular store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submitted_at: NaiveDateTime,
    pub columns: Vec<RecordColumn>,
}

impl SubmissionRecord {
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.value.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.columns.push(RecordColumn {
            name: name.into(),
            value: value.into(),
        });
    }
}

/// Column naming the rank a catalog site received.
pub fn site_column(site: &str) -> String {
    format!("site_rank:{site}")
}

/// Flatten `submission` into a record. Only reads the submission.
///
/// Companion free-text is folded into its governing field, hidden fields are emitted empty, and
/// the rank allocation is appended in both directions.
pub(crate) fn assemble(
    questionnaire: &Questionnaire,
    catalog: &SiteCatalog,
    submission: &Submission,
    submitted_at: NaiveDateTime,
) -> SubmissionRecord {
    let values = submission.values();
    let mut record = SubmissionRecord {
        submitted_at,
        columns: Vec::new(),
    };
    record.push(
        SUBMITTED_AT_COLUMN,
        submitted_at.format(TIMESTAMP_FORMAT).to_string(),
    );

    for schema in questionnaire.fields() {
        if schema.governing_field().is_some() || matches!(schema.kind, FieldKind::SiteRank) {
            continue;
        }

        let rendered = if dependency::is_visible(questionnaire, values, schema) {
            match values.get(&schema.id) {
                Some(FieldValue::Text(text)) => text.trim().to_string(),
                Some(FieldValue::Choice(Selection::Selected(Choice::Listed(value)))) => value.clone(),
                Some(FieldValue::Choice(Selection::Selected(Choice::Other)))
                | Some(FieldValue::Choices(_)) => {
                    dependency::resolved_choices(questionnaire, values, schema.id).join(JOIN_SEPARATOR)
                }
                Some(FieldValue::Number(number)) => number.to_string(),
                Some(FieldValue::Choice(Selection::Unselected)) | None => String::new(),
            }
        } else {
            String::new()
        };

        record.push(schema.id.key(), rendered);
    }

    let projection = ranking::project(catalog, submission.ranks());
    for (rank, site) in projection.by_rank {
        record.push(
            FieldId::SiteRank(rank).key(),
            site.map(|site| site.0).unwrap_or_default(),
        );
    }
    for (site, rank) in projection.by_site {
        record.push(
            site_column(site.name()),
            rank.map(|rank| rank.to_string()).unwrap_or_default(),
        );
    }

    record
}
