//! Section schema provider: the ordered sections, their fields and static option lists.

use serde::Serialize;

use super::domain::{FieldId, FieldValue, SectionId, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Plain,
    LongText,
    Email,
    Phone,
    NationalId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldKind {
    Text {
        format: TextFormat,
    },
    SingleChoice {
        options: Vec<&'static str>,
        allows_other: bool,
    },
    MultiChoice {
        options: Vec<&'static str>,
        allows_other: bool,
        max_selections: Option<usize>,
    },
    /// Options are recomputed from the current value of `source`.
    DerivedChoice {
        source: FieldId,
    },
    /// Valid when `min_exclusive < value <= max`.
    Number {
        min_exclusive: f64,
        max: f64,
    },
    SiteRank,
}

impl FieldKind {
    const fn text(format: TextFormat) -> Self {
        FieldKind::Text { format }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldKind::Text { .. } => ValueKind::Text,
            FieldKind::SingleChoice { .. } | FieldKind::DerivedChoice { .. } | FieldKind::SiteRank => {
                ValueKind::Choice
            }
            FieldKind::MultiChoice { .. } => ValueKind::Choices,
            FieldKind::Number { .. } => ValueKind::Number,
        }
    }

    pub fn allows_other(&self) -> bool {
        match self {
            FieldKind::SingleChoice { allows_other, .. }
            | FieldKind::MultiChoice { allows_other, .. } => *allows_other,
            _ => false,
        }
    }
}

/// When a field takes part in validation and in the final record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "when")]
pub enum Visibility {
    Always,
    /// Companion free-text of a choice field; shown while that field includes "other".
    WhenOther { governing: FieldId },
    WhenAnyOf {
        field: FieldId,
        values: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub id: FieldId,
    pub label: &'static str,
    pub kind: FieldKind,
    pub requirement: Requirement,
    pub visibility: Visibility,
}

impl FieldSchema {
    fn new(id: FieldId, label: &'static str, kind: FieldKind) -> Self {
        Self {
            id,
            label,
            kind,
            requirement: Requirement::Required,
            visibility: Visibility::Always,
        }
    }

    fn optional(mut self) -> Self {
        self.requirement = Requirement::Optional;
        self
    }

    fn visible(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    fn companion(id: FieldId, label: &'static str, governing: FieldId) -> Self {
        Self::new(id, label, FieldKind::text(TextFormat::Plain))
            .visible(Visibility::WhenOther { governing })
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }

    /// Companion fields are folded into their governing field in the record.
    pub fn governing_field(&self) -> Option<FieldId> {
        match self.visibility {
            Visibility::WhenOther { governing } => Some(governing),
            _ => None,
        }
    }

    /// Value a fresh submission starts with. Rank slots live in the rank allocation instead.
    pub fn default_value(&self) -> Option<FieldValue> {
        match self.kind {
            FieldKind::Text { .. } => Some(FieldValue::text("")),
            FieldKind::SingleChoice { .. } | FieldKind::DerivedChoice { .. } => {
                Some(FieldValue::unselected())
            }
            FieldKind::MultiChoice { .. } => Some(FieldValue::Choices(Vec::new())),
            FieldKind::Number { .. } => Some(FieldValue::Number(0.0)),
            FieldKind::SiteRank => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSchema {
    pub id: SectionId,
    pub fields: Vec<FieldSchema>,
    /// Statement the respondent confirms before leaving the section.
    pub acknowledgement: &'static str,
    /// Re-run every earlier section's field checks when this section is gated.
    pub recheck_previous: bool,
}

impl SectionSchema {
    pub fn title(&self) -> &'static str {
        self.id.label()
    }

    pub fn contains(&self, field: FieldId) -> bool {
        self.fields.iter().any(|schema| schema.id == field)
    }
}

/// Ordered list of sections making up the wizard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Questionnaire {
    sections: Vec<SectionSchema>,
    rank_count: usize,
}

impl Questionnaire {
    /// Reference placement form with `rank_count` site-ranking slots.
    pub fn standard(rank_count: usize) -> Self {
        let sections = vec![
            personal_details(),
            placement_preferences(rank_count),
            academic_record(),
            adjustments(),
            motivation(),
            summary(),
        ];
        Self {
            sections,
            rank_count,
        }
    }

    /// Override the required/optional flag of one field.
    pub fn with_requirement(mut self, field: FieldId, requirement: Requirement) -> Self {
        for section in &mut self.sections {
            for schema in &mut section.fields {
                if schema.id == field {
                    schema.requirement = requirement;
                }
            }
        }
        self
    }

    pub fn sections(&self) -> &[SectionSchema] {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// 1-based lookup.
    pub fn section(&self, number: usize) -> Option<&SectionSchema> {
        number
            .checked_sub(1)
            .and_then(|index| self.sections.get(index))
    }

    pub fn rank_count(&self) -> usize {
        self.rank_count
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.sections.iter().flat_map(|section| section.fields.iter())
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldSchema> {
        self.fields().find(|schema| schema.id == id)
    }

    /// 1-based number of the section holding `id`.
    pub fn section_of(&self, id: FieldId) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| section.contains(id))
            .map(|index| index + 1)
    }

    /// Free-text companion revealed by the "other" choice of `governing`.
    pub fn companion_of(&self, governing: FieldId) -> Option<&FieldSchema> {
        self.fields()
            .find(|schema| schema.governing_field() == Some(governing))
    }
}

const YES: &str = "Yes";
const PARTIAL: &str = "Partial";

const AGREEMENT_SCALE: [&str; 6] = [
    "Strongly disagree",
    "1",
    "2",
    "3",
    "4",
    "Strongly agree",
];

fn section_confirmation(id: SectionId, fields: Vec<FieldSchema>, statement: &'static str) -> SectionSchema {
    SectionSchema {
        id,
        fields,
        acknowledgement: statement,
        recheck_previous: false,
    }
}

fn personal_details() -> SectionSchema {
    use FieldId::*;

    let fields = vec![
        FieldSchema::new(FirstName, "First name", FieldKind::text(TextFormat::Plain)),
        FieldSchema::new(LastName, "Last name", FieldKind::text(TextFormat::Plain)),
        FieldSchema::new(NationalId, "National ID number", FieldKind::text(TextFormat::NationalId)),
        FieldSchema::new(
            Gender,
            "Gender",
            FieldKind::SingleChoice {
                options: vec!["Male", "Female"],
                allows_other: false,
            },
        ),
        FieldSchema::new(
            SocialAffiliation,
            "Social affiliation",
            FieldKind::SingleChoice {
                options: vec!["Jewish", "Muslim", "Christian", "Druze"],
                allows_other: false,
            },
        ),
        FieldSchema::new(
            MotherTongue,
            "Mother tongue",
            FieldKind::SingleChoice {
                options: vec!["Hebrew", "Arabic", "Russian"],
                allows_other: true,
            },
        ),
        FieldSchema::companion(MotherTongueOther, "Other mother tongue", MotherTongue),
        FieldSchema::new(
            ExtraLanguages,
            "Additional languages (conversational level)",
            FieldKind::MultiChoice {
                options: vec!["Hebrew", "Arabic", "Russian", "Amharic", "English", "Spanish"],
                allows_other: true,
                max_selections: None,
            },
        )
        .optional(),
        FieldSchema::companion(ExtraLanguagesOther, "Other additional language", ExtraLanguages),
        FieldSchema::new(Phone, "Mobile phone number", FieldKind::text(TextFormat::Phone)),
        FieldSchema::new(Address, "Full address (including town)", FieldKind::text(TextFormat::Plain)),
        FieldSchema::new(Email, "Email address", FieldKind::text(TextFormat::Email)),
        FieldSchema::new(
            StudyYear,
            "Year of study",
            FieldKind::SingleChoice {
                options: vec![
                    "BA - year 1",
                    "BA - year 2",
                    "BA - year 3",
                    "Retraining - year 1",
                    "Retraining - year 2",
                ],
                allows_other: true,
            },
        ),
        FieldSchema::companion(StudyYearOther, "Other year or track of study", StudyYear),
        FieldSchema::new(StudyTrack, "Study track / degree", FieldKind::text(TextFormat::Plain)),
        FieldSchema::new(
            Mobility,
            "Getting to the placement",
            FieldKind::SingleChoice {
                options: vec!["I have or can use a car", "I can travel by public transport"],
                allows_other: true,
            },
        ),
        FieldSchema::companion(MobilityOther, "Other mobility arrangement", Mobility),
    ];

    section_confirmation(
        SectionId::PersonalDetails,
        fields,
        "I confirm the details in section 1 and wish to continue.",
    )
}

fn placement_preferences(rank_count: usize) -> SectionSchema {
    use FieldId::*;

    let after_training = || Visibility::WhenAnyOf {
        field: PreviousTraining,
        values: vec![YES, PARTIAL],
    };

    let mut fields = vec![
        FieldSchema::new(
            PreviousTraining,
            "Practical training in a previous year",
            FieldKind::SingleChoice {
                options: vec![YES, "No", PARTIAL],
                allows_other: false,
            },
        ),
        FieldSchema::new(
            PreviousPlace,
            "Previous training place and domain",
            FieldKind::text(TextFormat::Plain),
        )
        .visible(after_training()),
        FieldSchema::new(
            PreviousMentor,
            "Previous mentor and location",
            FieldKind::text(TextFormat::Plain),
        )
        .visible(after_training()),
        FieldSchema::new(
            PreviousPartner,
            "Previous training partner",
            FieldKind::text(TextFormat::Plain),
        )
        .visible(after_training()),
        FieldSchema::new(
            PreferredDomains,
            "Preferred domains",
            FieldKind::MultiChoice {
                options: vec![
                    "Community",
                    "Disability",
                    "Old age",
                    "Children and youth",
                    "Mental health",
                    "Rehabilitation",
                    "Family",
                    "Women",
                    "Health",
                    "Corrections",
                ],
                allows_other: true,
                max_selections: Some(3),
            },
        ),
        FieldSchema::companion(PreferredDomainsOther, "Other domain", PreferredDomains),
        FieldSchema::new(
            TopDomain,
            "Most preferred domain",
            FieldKind::DerivedChoice {
                source: PreferredDomains,
            },
        ),
    ];

    fields.extend((1..=rank_count).map(|rank| {
        let label = match rank {
            1 => "Placement site - first preference",
            2 => "Placement site - second preference",
            3 => "Placement site - third preference",
            _ => "Placement site - further preference",
        };
        FieldSchema::new(SiteRank(rank), label, FieldKind::SiteRank)
    }));

    fields.push(
        FieldSchema::new(
            SpecialRequest,
            "Special request about location or domain",
            FieldKind::text(TextFormat::LongText),
        )
        .optional(),
    );

    section_confirmation(
        SectionId::PlacementPreferences,
        fields,
        "I confirm the details in section 2 and wish to continue.",
    )
}

fn academic_record() -> SectionSchema {
    let fields = vec![FieldSchema::new(
        FieldId::GradeAverage,
        "Grade average",
        FieldKind::Number {
            min_exclusive: 0.0,
            max: 100.0,
        },
    )];

    section_confirmation(
        SectionId::AcademicRecord,
        fields,
        "I confirm the details in section 3 and wish to continue.",
    )
}

fn adjustments() -> SectionSchema {
    use FieldId::*;

    let fields = vec![
        FieldSchema::new(
            Adjustments,
            "Adjustment types",
            FieldKind::MultiChoice {
                options: vec![
                    "None",
                    "Pregnancy",
                    "Medical condition (e.g. chronic or autoimmune illness)",
                    "Sensitivity to medical settings (e.g. not a hospital placement)",
                    "Severe allergy",
                    "Disability",
                    "Sensitive family background",
                ],
                allows_other: true,
                max_selections: None,
            },
        ),
        FieldSchema::companion(AdjustmentsOther, "Other adjustment", Adjustments),
        FieldSchema::new(
            AdjustmentsDetails,
            "Adjustment details",
            FieldKind::text(TextFormat::LongText),
        ),
    ];

    section_confirmation(
        SectionId::Adjustments,
        fields,
        "I confirm the details in section 4 and wish to continue.",
    )
}

fn motivation() -> SectionSchema {
    use FieldId::*;

    let scale = |id, label| {
        FieldSchema::new(
            id,
            label,
            FieldKind::SingleChoice {
                options: AGREEMENT_SCALE.to_vec(),
                allows_other: false,
            },
        )
    };

    let fields = vec![
        scale(
            MotivationEffort,
            "Willing to invest extra effort to reach the preferred site",
        ),
        scale(
            MotivationGrowth,
            "Practical training is a meaningful opportunity for growth",
        ),
        scale(
            MotivationCommitment,
            "Committed to arriving on time and persisting in challenging conditions",
        ),
    ];

    section_confirmation(
        SectionId::Motivation,
        fields,
        "I confirm the details in section 5 and wish to continue.",
    )
}

fn summary() -> SectionSchema {
    SectionSchema {
        id: SectionId::Summary,
        fields: Vec::new(),
        acknowledgement: "I declare that the information I provided is true and accurate, and I understand that a full match to my choices is not guaranteed.",
        recheck_previous: true,
    }
}
