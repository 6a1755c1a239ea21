use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ranking::RankAllocation;

/// Reserved "nothing chosen yet" marker for single-choice fields and rank slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T> {
    Unselected,
    Selected(T),
}

impl<T> Selection<T> {
    pub fn as_selected(&self) -> Option<&T> {
        match self {
            Selection::Selected(value) => Some(value),
            Selection::Unselected => None,
        }
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::Selected(_))
    }
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::Unselected
    }
}

/// One entry of a choice list. `Other` is the reserved sentinel that reveals a free-text
/// companion field; it can never collide with a listed option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Listed(String),
    Other,
}

impl Choice {
    pub fn listed(value: impl Into<String>) -> Self {
        Choice::Listed(value.into())
    }
}

/// Placement site drawn from the configured catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Site(pub String);

impl Site {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current value held by a questionnaire field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Choice(Selection<Choice>),
    Choices(Vec<Choice>),
    Number(f64),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn listed(value: impl Into<String>) -> Self {
        FieldValue::Choice(Selection::Selected(Choice::listed(value)))
    }

    pub fn other() -> Self {
        FieldValue::Choice(Selection::Selected(Choice::Other))
    }

    pub fn unselected() -> Self {
        FieldValue::Choice(Selection::Unselected)
    }

    pub const fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Choice(_) => ValueKind::Choice,
            FieldValue::Choices(_) => ValueKind::Choices,
            FieldValue::Number(_) => ValueKind::Number,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&Selection<Choice>> {
        match self {
            FieldValue::Choice(selection) => Some(selection),
            _ => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[Choice]> {
        match self {
            FieldValue::Choices(choices) => Some(choices),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the value currently includes the "other" sentinel.
    pub fn includes_other(&self) -> bool {
        match self {
            FieldValue::Choice(Selection::Selected(Choice::Other)) => true,
            FieldValue::Choices(choices) => choices.contains(&Choice::Other),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Choice,
    Choices,
    Number,
}

impl ValueKind {
    pub const fn label(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Choice => "single choice",
            ValueKind::Choices => "multiple choice",
            ValueKind::Number => "number",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    PersonalDetails,
    PlacementPreferences,
    AcademicRecord,
    Adjustments,
    Motivation,
    Summary,
}

impl SectionId {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::PersonalDetails,
            Self::PlacementPreferences,
            Self::AcademicRecord,
            Self::Adjustments,
            Self::Motivation,
            Self::Summary,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PersonalDetails => "Personal Details",
            Self::PlacementPreferences => "Placement Preferences",
            Self::AcademicRecord => "Academic Record",
            Self::Adjustments => "Medical, Personal & Social Adjustments",
            Self::Motivation => "Motivation",
            Self::Summary => "Summary & Submission",
        }
    }
}

/// Identifier of every field in the questionnaire. Rank slots are addressed by their
/// 1-based rank number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldId {
    FirstName,
    LastName,
    NationalId,
    Gender,
    SocialAffiliation,
    MotherTongue,
    MotherTongueOther,
    ExtraLanguages,
    ExtraLanguagesOther,
    Phone,
    Address,
    Email,
    StudyYear,
    StudyYearOther,
    StudyTrack,
    Mobility,
    MobilityOther,
    PreviousTraining,
    PreviousPlace,
    PreviousMentor,
    PreviousPartner,
    PreferredDomains,
    PreferredDomainsOther,
    TopDomain,
    SiteRank(usize),
    SpecialRequest,
    GradeAverage,
    Adjustments,
    AdjustmentsOther,
    AdjustmentsDetails,
    MotivationEffort,
    MotivationGrowth,
    MotivationCommitment,
}

const NAMED_FIELDS: &[(FieldId, &str)] = &[
    (FieldId::FirstName, "first_name"),
    (FieldId::LastName, "last_name"),
    (FieldId::NationalId, "national_id"),
    (FieldId::Gender, "gender"),
    (FieldId::SocialAffiliation, "social_affiliation"),
    (FieldId::MotherTongue, "mother_tongue"),
    (FieldId::MotherTongueOther, "mother_tongue_other"),
    (FieldId::ExtraLanguages, "extra_languages"),
    (FieldId::ExtraLanguagesOther, "extra_languages_other"),
    (FieldId::Phone, "phone"),
    (FieldId::Address, "address"),
    (FieldId::Email, "email"),
    (FieldId::StudyYear, "study_year"),
    (FieldId::StudyYearOther, "study_year_other"),
    (FieldId::StudyTrack, "study_track"),
    (FieldId::Mobility, "mobility"),
    (FieldId::MobilityOther, "mobility_other"),
    (FieldId::PreviousTraining, "previous_training"),
    (FieldId::PreviousPlace, "previous_place"),
    (FieldId::PreviousMentor, "previous_mentor"),
    (FieldId::PreviousPartner, "previous_partner"),
    (FieldId::PreferredDomains, "preferred_domains"),
    (FieldId::PreferredDomainsOther, "preferred_domains_other"),
    (FieldId::TopDomain, "top_domain"),
    (FieldId::SpecialRequest, "special_request"),
    (FieldId::GradeAverage, "grade_average"),
    (FieldId::Adjustments, "adjustments"),
    (FieldId::AdjustmentsOther, "adjustments_other"),
    (FieldId::AdjustmentsDetails, "adjustments_details"),
    (FieldId::MotivationEffort, "motivation_effort"),
    (FieldId::MotivationGrowth, "motivation_growth"),
    (FieldId::MotivationCommitment, "motivation_commitment"),
];

const RANK_KEY_PREFIX: &str = "rank_";

impl FieldId {
    /// Stable snake_case key used for API paths and record columns.
    pub fn key(self) -> String {
        self.to_string()
    }

    pub const fn is_rank(self) -> bool {
        matches!(self, FieldId::SiteRank(_))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let FieldId::SiteRank(rank) = self {
            return write!(f, "{RANK_KEY_PREFIX}{rank}");
        }

        let key = NAMED_FIELDS
            .iter()
            .find(|(id, _)| id == self)
            .map(|(_, key)| *key)
            .unwrap_or("unknown");
        f.write_str(key)
    }
}

/// Raised when a textual key does not name a questionnaire field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field '{0}'")]
pub struct UnknownFieldKey(pub String);

impl FromStr for FieldId {
    type Err = UnknownFieldKey;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim();
        if let Some((id, _)) = NAMED_FIELDS.iter().find(|(_, name)| *name == key) {
            return Ok(*id);
        }

        key.strip_prefix(RANK_KEY_PREFIX)
            .and_then(|rank| rank.parse::<usize>().ok())
            .filter(|rank| *rank > 0)
            .map(FieldId::SiteRank)
            .ok_or_else(|| UnknownFieldKey(key.to_string()))
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> Self {
        id.key()
    }
}

impl TryFrom<String> for FieldId {
    type Error = UnknownFieldKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Position of a submission inside the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    /// 1-based section number.
    Section(usize),
    /// Every section passed its gate; the record is waiting to be persisted.
    Submitted,
}

/// Working state of one respondent's questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub(crate) values: BTreeMap<FieldId, FieldValue>,
    pub(crate) stage: WizardStage,
    pub(crate) acknowledgements: BTreeMap<SectionId, bool>,
    pub(crate) ranks: RankAllocation,
}

impl Submission {
    pub(crate) fn new(values: BTreeMap<FieldId, FieldValue>, ranks: RankAllocation) -> Self {
        Self {
            values,
            stage: WizardStage::Section(1),
            acknowledgements: BTreeMap::new(),
            ranks,
        }
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn is_submitted(&self) -> bool {
        self.stage == WizardStage::Submitted
    }

    pub fn value(&self, field: FieldId) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn values(&self) -> &BTreeMap<FieldId, FieldValue> {
        &self.values
    }

    pub fn is_acknowledged(&self, section: SectionId) -> bool {
        self.acknowledgements.get(&section).copied().unwrap_or(false)
    }

    pub fn ranks(&self) -> &RankAllocation {
        &self.ranks
    }
}
