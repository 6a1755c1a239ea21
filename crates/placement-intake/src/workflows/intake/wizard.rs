use chrono::{Local, NaiveDateTime};
use tracing::debug;

use super::catalog::SiteCatalog;
use super::dependency::{self, FieldValues};
use super::domain::{
    Choice, FieldId, FieldValue, Selection, Site, Submission, UnknownFieldKey, ValueKind,
    WizardStage,
};
use super::ranking::{self, RankAllocation, RankError};
use super::record::{self, SubmissionRecord};
use super::schema::{FieldKind, FieldSchema, Questionnaire, SectionSchema, TextFormat};
use super::validation::{self, collect_errors, ErrorReport};

/// Caller misuse of the wizard. These never describe user input problems; those are reported
/// through [`ErrorReport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("section {0} does not exist")]
    UnknownSection(usize),
    #[error("field '{field}' expects a {expected} value")]
    KindMismatch { field: FieldId, expected: ValueKind },
    #[error("'{option}' is not offered for field '{field}'")]
    OptionNotOffered { field: FieldId, option: String },
    #[error("'{option}' is selected more than once for field '{field}'")]
    DuplicateSelection { field: FieldId, option: String },
    #[error("field '{field}' belongs to section {section}, but section {active} is active")]
    FieldNotInCurrentSection {
        field: FieldId,
        section: usize,
        active: usize,
    },
    #[error("rank {rank} is outside 1..={rank_count}")]
    RankOutOfRange { rank: usize, rank_count: usize },
    #[error("section 1 has no previous section")]
    NoPreviousSection,
    #[error("the submission has already been submitted")]
    AlreadySubmitted,
    #[error("the submission has not been submitted yet")]
    NotSubmitted,
}

impl From<UnknownFieldKey> for ContractViolation {
    fn from(value: UnknownFieldKey) -> Self {
        Self::UnknownField(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardSetupError {
    #[error("rank count {rank_count} must be between 1 and the catalog size {sites}")]
    RankCount { rank_count: usize, sites: usize },
}

/// Section state machine over one questionnaire and site catalog. Holds no per-respondent
/// state; every operation takes the caller's [`Submission`].
#[derive(Debug, Clone)]
pub struct IntakeWizard {
    questionnaire: Questionnaire,
    catalog: SiteCatalog,
}

impl IntakeWizard {
    pub fn new(questionnaire: Questionnaire, catalog: SiteCatalog) -> Result<Self, WizardSetupError> {
        let rank_count = questionnaire.rank_count();
        if rank_count == 0 || rank_count > catalog.len() {
            return Err(WizardSetupError::RankCount {
                rank_count,
                sites: catalog.len(),
            });
        }
        Ok(Self {
            questionnaire,
            catalog,
        })
    }

    /// Reference form: three ranks over the default catalog.
    pub fn standard() -> Self {
        Self {
            questionnaire: Questionnaire::standard(3),
            catalog: SiteCatalog::standard(),
        }
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    pub fn catalog(&self) -> &SiteCatalog {
        &self.catalog
    }

    pub fn new_submission(&self) -> Submission {
        let values = self
            .questionnaire
            .fields()
            .filter_map(|schema| schema.default_value().map(|value| (schema.id, value)))
            .collect();
        Submission::new(values, RankAllocation::unset(self.questionnaire.rank_count()))
    }

    /// 1-based active section, `None` once submitted.
    pub fn current_section(&self, submission: &Submission) -> Option<usize> {
        match submission.stage() {
            WizardStage::Section(number) => Some(number),
            WizardStage::Submitted => None,
        }
    }

    pub fn current_schema(&self, submission: &Submission) -> Option<&SectionSchema> {
        self.current_section(submission)
            .and_then(|number| self.questionnaire.section(number))
    }

    /// Stored value of any field, rank slots included.
    pub fn value(&self, submission: &Submission, field: FieldId) -> Result<FieldValue, ContractViolation> {
        self.schema(field)?;

        if let FieldId::SiteRank(rank) = field {
            let slot = submission
                .ranks()
                .get(rank)
                .cloned()
                .unwrap_or(Selection::Unselected);
            return Ok(FieldValue::Choice(site_choice(slot)));
        }

        Ok(submission
            .value(field)
            .cloned()
            .unwrap_or_else(FieldValue::unselected))
    }

    /// Values of every field in section `number`, in schema order, for re-displaying a section.
    pub fn section_values(
        &self,
        submission: &Submission,
        number: usize,
    ) -> Result<Vec<(FieldId, FieldValue)>, ContractViolation> {
        let section = self
            .questionnaire
            .section(number)
            .ok_or(ContractViolation::UnknownSection(number))?;

        section
            .fields
            .iter()
            .map(|schema| Ok((schema.id, self.value(submission, schema.id)?)))
            .collect()
    }

    /// Whether `field` is currently visible given the submission's values.
    pub fn is_visible(&self, submission: &Submission, field: FieldId) -> Result<bool, ContractViolation> {
        let schema = self.schema(field)?;
        Ok(dependency::is_visible(
            &self.questionnaire,
            submission.values(),
            schema,
        ))
    }

    /// Store `value` for a field of the active section. A rank conflict is reported as data and
    /// leaves the submission untouched.
    pub fn set_field(
        &self,
        submission: &mut Submission,
        field: FieldId,
        value: FieldValue,
    ) -> Result<ErrorReport, ContractViolation> {
        let active = self.active_section(submission)?;
        let schema = self.schema(field)?;

        if let Some(section) = self.questionnaire.section_of(field) {
            if section != active {
                return Err(ContractViolation::FieldNotInCurrentSection {
                    field,
                    section,
                    active,
                });
            }
        }

        let expected = schema.kind.value_kind();
        if value.kind() != expected {
            return Err(ContractViolation::KindMismatch { field, expected });
        }

        match &schema.kind {
            FieldKind::SiteRank => {
                let FieldId::SiteRank(rank) = field else {
                    return Err(ContractViolation::UnknownField(field.key()));
                };
                return self.set_rank(submission, rank, &value);
            }
            FieldKind::SingleChoice { .. } => {
                if let FieldValue::Choice(Selection::Selected(choice)) = &value {
                    self.ensure_offered(submission, schema, choice)?;
                }
            }
            FieldKind::DerivedChoice { source } => {
                if let FieldValue::Choice(selection @ Selection::Selected(choice)) = &value {
                    let offered =
                        dependency::derived_options(&self.questionnaire, submission.values(), *source);
                    if !offered.contains(selection) {
                        return Err(not_offered(field, choice));
                    }
                }
            }
            FieldKind::MultiChoice { .. } => {
                let choices = value.as_choices().unwrap_or_default();
                for (index, choice) in choices.iter().enumerate() {
                    self.ensure_offered(submission, schema, choice)?;
                    if choices[..index].contains(choice) {
                        return Err(ContractViolation::DuplicateSelection {
                            field,
                            option: choice_label(choice),
                        });
                    }
                }
            }
            FieldKind::Text { .. } | FieldKind::Number { .. } => {}
        }

        submission.values.insert(field, value);
        let reset = dependency::reconcile(&self.questionnaire, &mut submission.values);
        debug!(field = %field, reset = reset.len(), "field updated");

        Ok(ErrorReport::new())
    }

    /// Options currently offered for `field`. Free-form fields offer none.
    pub fn options_for(
        &self,
        submission: &Submission,
        field: FieldId,
    ) -> Result<Vec<Selection<Choice>>, ContractViolation> {
        let schema = self.schema(field)?;

        let options = match &schema.kind {
            FieldKind::SingleChoice {
                options,
                allows_other,
            } => std::iter::once(Selection::Unselected)
                .chain(static_choices(options, *allows_other).map(Selection::Selected))
                .collect(),
            FieldKind::MultiChoice {
                options,
                allows_other,
                ..
            } => static_choices(options, *allows_other)
                .map(Selection::Selected)
                .collect(),
            FieldKind::DerivedChoice { source } => {
                dependency::derived_options(&self.questionnaire, submission.values(), *source)
            }
            FieldKind::SiteRank => {
                let FieldId::SiteRank(rank) = field else {
                    return Err(ContractViolation::UnknownField(field.key()));
                };
                ranking::options_for_rank(&self.catalog, rank, submission.ranks())
                    .map_err(|error| rank_violation(field, error))?
                    .into_iter()
                    .map(site_choice)
                    .collect()
            }
            FieldKind::Text { .. } | FieldKind::Number { .. } => Vec::new(),
        };

        Ok(options)
    }

    /// Set the active section's acknowledgement flag.
    pub fn acknowledge(&self, submission: &mut Submission, confirmed: bool) -> Result<(), ContractViolation> {
        let active = self.active_section(submission)?;
        let section = self
            .questionnaire
            .section(active)
            .ok_or(ContractViolation::UnknownSection(active))?;
        submission.acknowledgements.insert(section.id, confirmed);
        Ok(())
    }

    /// Gate of the active section without moving.
    pub fn validate_current(&self, submission: &Submission) -> Result<ErrorReport, ContractViolation> {
        let active = self.active_section(submission)?;
        let section = self
            .questionnaire
            .section(active)
            .ok_or(ContractViolation::UnknownSection(active))?;

        let mut report = ErrorReport::new();

        if section.recheck_previous {
            for (index, earlier) in self.questionnaire.sections()[..active - 1].iter().enumerate() {
                report.extend(
                    self.field_errors(submission, earlier)
                        .into_iter()
                        .map(|message| format!("Section {}: {message}", index + 1)),
                );
            }
        }

        report.extend(self.field_errors(submission, section));

        let last = active == self.questionnaire.section_count();
        let acknowledgement = if last {
            "Confirm the declaration before submitting.".to_string()
        } else {
            format!("Confirm section {active} before continuing.")
        };
        report.extend(
            collect_errors([(submission.is_acknowledged(section.id), acknowledgement)])
                .into_messages(),
        );

        Ok(report)
    }

    /// Move forward when the active section passes its gate. A non-empty report means nothing
    /// changed.
    pub fn advance(&self, submission: &mut Submission) -> Result<ErrorReport, ContractViolation> {
        let report = self.validate_current(submission)?;
        if !report.is_empty() {
            debug!(errors = report.len(), "section gate rejected advance");
            return Ok(report);
        }

        let active = self.active_section(submission)?;
        submission.stage = if active >= self.questionnaire.section_count() {
            WizardStage::Submitted
        } else {
            WizardStage::Section(active + 1)
        };
        debug!(from = active, to = ?submission.stage, "section advanced");

        Ok(report)
    }

    /// Step back one section. Values are kept as entered.
    pub fn retreat(&self, submission: &mut Submission) -> Result<(), ContractViolation> {
        let active = self.active_section(submission)?;
        if active <= 1 {
            return Err(ContractViolation::NoPreviousSection);
        }
        submission.stage = WizardStage::Section(active - 1);
        debug!(from = active, to = active - 1, "section retreated");
        Ok(())
    }

    /// Replace the submission with a fresh one.
    pub fn reset(&self, submission: &mut Submission) {
        *submission = self.new_submission();
    }

    /// Flatten a submitted submission, stamped with the current local time.
    pub fn assemble_record(&self, submission: &Submission) -> Result<SubmissionRecord, ContractViolation> {
        self.assemble_record_at(submission, Local::now().naive_local())
    }

    pub fn assemble_record_at(
        &self,
        submission: &Submission,
        submitted_at: NaiveDateTime,
    ) -> Result<SubmissionRecord, ContractViolation> {
        if !submission.is_submitted() {
            return Err(ContractViolation::NotSubmitted);
        }
        Ok(record::assemble(
            &self.questionnaire,
            &self.catalog,
            submission,
            submitted_at,
        ))
    }

    fn schema(&self, field: FieldId) -> Result<&FieldSchema, ContractViolation> {
        self.questionnaire
            .field(field)
            .ok_or_else(|| ContractViolation::UnknownField(field.key()))
    }

    fn active_section(&self, submission: &Submission) -> Result<usize, ContractViolation> {
        self.current_section(submission)
            .ok_or(ContractViolation::AlreadySubmitted)
    }

    fn ensure_offered(
        &self,
        submission: &Submission,
        schema: &FieldSchema,
        choice: &Choice,
    ) -> Result<(), ContractViolation> {
        let offered = self
            .options_for(submission, schema.id)?
            .into_iter()
            .any(|option| option.as_selected() == Some(choice));
        if offered {
            Ok(())
        } else {
            Err(not_offered(schema.id, choice))
        }
    }

    fn set_rank(
        &self,
        submission: &mut Submission,
        rank: usize,
        value: &FieldValue,
    ) -> Result<ErrorReport, ContractViolation> {
        let field = FieldId::SiteRank(rank);
        let selection = match value.as_choice() {
            Some(Selection::Selected(Choice::Listed(name))) => {
                let site = self
                    .catalog
                    .find(name)
                    .cloned()
                    .ok_or_else(|| not_offered(field, &Choice::Listed(name.clone())))?;
                Selection::Selected(site)
            }
            Some(Selection::Selected(Choice::Other)) => {
                return Err(not_offered(field, &Choice::Other));
            }
            _ => Selection::Unselected,
        };

        match ranking::set_rank(&self.catalog, rank, selection, submission.ranks()) {
            Ok(ranks) => {
                submission.ranks = ranks;
                debug!(rank, "rank updated");
                Ok(ErrorReport::new())
            }
            Err(RankError::Conflict { site, held_by }) => Ok(ErrorReport::single(format!(
                "'{site}' is already your choice for rank {held_by}; pick a different site for rank {rank}."
            ))),
            Err(other) => Err(rank_violation(field, other)),
        }
    }

    fn field_errors(&self, submission: &Submission, section: &SectionSchema) -> Vec<String> {
        let values = submission.values();
        let mut messages: Vec<String> =
            dependency::visible_fields(&self.questionnaire, values, section)
                .filter_map(|schema| self.field_error(values, schema))
                .collect();

        if section.fields.iter().any(|schema| schema.id.is_rank()) {
            messages.extend(ranking::completeness_errors(submission.ranks()));
        }
        messages
    }

    fn field_error(&self, values: &FieldValues, schema: &FieldSchema) -> Option<String> {
        let label = schema.label;
        let value = values.get(&schema.id);

        match &schema.kind {
            FieldKind::Text { format } => {
                let text = value.and_then(FieldValue::as_text).unwrap_or("").trim();
                if text.is_empty() {
                    if !schema.is_required() {
                        return None;
                    }
                    return Some(match schema.governing_field() {
                        Some(governing) => {
                            let governing_label = self
                                .questionnaire
                                .field(governing)
                                .map(|parent| parent.label)
                                .unwrap_or("the previous question");
                            format!("'Other' was selected for {governing_label}; specify {label}.")
                        }
                        None => format!("{label} is required."),
                    });
                }
                format_error(*format, label, text)
            }
            FieldKind::SingleChoice { .. } => {
                let selected = value
                    .and_then(FieldValue::as_choice)
                    .map(Selection::is_selected)
                    .unwrap_or(false);
                (schema.is_required() && !selected).then(|| format!("Select {label}."))
            }
            FieldKind::MultiChoice { max_selections, .. } => {
                let count = value.and_then(FieldValue::as_choices).map_or(0, <[Choice]>::len);
                if count == 0 && schema.is_required() {
                    return Some(format!("Select at least one option for {label}."));
                }
                match max_selections {
                    Some(max) if count > *max => {
                        Some(format!("Select at most {max} options for {label}."))
                    }
                    _ => None,
                }
            }
            FieldKind::DerivedChoice { source } => {
                let offered = dependency::derived_options(&self.questionnaire, values, *source);
                let valid = value
                    .and_then(FieldValue::as_choice)
                    .filter(|selection| selection.is_selected())
                    .map(|selection| offered.contains(selection))
                    .unwrap_or(false);
                // With nothing to choose from, the source field reports the problem.
                let has_options = offered.len() > 1;
                (schema.is_required() && has_options && !valid)
                    .then(|| format!("Select {label} from your chosen options."))
            }
            FieldKind::Number { min_exclusive, max } => {
                let number = value.and_then(FieldValue::as_number).unwrap_or(f64::NAN);
                let in_range = number > *min_exclusive && number <= *max;
                (!in_range).then(|| {
                    format!("{label} must be greater than {min_exclusive} and at most {max}.")
                })
            }
            FieldKind::SiteRank => None,
        }
    }
}

impl Default for IntakeWizard {
    fn default() -> Self {
        Self::standard()
    }
}

fn format_error(format: TextFormat, label: &str, text: &str) -> Option<String> {
    match format {
        TextFormat::Email if !validation::is_valid_email(text) => {
            Some(format!("{label} is not a valid email address."))
        }
        TextFormat::Phone if !validation::is_valid_phone(text) => Some(format!(
            "{label} is not a valid mobile number (for example 050-1234567)."
        )),
        TextFormat::NationalId if !validation::is_valid_national_id(text) => {
            Some(format!("{label} must be 8 or 9 digits."))
        }
        _ => None,
    }
}

fn static_choices<'a>(
    options: &'a [&'static str],
    allows_other: bool,
) -> impl Iterator<Item = Choice> + 'a {
    options
        .iter()
        .map(|option| Choice::listed(*option))
        .chain(allows_other.then_some(Choice::Other))
}

fn site_choice(slot: Selection<Site>) -> Selection<Choice> {
    match slot {
        Selection::Selected(site) => Selection::Selected(Choice::Listed(site.0)),
        Selection::Unselected => Selection::Unselected,
    }
}

fn choice_label(choice: &Choice) -> String {
    match choice {
        Choice::Listed(value) => value.clone(),
        Choice::Other => "other".to_string(),
    }
}

fn not_offered(field: FieldId, choice: &Choice) -> ContractViolation {
    ContractViolation::OptionNotOffered {
        field,
        option: choice_label(choice),
    }
}

fn rank_violation(field: FieldId, error: RankError) -> ContractViolation {
    match error {
        RankError::OutOfRange { rank, rank_count } => {
            ContractViolation::RankOutOfRange { rank, rank_count }
        }
        RankError::Conflict { site, .. } | RankError::UnknownSite(site) => {
            ContractViolation::OptionNotOffered {
                field,
                option: site.0,
            }
        }
    }
}

