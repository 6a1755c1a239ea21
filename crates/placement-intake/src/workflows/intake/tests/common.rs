use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};

use crate::workflows::intake::domain::{Choice, FieldId, FieldValue, Submission};
use crate::workflows::intake::record::SubmissionRecord;
use crate::workflows::intake::repository::{PersistenceError, SubmissionStore};
use crate::workflows::intake::wizard::IntakeWizard;

pub(super) const ZIV: &str = "Ziv Medical Center";
pub(super) const WELFARE: &str = "Kiryat Shmona Welfare Services";
pub(super) const SENIOR: &str = "Senior Day Center";
pub(super) const YOUTH: &str = "Safed Youth Club";

pub(super) fn submitted_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 1)
        .and_then(|date| date.and_hms_opt(10, 30, 0))
        .expect("valid timestamp")
}

pub(super) fn set(wizard: &IntakeWizard, submission: &mut Submission, field: FieldId, value: FieldValue) {
    let report = wizard
        .set_field(submission, field, value)
        .unwrap_or_else(|err| panic!("set {field} failed: {err}"));
    assert!(report.is_empty(), "set {field} reported {:?}", report.messages());
}

pub(super) fn text(value: &str) -> FieldValue {
    FieldValue::text(value)
}

pub(super) fn choices(values: &[&str]) -> FieldValue {
    FieldValue::Choices(values.iter().map(|value| Choice::listed(*value)).collect())
}

pub(super) fn fill_personal_details(wizard: &IntakeWizard, submission: &mut Submission) {
    set(wizard, submission, FieldId::FirstName, text("Noa"));
    set(wizard, submission, FieldId::LastName, text("Levi"));
    set(wizard, submission, FieldId::NationalId, text("123456789"));
    set(wizard, submission, FieldId::Gender, FieldValue::listed("Female"));
    set(wizard, submission, FieldId::SocialAffiliation, FieldValue::listed("Jewish"));
    set(wizard, submission, FieldId::MotherTongue, FieldValue::listed("Hebrew"));
    set(wizard, submission, FieldId::ExtraLanguages, choices(&["English"]));
    set(wizard, submission, FieldId::Phone, text("050-1234567"));
    set(wizard, submission, FieldId::Address, text("12 Herzl St, Safed"));
    set(wizard, submission, FieldId::Email, text("noa@example.org"));
    set(wizard, submission, FieldId::StudyYear, FieldValue::listed("BA - year 3"));
    set(wizard, submission, FieldId::StudyTrack, text("Social work"));
    set(
        wizard,
        submission,
        FieldId::Mobility,
        FieldValue::listed("I can travel by public transport"),
    );
}

pub(super) fn fill_preferences(wizard: &IntakeWizard, submission: &mut Submission) {
    set(wizard, submission, FieldId::PreviousTraining, FieldValue::listed("No"));
    set(wizard, submission, FieldId::PreferredDomains, choices(&["Health", "Family"]));
    set(wizard, submission, FieldId::TopDomain, FieldValue::listed("Health"));
    set(wizard, submission, FieldId::SiteRank(1), FieldValue::listed(ZIV));
    set(wizard, submission, FieldId::SiteRank(2), FieldValue::listed(SENIOR));
    set(wizard, submission, FieldId::SiteRank(3), FieldValue::listed(WELFARE));
}

pub(super) fn fill_section(wizard: &IntakeWizard, submission: &mut Submission, section: usize) {
    match section {
        1 => fill_personal_details(wizard, submission),
        2 => fill_preferences(wizard, submission),
        3 => set(wizard, submission, FieldId::GradeAverage, FieldValue::Number(88.5)),
        4 => {
            set(wizard, submission, FieldId::Adjustments, choices(&["None"]));
            set(wizard, submission, FieldId::AdjustmentsDetails, text("No adjustments needed"));
        }
        5 => {
            for field in [
                FieldId::MotivationEffort,
                FieldId::MotivationGrowth,
                FieldId::MotivationCommitment,
            ] {
                set(wizard, submission, field, FieldValue::listed("Strongly agree"));
            }
        }
        _ => {}
    }
}

/// Fill, confirm and pass every section before `target`.
pub(super) fn advance_to(wizard: &IntakeWizard, submission: &mut Submission, target: usize) {
    while wizard
        .current_section(submission)
        .map(|section| section < target)
        .unwrap_or(false)
    {
        let section = wizard.current_section(submission).expect("active section");
        fill_section(wizard, submission, section);
        wizard.acknowledge(submission, true).expect("acknowledge");
        let report = wizard.advance(submission).expect("advance");
        assert!(
            report.is_empty(),
            "section {section} blocked: {:?}",
            report.messages()
        );
    }
}

/// Submission that has passed every section.
pub(super) fn submitted(wizard: &IntakeWizard) -> Submission {
    let mut submission = wizard.new_submission();
    let last = wizard.questionnaire().section_count();
    advance_to(wizard, &mut submission, last);
    wizard.acknowledge(&mut submission, true).expect("acknowledge");
    let report = wizard.advance(&mut submission).expect("final advance");
    assert!(report.is_empty(), "final gate blocked: {:?}", report.messages());
    submission
}

#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<Vec<SubmissionRecord>>,
}

impl MemoryStore {
    pub(super) fn records(&self) -> Vec<SubmissionRecord> {
        self.records.lock().expect("store mutex poisoned").clone()
    }
}

impl SubmissionStore for MemoryStore {
    fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}

/// Fails the first `failures` appends, then stores.
#[derive(Default)]
pub(super) struct FlakyStore {
    failures: usize,
    attempts: AtomicUsize,
    inner: MemoryStore,
}

impl FlakyStore {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(super) fn records(&self) -> Vec<SubmissionRecord> {
        self.inner.records()
    }
}

impl SubmissionStore for FlakyStore {
    fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(PersistenceError::Unavailable("disk full".to_string()));
        }
        self.inner.append(record)
    }
}
