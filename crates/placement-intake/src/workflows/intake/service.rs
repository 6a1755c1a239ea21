use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::Submission;
use super::record::SubmissionRecord;
use super::repository::{PersistenceError, SubmissionStore};
use super::validation::ErrorReport;
use super::wizard::{ContractViolation, IntakeWizard};

/// Service composing the wizard with the persistence port for the terminal transition.
pub struct IntakeService<S> {
    wizard: Arc<IntakeWizard>,
    store: Arc<S>,
}

/// Result of an advance attempt driven through the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AdvanceOutcome {
    /// The active section failed its gate; nothing moved.
    Blocked { errors: ErrorReport },
    Moved { section: usize },
    /// The last section passed and the record was stored. The submission has been reset.
    Submitted { record: SubmissionRecord },
}

impl<S> IntakeService<S>
where
    S: SubmissionStore + 'static,
{
    pub fn new(wizard: Arc<IntakeWizard>, store: Arc<S>) -> Self {
        Self { wizard, store }
    }

    pub fn wizard(&self) -> &IntakeWizard {
        &self.wizard
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn start(&self) -> Submission {
        self.wizard.new_submission()
    }

    /// Advance the active section and, after the last one, finalize. A persistence failure leaves
    /// the submission submitted so [`IntakeService::finalize`] can retry.
    pub fn advance(&self, submission: &mut Submission) -> Result<AdvanceOutcome, IntakeServiceError> {
        let errors = self.wizard.advance(submission)?;
        if !errors.is_empty() {
            return Ok(AdvanceOutcome::Blocked { errors });
        }

        match self.wizard.current_section(submission) {
            Some(section) => Ok(AdvanceOutcome::Moved { section }),
            None => {
                let record = self.finalize(submission)?;
                Ok(AdvanceOutcome::Submitted { record })
            }
        }
    }

    /// Assemble and append the record of a submitted submission, then start over.
    pub fn finalize(&self, submission: &mut Submission) -> Result<SubmissionRecord, IntakeServiceError> {
        let record = self.wizard.assemble_record(submission)?;

        if let Err(err) = self.store.append(&record) {
            warn!(error = %err, "submission append failed; keeping submission for retry");
            return Err(err.into());
        }

        info!(columns = record.len(), "submission finalized");
        self.wizard.reset(submission);
        Ok(record)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
