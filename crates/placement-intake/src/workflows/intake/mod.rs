//! Student placement intake: a sectioned questionnaire wizard with conditional fields, site
//! ranking, per-section validation and append-only submission storage.

pub mod catalog;
pub mod dependency;
pub mod domain;
pub mod drive;
pub mod ranking;
pub mod record;
pub mod repository;
pub mod schema;
pub mod service;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, SiteCatalog};
pub use domain::{
    Choice, FieldId, FieldValue, SectionId, Selection, Site, Submission, UnknownFieldKey,
    ValueKind, WizardStage,
};
pub use drive::{
    DriveGateway, DriveOperationError, DriveSpreadsheetMirror, GoogleDriveClient,
    ServiceAccountDrive,
};
pub use ranking::{RankAllocation, RankError, RankProjection};
pub use record::{RecordColumn, SubmissionRecord};
pub use repository::{
    CsvSubmissionStore, MirrorError, MirroredSubmissionStore, PersistenceError,
    SpreadsheetMirror, SubmissionStore,
};
pub use schema::{FieldKind, FieldSchema, Questionnaire, Requirement, SectionSchema, TextFormat};
pub use service::{AdvanceOutcome, IntakeService, IntakeServiceError};
pub use validation::{collect_errors, ErrorReport};
pub use wizard::{ContractViolation, IntakeWizard, WizardSetupError};
