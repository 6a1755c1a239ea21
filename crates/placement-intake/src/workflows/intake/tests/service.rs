use std::sync::Arc;

use super::common::*;
use crate::workflows::intake::service::{AdvanceOutcome, IntakeService, IntakeServiceError};
use crate::workflows::intake::{ContractViolation, IntakeWizard, PersistenceError, SubmissionStore};

fn service<S: SubmissionStore + 'static>(store: S) -> IntakeService<S> {
    IntakeService::new(Arc::new(IntakeWizard::standard()), Arc::new(store))
}

#[test]
fn advance_reports_blocked_then_moved() {
    let service = service(MemoryStore::default());
    let mut submission = service.start();

    let blocked = service.advance(&mut submission).expect("advance");
    assert!(matches!(blocked, AdvanceOutcome::Blocked { ref errors } if !errors.is_empty()));

    fill_personal_details(service.wizard(), &mut submission);
    service
        .wizard()
        .acknowledge(&mut submission, true)
        .expect("acknowledge");
    let moved = service.advance(&mut submission).expect("advance");
    assert_eq!(moved, AdvanceOutcome::Moved { section: 2 });
}

#[test]
fn last_advance_stores_the_record_and_starts_over() {
    let service = service(MemoryStore::default());
    let mut submission = service.start();
    advance_to(service.wizard(), &mut submission, 6);
    service
        .wizard()
        .acknowledge(&mut submission, true)
        .expect("acknowledge");

    let outcome = service.advance(&mut submission).expect("advance");

    let AdvanceOutcome::Submitted { record } = outcome else {
        panic!("expected a submitted outcome, got {outcome:?}");
    };
    assert_eq!(record.get("first_name"), Some("Noa"));
    assert_eq!(service.store().records(), vec![record]);
    assert_eq!(submission, service.wizard().new_submission());
}

#[test]
fn failed_append_keeps_the_submission_for_retry() {
    let service = service(FlakyStore::failing(1));
    let mut submission = service.start();
    advance_to(service.wizard(), &mut submission, 6);
    service
        .wizard()
        .acknowledge(&mut submission, true)
        .expect("acknowledge");

    let err = service.advance(&mut submission).expect_err("store fails once");
    assert!(matches!(
        err,
        IntakeServiceError::Persistence(PersistenceError::Unavailable(_))
    ));
    assert!(submission.is_submitted());
    assert!(service.store().records().is_empty());

    let record = service.finalize(&mut submission).expect("retry succeeds");
    assert_eq!(service.store().attempts(), 2);
    assert_eq!(service.store().records(), vec![record]);
    assert!(!submission.is_submitted());
}

#[test]
fn finalize_before_submit_is_a_contract_violation() {
    let service = service(MemoryStore::default());
    let mut submission = service.start();

    let err = service.finalize(&mut submission).expect_err("not submitted");

    assert!(matches!(
        err,
        IntakeServiceError::Contract(ContractViolation::NotSubmitted)
    ));
    assert!(service.store().records().is_empty());
}
