use crate::infra::{AppState, IntakeApi, SessionError};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use placement_intake::error::AppError;
use placement_intake::workflows::intake::{
    AdvanceOutcome, ContractViolation, FieldId, FieldKind, FieldValue, IntakeService,
    IntakeServiceError, IntakeWizard, Submission, SubmissionStore, WizardStage,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub(crate) struct SetFieldRequest {
    pub(crate) value: FieldValue,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AcknowledgeRequest {
    pub(crate) confirmed: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    pub(crate) session_id: String,
    pub(crate) stage: WizardStage,
    pub(crate) section: Option<SectionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionView {
    pub(crate) number: usize,
    pub(crate) title: &'static str,
    pub(crate) acknowledgement: &'static str,
    pub(crate) acknowledged: bool,
    pub(crate) fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FieldView {
    pub(crate) key: FieldId,
    pub(crate) label: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
    pub(crate) visible: bool,
    pub(crate) value: FieldValue,
}

fn session_view(
    wizard: &IntakeWizard,
    session_id: &str,
    submission: &Submission,
) -> Result<SessionView, ContractViolation> {
    let section = match (
        wizard.current_section(submission),
        wizard.current_schema(submission),
    ) {
        (Some(number), Some(schema)) => {
            let fields = schema
                .fields
                .iter()
                .map(|field| {
                    Ok(FieldView {
                        key: field.id,
                        label: field.label,
                        kind: field.kind.clone(),
                        required: field.is_required(),
                        visible: wizard.is_visible(submission, field.id)?,
                        value: wizard.value(submission, field.id)?,
                    })
                })
                .collect::<Result<Vec<_>, ContractViolation>>()?;
            Some(SectionView {
                number,
                title: schema.title(),
                acknowledgement: schema.acknowledgement,
                acknowledged: submission.is_acknowledged(schema.id),
                fields,
            })
        }
        _ => None,
    };

    Ok(SessionView {
        session_id: session_id.to_string(),
        stage: submission.stage(),
        section,
    })
}

pub(crate) fn intake_router<S>(api: IntakeApi<S>) -> Router
where
    S: SubmissionStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/intake/questionnaire",
            get(questionnaire_handler::<S>),
        )
        .route("/api/v1/intake/sessions", post(open_session_handler::<S>))
        .route(
            "/api/v1/intake/sessions/:session_id",
            get(session_handler::<S>).delete(close_session_handler::<S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/fields/:field",
            put(set_field_handler::<S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/options/:field",
            get(options_handler::<S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/acknowledge",
            post(acknowledge_handler::<S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/advance",
            post(advance_handler::<S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/retreat",
            post(retreat_handler::<S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/submit",
            post(submit_handler::<S>),
        )
        .with_state(api)
}

pub(crate) fn with_intake_routes<S>(api: IntakeApi<S>) -> Router
where
    S: SubmissionStore + 'static,
{
    intake_router(api)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn questionnaire_handler<S>(State(api): State<IntakeApi<S>>) -> Response
where
    S: SubmissionStore + 'static,
{
    let wizard = api.service.wizard();
    let payload = json!({
        "sections": wizard.questionnaire().sections(),
        "rank_count": wizard.questionnaire().rank_count(),
        "sites": wizard.catalog().sites(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn open_session_handler<S>(State(api): State<IntakeApi<S>>) -> Response
where
    S: SubmissionStore + 'static,
{
    let submission = api.service.start();
    let session_id = api.sessions.open(submission.clone());
    info!(%session_id, "intake session opened");
    view_response(api.service.wizard(), StatusCode::CREATED, &session_id, &submission)
}

pub(crate) async fn session_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    match api.sessions.snapshot(&session_id).await {
        Some(submission) => {
            view_response(api.service.wizard(), StatusCode::OK, &session_id, &submission)
        }
        None => unknown_session(&session_id),
    }
}

pub(crate) async fn close_session_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    match api.sessions.close(&session_id) {
        Ok(()) => {
            info!(%session_id, open = api.sessions.len(), "intake session closed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => session_error(&session_id, err),
    }
}

pub(crate) async fn set_field_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path((session_id, field)): Path<(String, String)>,
    Json(request): Json<SetFieldRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    let field: FieldId = match field.parse() {
        Ok(field) => field,
        Err(err) => return error_response(ContractViolation::from(err).into()),
    };

    let mut submission = match api.sessions.claim(&session_id) {
        Ok(submission) => submission,
        Err(err) => return session_error(&session_id, err),
    };

    let wizard = api.service.wizard();
    match wizard.set_field(&mut submission, field, request.value) {
        Err(err) => error_response(err.into()),
        Ok(report) if !report.is_empty() => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": report.messages() })),
        )
            .into_response(),
        Ok(_) => view_response(wizard, StatusCode::OK, &session_id, &submission),
    }
}

pub(crate) async fn options_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path((session_id, field)): Path<(String, String)>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    let Some(submission) = api.sessions.snapshot(&session_id).await else {
        return unknown_session(&session_id);
    };

    let options = field
        .parse::<FieldId>()
        .map_err(ContractViolation::from)
        .and_then(|field| api.service.wizard().options_for(&submission, field));

    match options {
        Ok(options) => (
            StatusCode::OK,
            Json(json!({ "field": field, "options": options })),
        )
            .into_response(),
        Err(err) => error_response(err.into()),
    }
}

pub(crate) async fn acknowledge_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path(session_id): Path<String>,
    Json(request): Json<AcknowledgeRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    let mut submission = match api.sessions.claim(&session_id) {
        Ok(submission) => submission,
        Err(err) => return session_error(&session_id, err),
    };

    let wizard = api.service.wizard();
    match wizard.acknowledge(&mut submission, request.confirmed) {
        Ok(()) => view_response(wizard, StatusCode::OK, &session_id, &submission),
        Err(err) => error_response(err.into()),
    }
}

pub(crate) async fn retreat_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    let mut submission = match api.sessions.claim(&session_id) {
        Ok(submission) => submission,
        Err(err) => return session_error(&session_id, err),
    };

    let wizard = api.service.wizard();
    match wizard.retreat(&mut submission) {
        Ok(()) => view_response(wizard, StatusCode::OK, &session_id, &submission),
        Err(err) => error_response(err.into()),
    }
}

/// Advancing past the last section appends to the store, which may reach Drive, so the work
/// runs on the blocking pool. The session stays claimed until it finishes.
pub(crate) async fn advance_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    let result = match run_blocking(&api, &session_id, |service, submission| {
        service.advance(submission)
    })
    .await
    {
        Ok(result) => result,
        Err(response) => return response,
    };

    match result {
        (_, Ok(AdvanceOutcome::Blocked { errors })) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "outcome": "blocked", "errors": errors.messages() })),
        )
            .into_response(),
        (submission, Ok(AdvanceOutcome::Moved { .. })) => view_response(
            api.service.wizard(),
            StatusCode::OK,
            &session_id,
            &submission,
        ),
        (_, Ok(AdvanceOutcome::Submitted { record })) => {
            info!(%session_id, "intake session submitted");
            (
                StatusCode::CREATED,
                Json(json!({ "outcome": "submitted", "record": record })),
            )
                .into_response()
        }
        (_, Err(err)) => error_response(err.into()),
    }
}

/// Retry storing a submission whose earlier append failed.
pub(crate) async fn submit_handler<S>(
    State(api): State<IntakeApi<S>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    match run_blocking(&api, &session_id, |service, submission| {
        service.finalize(submission)
    })
    .await
    {
        Ok((_, Ok(record))) => (
            StatusCode::CREATED,
            Json(json!({ "outcome": "submitted", "record": record })),
        )
            .into_response(),
        Ok((_, Err(err))) => error_response(err.into()),
        Err(response) => response,
    }
}

async fn run_blocking<S, T, F>(
    api: &IntakeApi<S>,
    session_id: &str,
    work: F,
) -> Result<(Submission, Result<T, IntakeServiceError>), Response>
where
    S: SubmissionStore + 'static,
    T: Send + 'static,
    F: FnOnce(&IntakeService<S>, &mut Submission) -> Result<T, IntakeServiceError>
        + Send
        + 'static,
{
    let mut submission = api
        .sessions
        .claim(session_id)
        .map_err(|err| session_error(session_id, err))?;
    let service = Arc::clone(&api.service);

    let joined = tokio::task::spawn_blocking(move || {
        let outcome = work(&service, &mut *submission);
        (submission.clone(), outcome)
    })
    .await;

    match joined {
        Ok(result) => Ok(result),
        Err(err) => {
            error!(error = %err, %session_id, "blocking intake task failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "intake task failed" })),
            )
                .into_response())
        }
    }
}

fn view_response(
    wizard: &IntakeWizard,
    status: StatusCode,
    session_id: &str,
    submission: &Submission,
) -> Response {
    match session_view(wizard, session_id, submission) {
        Ok(view) => (status, Json(view)).into_response(),
        Err(err) => error_response(err.into()),
    }
}

fn unknown_session(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown session '{session_id}'") })),
    )
        .into_response()
}

fn session_error(session_id: &str, error: SessionError) -> Response {
    match error {
        SessionError::Unknown => unknown_session(session_id),
        SessionError::Busy => (
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("session '{session_id}' is busy with another request") })),
        )
            .into_response(),
    }
}

fn error_response(error: AppError) -> Response {
    let status = match &error {
        AppError::Intake(
            ContractViolation::UnknownField(_) | ContractViolation::UnknownSection(_),
        ) => StatusCode::NOT_FOUND,
        AppError::Intake(
            ContractViolation::AlreadySubmitted
            | ContractViolation::NotSubmitted
            | ContractViolation::NoPreviousSection
            | ContractViolation::FieldNotInCurrentSection { .. },
        ) => StatusCode::CONFLICT,
        AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        other if other.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}
