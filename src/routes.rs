use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::ApiError;
use crate::export::{export_document, sanitize_filename, ExportFormat};
use crate::jobs::{CancelOutcome, JobId};
use crate::state::AppState;
use crate::translate::languages::LANGUAGES;
use crate::translate::GenerationOptions;
use crate::utils::decode::decode_upload;

const NOT_FOUND: &str = "not_found";

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        .route("/api/languages", get(list_languages))

        // Jobs
        .route("/translate_async", post(submit_text_job))
        .route("/translate_file_async", post(submit_file_job))
        .route("/progress/:job_id", get(get_progress))
        .route("/result/:job_id", get(get_result))
        .route("/cancel/:job_id", post(cancel_job))

        // Export
        .route("/export/word", post(export_word))
        .route("/export/pdf", post(export_pdf))
}

/// Full application: routes, state, CORS and request tracing
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TranslateJobRequest {
    pub text: String,
    #[serde(default, alias = "source_lang")]
    pub source: Option<String>,
    #[serde(alias = "target_lang")]
    pub target: String,
    #[serde(default, alias = "generation_options")]
    pub generate: Option<GenerationOptions>,
}

#[derive(Debug, Deserialize)]
pub struct FileJobQuery {
    pub target: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: u8,
    pub status: &'static str,
    pub total_units: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub status: &'static str,
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub text: String,
    pub filename: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn enqueue(
    state: &AppState,
    text: String,
    source: Option<String>,
    target: Option<String>,
    generate: GenerationOptions,
) -> Result<Json<SubmitResponse>, ApiError> {
    let defaults = &state.config.translator;
    let source = non_blank(source).unwrap_or_else(|| defaults.default_source.clone());
    let target = non_blank(target).unwrap_or_else(|| defaults.default_target.clone());

    let job_id = state.jobs.submit(text, &source, &target, generate)?;
    Ok(Json(SubmitResponse {
        job_id,
        status: "queued",
    }))
}

async fn submit_text_job(
    State(state): State<AppState>,
    payload: Result<Json<TranslateJobRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(payload) = payload?;
    enqueue(
        &state,
        payload.text,
        payload.source,
        Some(payload.target),
        payload.generate.unwrap_or_default(),
    )
}

async fn submit_file_job(
    State(state): State<AppState>,
    Query(query): Query<FileJobQuery>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        debug!(filename = ?filename, bytes = data.len(), "Received file for translation");

        let text = decode_upload(&data).into_owned();
        return enqueue(&state, text, query.source, query.target, GenerationOptions::new());
    }

    Err(ApiError::BadRequest("No file provided".to_string()))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<ProgressResponse> {
    let response = match state.store().get(&JobId::from(job_id)) {
        Some(job) => ProgressResponse {
            progress: job.progress,
            status: job.status.as_str(),
            total_units: job.total_units,
        },
        None => ProgressResponse {
            progress: 0,
            status: NOT_FOUND,
            total_units: None,
        },
    };
    Json(response)
}

async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<ResultResponse> {
    let response = match state.store().get(&JobId::from(job_id)) {
        Some(job) => ResultResponse {
            status: job.status.as_str(),
            result: job.result,
            error: job.error,
            created_at: Some(job.created_at),
            finished_at: job.finished_at,
        },
        None => ResultResponse {
            status: NOT_FOUND,
            result: None,
            error: None,
            created_at: None,
            finished_at: None,
        },
    };
    Json(response)
}

async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<Value> {
    let status = match state.jobs.cancel(&JobId::from(job_id)) {
        CancelOutcome::Cancelled => "cancelled",
        CancelOutcome::Finished(status) => status.as_str(),
        CancelOutcome::NotFound => NOT_FOUND,
    };
    Json(json!({ "status": status }))
}

async fn export_word(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    export(&state, ExportFormat::Word, payload)
}

async fn export_pdf(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    export(&state, ExportFormat::Pdf, payload)
}

fn export(state: &AppState, format: ExportFormat, payload: ExportRequest) -> Result<Response, ApiError> {
    let fallback = &state.config.export.default_filename;
    let filename = sanitize_filename(payload.filename.as_deref(), fallback);
    let document = export_document(format, &payload.text, &filename)?;

    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", document.filename).as_bytes(),
    )
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(document.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let translator_healthy = state.translator.health_check().await;
    Json(json!({
        "status": "ok",
        "translator": translator_healthy,
        "queued": state.jobs.queued_count(),
        "running": state.jobs.running_count(),
        "max_concurrent": state.jobs.settings().max_concurrent,
        "exports": {
            "word": ExportFormat::Word.is_available(),
            "pdf": ExportFormat::Pdf.is_available(),
        },
    }))
}

async fn list_languages() -> Json<Value> {
    Json(json!(LANGUAGES))
}
