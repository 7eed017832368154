//! Signed PDF uploads, authenticated downloads and review triggering
//!
//! Flow: `POST /presign` hands out a short-lived upload ticket, `POST /upload`
//! accepts the multipart file against that ticket, `GET /pdf/{id}` serves it
//! back to token holders, and `POST /trigger-review` files the review issue.

use crate::error::AppError;
use crate::github::{GitHubUser, NewIssue};
use crate::handlers::middleware::bearer_token;
use crate::handlers::AppState;
use crate::models::{
    PresignRequest, PresignResponse, TriggerReviewRequest, TriggerReviewResponse, UploadResponse,
};
use crate::signing::{generate_ticket, object_key, ticket_ttl, validate_ticket};
use crate::store::StoredObject;
use crate::templates::ReviewIssue;
use crate::validation::{
    looks_like_pdf, validate_file_size, validate_pdf_filename, validate_submission_id,
    ValidationError,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Path, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::SecondsFormat;
use std::collections::BTreeMap;
use tower_http::limit::RequestBodyLimitLayer;

/// Room for multipart boundaries and the small text fields
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub fn routes(max_upload_size: usize) -> Router<AppState> {
    // Only the upload route may exceed axum's default body cap
    let uploads = Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            max_upload_size + MULTIPART_OVERHEAD,
        ));

    Router::new()
        .route("/presign", post(presign))
        .route("/pdf/:submission_id", get(download))
        .route("/trigger-review", post(trigger_review))
        .merge(uploads)
}

/// Resolve a caller's GitHub token or reject with 401
async fn require_github_user(
    state: &AppState,
    token: &str,
    message: &str,
) -> Result<GitHubUser, AppError> {
    match state.github.validate_token(token).await {
        Some(user) => Ok(user),
        None => {
            tracing::warn!("Rejected request with invalid GitHub token");
            Err(AppError::Unauthorized(message.to_string()))
        }
    }
}

/// Issue an upload ticket for one submission's PDF
pub async fn presign(
    State(state): State<AppState>,
    payload: Result<Json<PresignRequest>, JsonRejection>,
) -> Result<Json<PresignResponse>, AppError> {
    let Json(request) = payload?;

    let user = require_github_user(&state, &request.github_token, "Invalid GitHub token").await?;

    validate_pdf_filename(&request.filename)?;
    validate_file_size(request.file_size, state.config.max_upload_size)?;
    validate_submission_id(&request.submission_id)?;

    let expiry = state.clock.now_millis() + ticket_ttl().num_milliseconds();
    let key = object_key(&request.submission_id);
    let upload_token = generate_ticket(
        &state.config.upload_secret,
        &request.submission_id,
        &key,
        expiry,
    );

    tracing::info!(
        "Issued upload ticket for {} to {} ({} bytes declared)",
        request.submission_id,
        user.login,
        request.file_size
    );

    Ok(Json(PresignResponse {
        upload_url: format!("{}/upload", state.config.public_base_url),
        key,
        upload_token,
        expiry,
    }))
}

#[derive(Default)]
struct UploadForm {
    file: Option<Bytes>,
    filename: Option<String>,
    upload_token: Option<String>,
    key: Option<String>,
    submission_id: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.filename = field.file_name().map(str::to_string);
                form.file = Some(field.bytes().await?);
            }
            "uploadToken" => form.upload_token = Some(field.text().await?),
            "key" => form.key = Some(field.text().await?),
            "submissionId" => form.submission_id = Some(field.text().await?),
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}

/// Accept a ticketed multipart upload and store it
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_upload_form(multipart?).await?;

    let submission_id = form.submission_id.unwrap_or_default();
    let key = form.key.unwrap_or_default();
    let token = form.upload_token.unwrap_or_default();

    let now = state.clock.now_millis();
    let ticket = if key == object_key(&submission_id) {
        validate_ticket(&state.config.upload_secret, &token, &submission_id, &key, now)
            .map_err(|e| e.to_string())
    } else {
        Err(format!("key '{}' does not belong to submission", key))
    };
    if let Err(reason) = ticket {
        tracing::warn!("Rejected upload for '{}': {}", submission_id, reason);
        return Err(AppError::Unauthorized(
            "Invalid or expired upload token".to_string(),
        ));
    }

    let file = match form.file {
        Some(file) if !file.is_empty() => file,
        _ => return Err(ValidationError::EmptyFile.into()),
    };
    if file.len() > state.config.max_upload_size {
        return Err(AppError::BadRequest("File too large".to_string()));
    }
    if !looks_like_pdf(&file) {
        tracing::warn!(
            "Upload for {} does not start with a PDF signature",
            submission_id
        );
    }

    let size = file.len() as u64;
    let metadata = BTreeMap::from([
        ("submissionId".to_string(), submission_id.clone()),
        (
            "uploadedAt".to_string(),
            state.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        (
            "originalFilename".to_string(),
            form.filename.unwrap_or_default(),
        ),
    ]);

    state
        .objects
        .put(
            &key,
            StoredObject {
                body: file.to_vec(),
                content_type: PDF_CONTENT_TYPE.to_string(),
                metadata,
            },
        )
        .await?;

    tracing::info!("Stored {} ({} bytes)", key, size);

    Ok(Json(UploadResponse {
        success: true,
        key,
        download_url: format!("{}/pdf/{}", state.config.public_base_url, submission_id),
        size,
    }))
}

/// Serve a stored PDF to a caller holding a valid GitHub token
pub async fn download(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token =
        bearer_token(&headers).ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;
    require_github_user(&state, token, "Invalid token").await?;

    validate_submission_id(&submission_id)?;

    let object = state
        .objects
        .get(&object_key(&submission_id))
        .await?
        .ok_or_else(|| AppError::NotFound("PDF not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.pdf\"", submission_id),
            ),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        object.body,
    )
        .into_response())
}

/// Labels for a review issue; a blank paper type adds no label
fn issue_labels(paper_type: &str) -> Vec<String> {
    let paper_type = paper_type.trim();
    let mut labels = vec!["submission".to_string()];
    if !paper_type.is_empty() {
        labels.push(paper_type.to_string());
    }
    labels.push("direct-upload".to_string());
    labels
}

/// File the issue that starts the review workflow
pub async fn trigger_review(
    State(state): State<AppState>,
    payload: Result<Json<TriggerReviewRequest>, JsonRejection>,
) -> Result<Json<TriggerReviewResponse>, AppError> {
    let Json(request) = payload?;

    let user = require_github_user(&state, &request.github_token, "Invalid GitHub token").await?;

    validate_submission_id(&request.submission_id)?;
    let metadata = &request.metadata;

    let storage_key = object_key(&request.submission_id);
    let body = state.templates.review_issue(
        &state.config.email.journal_name,
        &ReviewIssue {
            submission_id: &request.submission_id,
            metadata,
            storage_key: &storage_key,
            pdf_url: &request.pdf_url,
        },
    )?;

    let issue = state
        .github
        .create_issue(&NewIssue {
            title: format!("[Submission] {}", metadata.title.trim()),
            body,
            labels: issue_labels(&metadata.paper_type),
        })
        .await?;

    tracing::info!(
        "Created review issue #{} for {} on behalf of {}",
        issue.number,
        request.submission_id,
        user.login
    );

    Ok(Json(TriggerReviewResponse {
        success: true,
        issue_number: issue.number,
        issue_url: issue.html_url,
    }))
}
