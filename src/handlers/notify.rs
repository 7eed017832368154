//! Author notification emails

use crate::error::AppError;
use crate::handlers::AppState;
use crate::models::{
    ReviewCompleteRequest, RevisionRequestedRequest, SubmissionNotice,
    SubmissionReceivedRequest, SuccessResponse,
};
use crate::templates::Recipient;
use crate::validation::{require, validate_email};
use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notify/submission-received", post(submission_received))
        .route("/notify/review-complete", post(review_complete))
        .route("/notify/revision-requested", post(revision_requested))
}

/// Validated addressing fields of a notification
struct Addressed<'a> {
    recipient: Recipient<'a>,
    author_email: &'a str,
}

fn address(notice: &SubmissionNotice) -> Result<Addressed<'_>, AppError> {
    let submission_id = require("submissionId", notice.submission_id.as_deref())?;
    let title = require("title", notice.title.as_deref())?;
    let author_email = require("authorEmail", notice.author_email.as_deref())?;
    validate_email(author_email)?;

    let author_name = notice
        .author_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Author");

    Ok(Addressed {
        recipient: Recipient {
            submission_id,
            title,
            author_name,
        },
        author_email,
    })
}

fn subject(journal_name: &str, kind: &str, detail: &str) -> String {
    format!("[{}] {}: {}", journal_name, kind, detail)
}

/// Notify an author that their submission arrived
pub async fn submission_received(
    State(state): State<AppState>,
    payload: Result<Json<SubmissionReceivedRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(request) = payload?;
    let to = address(&request.notice)?;
    let settings = &state.config.email;

    let html = state
        .templates
        .submission_received(settings, &to.recipient)?;
    let subject = subject(
        &settings.journal_name,
        "Submission Received",
        to.recipient.title,
    );

    state.email.send(to.author_email, &subject, &html).await?;
    tracing::info!(
        "Sent submission-received notice for {}",
        to.recipient.submission_id
    );

    Ok(Json(SuccessResponse::ok()))
}

/// Send review results with the decision and per-criterion scores
pub async fn review_complete(
    State(state): State<AppState>,
    payload: Result<Json<ReviewCompleteRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(request) = payload?;
    let to = address(&request.notice)?;
    let decision = request.decision.as_deref().map(str::trim).unwrap_or_default();
    let settings = &state.config.email;

    let html = state.templates.review_complete(
        settings,
        &to.recipient,
        decision,
        &request.scores,
        request.summary.as_deref(),
    )?;
    let detail = if decision.is_empty() {
        to.recipient.title.to_string()
    } else {
        format!("{} - {}", to.recipient.title, decision)
    };
    let subject = subject(&settings.journal_name, "Review Complete", &detail);

    state.email.send(to.author_email, &subject, &html).await?;
    tracing::info!(
        "Sent review-complete notice for {} ({})",
        to.recipient.submission_id,
        decision
    );

    Ok(Json(SuccessResponse::ok()))
}

/// Ask an author for a revision
pub async fn revision_requested(
    State(state): State<AppState>,
    payload: Result<Json<RevisionRequestedRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(request) = payload?;
    let to = address(&request.notice)?;
    let settings = &state.config.email;

    let html = state.templates.revision_requested(
        settings,
        &to.recipient,
        request.revision_type.as_deref().unwrap_or_default(),
        request.feedback.as_ref(),
    )?;
    let subject = subject(
        &settings.journal_name,
        "Revision Requested",
        to.recipient.title,
    );

    state.email.send(to.author_email, &subject, &html).await?;
    tracing::info!(
        "Sent revision-requested notice for {}",
        to.recipient.submission_id
    );

    Ok(Json(SuccessResponse::ok()))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{post_json, read_json, send, TestApp};
    use axum::http::StatusCode;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_submission_received_sends_one_email() {
        let resend = MockServer::start_async().await;
        let mock = resend
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/emails")
                    .header("authorization", "Bearer resend-key")
                    .body_includes(r#""from":"notifications@journal.example""#)
                    .body_includes(r#""to":["ada@uni.edu"]"#)
                    .body_includes(r#""subject":"[Agentic Journal] Submission Received: Agents""#);
                then.status(200).body(r#"{"id":"e1"}"#);
            })
            .await;

        let app = TestApp::new().with_resend(&resend);
        let response = send(
            app.router(),
            post_json(
                "/notify/submission-received",
                json!({
                    "submissionId": "AJ-1",
                    "title": "Agents",
                    "authorEmail": "ada@uni.edu",
                    "authorName": "Ada"
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({ "success": true }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_review_complete_subject_includes_decision() {
        let resend = MockServer::start_async().await;
        let mock = resend
            .mock_async(|when, then| {
                when.method(POST).path("/emails").body_includes(
                    r#""subject":"[Agentic Journal] Review Complete: Agents - Minor Revision""#,
                );
                then.status(200).body(r#"{"id":"e2"}"#);
            })
            .await;

        let app = TestApp::new().with_resend(&resend);
        let response = send(
            app.router(),
            post_json(
                "/notify/review-complete",
                json!({
                    "submissionId": "AJ-1",
                    "title": "Agents",
                    "authorEmail": "ada@uni.edu",
                    "decision": "Minor Revision",
                    "scores": { "technical": 4.0, "clarity": 3.5 },
                    "summary": "Good"
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_review_complete_without_decision_uses_neutral_badge() {
        let resend = MockServer::start_async().await;
        let mock = resend
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/emails")
                    .body_includes(r#""subject":"[Agentic Journal] Review Complete: Agents""#)
                    .body_includes("background: #666;");
                then.status(200).body(r#"{"id":"e4"}"#);
            })
            .await;

        let app = TestApp::new().with_resend(&resend);
        let response = send(
            app.router(),
            post_json(
                "/notify/review-complete",
                json!({
                    "submissionId": "AJ-1",
                    "title": "Agents",
                    "authorEmail": "ada@uni.edu"
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_revision_requested_with_text_feedback() {
        let resend = MockServer::start_async().await;
        let mock = resend
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/emails")
                    .body_includes("Please expand the evaluation");
                then.status(200).body(r#"{"id":"e3"}"#);
            })
            .await;

        let app = TestApp::new().with_resend(&resend);
        let response = send(
            app.router(),
            post_json(
                "/notify/revision-requested",
                json!({
                    "submissionId": "AJ-1",
                    "title": "Agents",
                    "authorEmail": "ada@uni.edu",
                    "revisionType": "Major",
                    "feedback": "Please expand the evaluation"
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_provider_failure_is_500_with_upstream_text() {
        let resend = MockServer::start_async().await;
        resend
            .mock_async(|when, then| {
                when.method(POST).path("/emails");
                then.status(403).body("domain not verified");
            })
            .await;

        let app = TestApp::new().with_resend(&resend);
        let response = send(
            app.router(),
            post_json(
                "/notify/submission-received",
                json!({
                    "submissionId": "AJ-1",
                    "title": "Agents",
                    "authorEmail": "ada@uni.edu"
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Failed to send email: domain not verified" })
        );
    }

    #[tokio::test]
    async fn test_missing_author_email_sends_nothing() {
        let resend = MockServer::start_async().await;
        let mock = resend
            .mock_async(|when, then| {
                when.method(POST).path("/emails");
                then.status(200);
            })
            .await;

        let app = TestApp::new().with_resend(&resend);
        let response = send(
            app.router(),
            post_json(
                "/notify/submission-received",
                json!({ "submissionId": "AJ-1", "title": "Agents" }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Field 'authorEmail' is required" })
        );
        mock.assert_calls_async(0).await;
    }
}
