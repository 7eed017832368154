//! Email and issue templates, compiled into the binary
//!
//! `.html` templates are autoescaped by tera; the markdown issue body is not.
//! Configured URLs are trusted and rendered with `safe`.

use crate::config::EmailSettings;
use crate::models::{Feedback, FeedbackItem, SubmissionMetadata};
use serde::Serialize;
use serde_json::{Map, Value};
use tera::{Context, Tera};

const SUBMISSION_RECEIVED: &str = "submission_received.html";
const REVIEW_COMPLETE: &str = "review_complete.html";
const REVISION_REQUESTED: &str = "revision_requested.html";
const REVIEW_ISSUE: &str = "review_issue.md";

/// Badge color for a review decision
pub fn decision_color(decision: &str) -> &'static str {
    match decision {
        "Accept" => "#28a745",
        "Minor Revision" => "#17a2b8",
        "Major Revision" => "#ffc107",
        "Reject" => "#dc3545",
        _ => "#666",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ScoreRow {
    criterion: String,
    score: String,
    percent: String,
}

fn score_rows(scores: &Map<String, Value>) -> Vec<ScoreRow> {
    scores
        .iter()
        .filter_map(|(criterion, value)| match value.as_f64() {
            Some(score) => Some(ScoreRow {
                criterion: capitalize(criterion),
                score: score.to_string(),
                percent: (score * 100.0 / 5.0).to_string(),
            }),
            None => {
                tracing::warn!("Skipping non-numeric score for criterion '{}'", criterion);
                None
            }
        })
        .collect()
}

/// Who a notification is about and for
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    pub submission_id: &'a str,
    pub title: &'a str,
    pub author_name: &'a str,
}

/// Everything the review issue body shows
#[derive(Debug, Clone, Copy)]
pub struct ReviewIssue<'a> {
    pub submission_id: &'a str,
    pub metadata: &'a SubmissionMetadata,
    pub storage_key: &'a str,
    pub pdf_url: &'a str,
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", include_str!("../templates/base.html")),
            (SUBMISSION_RECEIVED, include_str!("../templates/submission_received.html")),
            (REVIEW_COMPLETE, include_str!("../templates/review_complete.html")),
            (REVISION_REQUESTED, include_str!("../templates/revision_requested.html")),
            (REVIEW_ISSUE, include_str!("../templates/review_issue.md")),
        ])?;
        Ok(Self { tera })
    }

    fn letter_context(journal: &EmailSettings, to: &Recipient) -> Context {
        let mut ctx = Context::new();
        ctx.insert("journal_name", &journal.journal_name);
        ctx.insert("journal_url", &journal.journal_url);
        ctx.insert("submission_id", to.submission_id);
        ctx.insert("title", to.title);
        ctx.insert("author_name", to.author_name);
        ctx
    }

    pub fn submission_received(
        &self,
        journal: &EmailSettings,
        to: &Recipient,
    ) -> Result<String, tera::Error> {
        self.tera
            .render(SUBMISSION_RECEIVED, &Self::letter_context(journal, to))
    }

    pub fn review_complete(
        &self,
        journal: &EmailSettings,
        to: &Recipient,
        decision: &str,
        scores: &Map<String, Value>,
        summary: Option<&str>,
    ) -> Result<String, tera::Error> {
        let mut ctx = Self::letter_context(journal, to);
        ctx.insert("decision", decision);
        ctx.insert("decision_color", decision_color(decision));
        ctx.insert("scores", &score_rows(scores));
        ctx.insert("summary", &summary.filter(|s| !s.is_empty()));
        self.tera.render(REVIEW_COMPLETE, &ctx)
    }

    pub fn revision_requested(
        &self,
        journal: &EmailSettings,
        to: &Recipient,
        revision_type: &str,
        feedback: Option<&Feedback>,
    ) -> Result<String, tera::Error> {
        let mut ctx = Self::letter_context(journal, to);
        ctx.insert("revision_type", revision_type);

        let none: Vec<FeedbackItem> = Vec::new();
        let (items, text) = match feedback {
            Some(Feedback::Items(items)) => (items.as_slice(), None),
            Some(Feedback::Text(text)) => (none.as_slice(), Some(text.as_str())),
            None => (none.as_slice(), None),
        };
        ctx.insert("feedback_items", items);
        ctx.insert("feedback_text", &text);
        self.tera.render(REVISION_REQUESTED, &ctx)
    }

    /// Markdown body of the issue that starts a review
    pub fn review_issue(&self, journal_name: &str, issue: &ReviewIssue) -> Result<String, tera::Error> {
        let metadata = issue.metadata;
        let authors: Vec<&str> = metadata.authors.iter().map(|a| a.name.as_str()).collect();

        let mut ctx = Context::new();
        ctx.insert("journal_name", journal_name);
        ctx.insert("submission_id", issue.submission_id);
        ctx.insert("title", &metadata.title);
        ctx.insert("paper_type", &metadata.paper_type);
        ctx.insert("authors", &authors);
        ctx.insert("abstract_text", &metadata.abstract_text);
        ctx.insert("keywords", &metadata.keywords);
        ctx.insert("code_url", &metadata.code_url.as_deref().filter(|u| !u.is_empty()));
        ctx.insert("data_url", &metadata.data_url.as_deref().filter(|u| !u.is_empty()));
        ctx.insert("storage_key", issue.storage_key);
        ctx.insert("pdf_url", issue.pdf_url);
        self.tera.render(REVIEW_ISSUE, &ctx)
    }
}
