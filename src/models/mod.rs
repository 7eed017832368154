//! Request, response and stored document models

use crate::github::GitHubUser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Notifications
// =============================================================================

/// Fields shared by every notification payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionNotice {
    pub submission_id: Option<String>,
    pub title: Option<String>,
    pub author_email: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionReceivedRequest {
    #[serde(flatten)]
    pub notice: SubmissionNotice,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCompleteRequest {
    #[serde(flatten)]
    pub notice: SubmissionNotice,
    pub decision: Option<String>,
    /// Criterion name to score out of 5, kept in request order
    #[serde(default)]
    pub scores: Map<String, Value>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRequestedRequest {
    #[serde(flatten)]
    pub notice: SubmissionNotice,
    pub revision_type: Option<String>,
    pub feedback: Option<Feedback>,
}

/// Requested changes, either itemised or as free text
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Feedback {
    Items(Vec<FeedbackItem>),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackItem {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub comment: String,
}

// =============================================================================
// Metrics
// =============================================================================

/// Stored under `paper:{paperId}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PaperRecord {
    pub views: u64,
    pub downloads: u64,
    pub citations: u64,
    pub shares: u64,
    pub view_history: Vec<i64>,
    pub download_history: Vec<i64>,
    pub unique_viewers: Vec<String>,
}

/// Stored under `daily:{YYYY-MM-DD}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DailyAggregate {
    pub views: u64,
    /// Paper id to views that day
    pub papers: Map<String, Value>,
}

impl DailyAggregate {
    pub fn record_view(&mut self, paper_id: &str) {
        self.views += 1;
        let current = self.papers.get(paper_id).and_then(Value::as_u64).unwrap_or(0);
        self.papers.insert(paper_id.to_string(), Value::from(current + 1));
    }

    /// Papers by views descending, ties broken by paper id.
    ///
    /// Postgres JSONB does not keep key order, so stored order cannot be the
    /// tie-break.
    pub fn ranking(&self) -> Vec<TrendingPaper> {
        let mut ranked: Vec<TrendingPaper> = self
            .papers
            .iter()
            .map(|(paper_id, views)| TrendingPaper {
                paper_id: paper_id.clone(),
                views_today: views.as_u64().unwrap_or(0),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.views_today
                .cmp(&a.views_today)
                .then_with(|| a.paper_id.cmp(&b.paper_id))
        });
        ranked
    }
}

/// Cached journal-wide aggregate stored under `journal:stats`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub total_papers: u64,
    pub total_views: u64,
    pub total_downloads: u64,
    pub total_citations: u64,
    pub total_authors: u64,
    pub avg_review_time: String,
    pub acceptance_rate: String,
    #[serde(default)]
    pub updated_at: i64,
}

/// Stored under `author:{lowercased name}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorStats {
    pub name: String,
    pub papers: u64,
    pub total_views: u64,
    pub total_downloads: u64,
    pub total_citations: u64,
    pub h_index: u64,
}

impl AuthorStats {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub paper_id: String,
    pub views: u64,
    pub downloads: u64,
    pub citations: u64,
    pub shares: u64,
    pub unique_viewers: u64,
    pub views_today: u64,
    pub views_this_week: u64,
    pub views_this_month: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendingPaper {
    pub paper_id: String,
    pub views_today: u64,
}

// =============================================================================
// OAuth
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthRequest {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthResponse {
    pub access_token: String,
    pub user: GitHubUser,
}

// =============================================================================
// Uploads
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresignRequest {
    pub submission_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub file_size: u64,
    pub github_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub upload_url: String,
    pub key: String,
    pub upload_token: String,
    pub expiry: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub key: String,
    pub download_url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerReviewRequest {
    pub submission_id: String,
    pub metadata: SubmissionMetadata,
    pub pdf_url: String,
    pub github_token: String,
}

/// Paper metadata as sent by the submission portal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionMetadata {
    pub title: String,
    pub paper_type: String,
    pub authors: Vec<AuthorRef>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub code_url: Option<String>,
    pub data_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReviewResponse {
    pub success: bool,
    pub issue_number: u64,
    pub issue_url: String,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
