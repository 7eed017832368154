//! Paper usage metrics
//!
//! Every counter update is a read-modify-write through
//! [`update_json`](crate::store::update_json), so concurrent views of the
//! same paper are all counted.

use crate::error::AppError;
use crate::handlers::middleware::client_ip;
use crate::handlers::AppState;
use crate::models::{
    AuthorStats, DailyAggregate, JournalStats, MetricsSnapshot, PaperRecord, SuccessResponse,
    TrendingPaper,
};
use crate::store::{get_json, update_json, KvStore, StoreResult};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub const VIEW_HISTORY_CAP: usize = 1000;
pub const DOWNLOAD_HISTORY_CAP: usize = 500;
pub const UNIQUE_VIEWERS_CAP: usize = 10_000;
pub const TRENDING_LIMIT: usize = 10;

const STATS_KEY: &str = "journal:stats";
const STATS_TTL_MS: i64 = 3_600_000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics/:paper_id", get(get_metrics))
        .route("/view/:paper_id", post(record_view))
        .route("/download/:paper_id", post(record_download))
        .route("/stats", get(journal_stats))
        .route("/trending", get(trending))
        .route("/author/:name", get(author_stats))
}

fn paper_key(paper_id: &str) -> String {
    format!("paper:{}", paper_id)
}

fn daily_key(day: DateTime<Utc>) -> String {
    format!("daily:{}", day.format("%Y-%m-%d"))
}

/// First 8 bytes of SHA-256, hex encoded
pub fn hash_ip(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    hex::encode(&digest[..8])
}

/// Append and drop the oldest entries beyond `cap`
fn push_capped<T>(list: &mut Vec<T>, item: T, cap: usize) {
    list.push(item);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

fn apply_view(record: &mut PaperRecord, now: i64, viewer: &str) {
    record.views += 1;
    push_capped(&mut record.view_history, now, VIEW_HISTORY_CAP);
    if !record.unique_viewers.iter().any(|v| v == viewer) {
        push_capped(
            &mut record.unique_viewers,
            viewer.to_string(),
            UNIQUE_VIEWERS_CAP,
        );
    }
}

fn apply_download(record: &mut PaperRecord, now: i64) {
    record.downloads += 1;
    push_capped(&mut record.download_history, now, DOWNLOAD_HISTORY_CAP);
}

fn snapshot(paper_id: &str, record: &PaperRecord, now: i64) -> MetricsSnapshot {
    let views_since = |window: i64| {
        record
            .view_history
            .iter()
            .filter(|&&t| t > now - window)
            .count() as u64
    };

    MetricsSnapshot {
        paper_id: paper_id.to_string(),
        views: record.views,
        downloads: record.downloads,
        citations: record.citations,
        shares: record.shares,
        unique_viewers: record.unique_viewers.len() as u64,
        views_today: views_since(DAY_MS),
        views_this_week: views_since(7 * DAY_MS),
        views_this_month: views_since(30 * DAY_MS),
    }
}

/// Placeholder aggregate; no cross-paper aggregation is performed yet
fn calculate_journal_stats() -> JournalStats {
    JournalStats {
        total_papers: 0,
        total_views: 0,
        total_downloads: 0,
        total_citations: 0,
        total_authors: 0,
        avg_review_time: "24 hours".to_string(),
        acceptance_rate: "35%".to_string(),
        updated_at: 0,
    }
}

pub async fn paper_metrics(
    kv: &dyn KvStore,
    paper_id: &str,
    now: i64,
) -> StoreResult<MetricsSnapshot> {
    let record: PaperRecord = get_json(kv, &paper_key(paper_id))
        .await?
        .unwrap_or_default();
    Ok(snapshot(paper_id, &record, now))
}

/// Count a view of `paper_id` by `viewer` (an IP hash) at `now`.
///
/// The paper record is authoritative. Once it is stored the view counts,
/// and a failed daily-aggregate write only costs trending accuracy.
pub async fn count_view(
    kv: &dyn KvStore,
    paper_id: &str,
    viewer: &str,
    now: DateTime<Utc>,
) -> StoreResult<PaperRecord> {
    let millis = now.timestamp_millis();
    let record = update_json(kv, &paper_key(paper_id), |record: &mut PaperRecord| {
        apply_view(record, millis, viewer)
    })
    .await?;

    let daily = update_json(kv, &daily_key(now), |daily: &mut DailyAggregate| {
        daily.record_view(paper_id)
    })
    .await;
    if let Err(e) = daily {
        tracing::error!("View of {} counted but daily aggregate not updated: {}", paper_id, e);
    }

    Ok(record)
}

pub async fn count_download(kv: &dyn KvStore, paper_id: &str, now: i64) -> StoreResult<PaperRecord> {
    update_json(kv, &paper_key(paper_id), |record: &mut PaperRecord| {
        apply_download(record, now)
    })
    .await
}

/// Cached stats, refreshed once older than an hour
pub async fn cached_journal_stats(kv: &dyn KvStore, now: i64) -> StoreResult<JournalStats> {
    if let Some(stats) = get_json::<JournalStats>(kv, STATS_KEY).await? {
        if now - stats.updated_at <= STATS_TTL_MS {
            return Ok(stats);
        }
    }

    let mut stats = calculate_journal_stats();
    stats.updated_at = now;
    kv.put(STATS_KEY, serde_json::to_value(&stats)?).await?;
    tracing::debug!("Recomputed journal stats");

    Ok(stats)
}

pub async fn trending_papers(kv: &dyn KvStore, now: DateTime<Utc>) -> StoreResult<Vec<TrendingPaper>> {
    let Some(daily) = get_json::<DailyAggregate>(kv, &daily_key(now)).await? else {
        return Ok(Vec::new());
    };

    let mut ranked = daily.ranking();
    ranked.truncate(TRENDING_LIMIT);
    Ok(ranked)
}

pub async fn lookup_author(kv: &dyn KvStore, name: &str) -> StoreResult<AuthorStats> {
    let key = format!("author:{}", name.to_lowercase());
    Ok(get_json(kv, &key)
        .await?
        .unwrap_or_else(|| AuthorStats::empty(name)))
}

async fn get_metrics(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<MetricsSnapshot>, AppError> {
    let now = state.clock.now_millis();
    Ok(Json(paper_metrics(state.kv.as_ref(), &paper_id, now).await?))
}

async fn record_view(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let viewer = hash_ip(&client_ip(&headers));
    count_view(state.kv.as_ref(), &paper_id, &viewer, state.clock.now()).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn record_download(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    count_download(state.kv.as_ref(), &paper_id, state.clock.now_millis()).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn journal_stats(State(state): State<AppState>) -> Result<Json<JournalStats>, AppError> {
    let now = state.clock.now_millis();
    Ok(Json(cached_journal_stats(state.kv.as_ref(), now).await?))
}

async fn trending(State(state): State<AppState>) -> Result<Json<Vec<TrendingPaper>>, AppError> {
    Ok(Json(trending_papers(state.kv.as_ref(), state.clock.now()).await?))
}

async fn author_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AuthorStats>, AppError> {
    Ok(Json(lookup_author(state.kv.as_ref(), &name).await?))
}
