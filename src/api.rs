use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing::{error, warn};

use crate::agent::{FeedbackAgent, SessionKey};
use crate::config::ScrapeConfig;
use crate::scrape::{self, CommentFetcher, ScrapeOutcome};
use crate::store::{Video, VideoCategorySummary};
use crate::summarize::{CategorizedComments, CategoryMap, CommentSummarizer};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub fetcher: Arc<dyn CommentFetcher>,
    pub summarizer: Arc<CommentSummarizer>,
    pub agent: Arc<FeedbackAgent>,
    pub scrape: ScrapeConfig,
}

pub fn create_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/videos", post(create_video).get(list_videos))
        .route("/videos/by-url", get(get_video_by_url))
        .route("/videos/{id}", get(get_video))
        .route("/summarize", post(summarize))
        .route("/chat", post(chat))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

/// Restrict CORS to the configured frontend origin; fall back to a
/// mirror-everything layer when the origin is `*` or unparsable.
fn cors_layer(origin: &str) -> CorsLayer {
    match origin.parse::<HeaderValue>() {
        Ok(value) if origin != "*" => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        _ => CorsLayer::very_permissive(),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "Error": message.into() }))).into_response()
}

fn internal_error(e: anyhow::Error) -> Response {
    error!(target: "api", error = %e, "internal error");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

// ---- /videos ----

#[derive(serde::Deserialize)]
struct VideoCreate {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
}

async fn create_video(
    State(state): State<AppState>,
    Json(body): Json<VideoCreate>,
) -> Response {
    match Video::create(&body.url, &body.title, &body.summary, &state.db).await {
        Ok(video) => Json(video).into_response(),
        Err(e) => {
            warn!(target: "api", url = %body.url, error = %e, "video create rejected");
            error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("could not create video: {e}"),
            )
        }
    }
}

#[derive(serde::Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    10
}

async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    match Video::list(params.skip.max(0), params.limit.clamp(1, 100), &state.db).await {
        Ok(videos) => Json(json!({ "videos": videos })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_video(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match Video::find_by_id(id, &state.db).await {
        Ok(Some(video)) => Json(video).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => internal_error(e),
    }
}

#[derive(serde::Deserialize)]
struct ByUrlParams {
    video_url: String,
}

#[derive(serde::Serialize)]
struct VideoOut {
    id: i64,
    url: String,
    title: String,
    summary: String,
}

async fn get_video_by_url(
    State(state): State<AppState>,
    Query(params): Query<ByUrlParams>,
) -> Response {
    match Video::find_by_url(&params.video_url, &state.db).await {
        Ok(Some(video)) => Json(VideoOut {
            id: video.id,
            url: video.url,
            title: video.title,
            summary: video.summary,
        })
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => internal_error(e),
    }
}

// ---- /summarize ----

#[derive(serde::Deserialize)]
struct SummarizeReq {
    #[serde(rename = "URLS")]
    urls: Vec<String>,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum SummarizeEntry {
    Summary {
        video_summary: String,
        title: String,
        categories: CategoryMap,
    },
    Failure {
        #[serde(rename = "Error")]
        error: String,
    },
}

impl SummarizeEntry {
    fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            error: message.into(),
        }
    }
}

#[derive(serde::Serialize)]
struct SummarizeResp {
    results: BTreeMap<String, SummarizeEntry>,
}

/// For each URL, return the stored summary when the video is known;
/// otherwise scrape its comments (uncached URLs go through the orchestrator
/// as one batch), summarize, persist, and return. Per-item failures are
/// embedded entries, never batch failures.
async fn summarize(State(state): State<AppState>, Json(req): Json<SummarizeReq>) -> Response {
    if req.urls.is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "URLS cannot be empty");
    }

    let mut unique: Vec<String> = Vec::with_capacity(req.urls.len());
    for url in &req.urls {
        if !unique.contains(url) {
            unique.push(url.clone());
        }
    }

    let mut results: BTreeMap<String, SummarizeEntry> = BTreeMap::new();
    let mut to_scrape: Vec<String> = Vec::new();

    for url in &unique {
        match Video::find_by_url(url, &state.db).await {
            Ok(Some(video)) => {
                let entry = stored_entry(&video, &state.db)
                    .await
                    .unwrap_or_else(|e| SummarizeEntry::failure(format!("lookup failed: {e}")));
                results.insert(url.clone(), entry);
            }
            Ok(None) => to_scrape.push(url.clone()),
            Err(e) => {
                warn!(target: "api", url = %url, error = %e, "video lookup failed");
                results.insert(
                    url.clone(),
                    SummarizeEntry::failure(format!("lookup failed: {e}")),
                );
            }
        }
    }

    if !to_scrape.is_empty() {
        match scrape::scrape_batch(Arc::clone(&state.fetcher), &to_scrape, &state.scrape).await {
            Ok(outcomes) => {
                for url in &to_scrape {
                    let entry = match outcomes.get(url) {
                        Some(outcome) => summarize_and_store(&state, url, outcome).await,
                        None => SummarizeEntry::failure("scrape result missing"),
                    };
                    results.insert(url.clone(), entry);
                }
            }
            Err(e) => {
                // Only reachable for an empty batch, which was rejected above.
                return internal_error(e);
            }
        }
    }

    Json(SummarizeResp { results }).into_response()
}

async fn summarize_and_store(
    state: &AppState,
    url: &str,
    outcome: &ScrapeOutcome,
) -> SummarizeEntry {
    if let Some(err) = &outcome.error {
        return SummarizeEntry::failure(err.clone());
    }

    // The source API carries the video title on every comment.
    let title = outcome
        .comments
        .first()
        .map(|c| c.title.clone())
        .unwrap_or_default();

    let categorized = match state.summarizer.summarize(&outcome.comments).await {
        Ok(c) => c,
        Err(e) => {
            warn!(target: "api", url, error = %e, "summarization failed");
            return SummarizeEntry::failure(format!("summarization failed: {e}"));
        }
    };

    // The summary is still served when persistence fails; it just won't be
    // cached for the next request.
    if let Err(e) = persist_summary(&state.db, url, &title, &categorized).await {
        warn!(target: "api", url, error = %e, "failed to persist summary");
    }

    SummarizeEntry::Summary {
        video_summary: String::new(),
        title,
        categories: categorized.categories,
    }
}

async fn persist_summary(
    db: &SqlitePool,
    url: &str,
    title: &str,
    categorized: &CategorizedComments,
) -> anyhow::Result<()> {
    let video = Video::create(url, title, "", db).await?;
    for (name, category) in &categorized.categories {
        VideoCategorySummary::create(video.id, name, category, db).await?;
    }
    Ok(())
}

async fn stored_entry(video: &Video, db: &SqlitePool) -> anyhow::Result<SummarizeEntry> {
    let rows = VideoCategorySummary::list_for_video(video.id, db).await?;
    let categories: CategoryMap = rows
        .iter()
        .map(|r| (r.category.clone(), r.to_category_summary()))
        .collect();
    Ok(SummarizeEntry::Summary {
        video_summary: video.summary.clone(),
        title: video.title.clone(),
        categories,
    })
}

// ---- /chat ----

#[derive(serde::Deserialize)]
struct ChatReq {
    url: String,
    user_input: String,
    #[serde(default = "default_true")]
    return_history: bool,
    #[serde(default)]
    session_id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(serde::Serialize)]
struct ChatResp {
    feedback: String,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatReq>) -> Response {
    let video = match Video::find_by_url(&req.url, &state.db).await {
        Ok(Some(v)) => v,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Video Not Found"),
        Err(e) => return internal_error(e),
    };

    let categories = match VideoCategorySummary::list_for_video(video.id, &state.db).await {
        Ok(c) => c,
        Err(e) => return internal_error(e),
    };

    let key = SessionKey::new(
        &req.url,
        chrono::Local::now().date_naive(),
        req.session_id.as_deref(),
    );

    match state
        .agent
        .generate_feedback(
            &video,
            &categories,
            &req.user_input,
            &key,
            req.return_history,
        )
        .await
    {
        Ok(feedback) => Json(ChatResp { feedback }).into_response(),
        Err(e) => {
            warn!(target: "api", url = %req.url, error = %e, "feedback generation failed");
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("feedback generation failed: {e}"),
            )
        }
    }
}
