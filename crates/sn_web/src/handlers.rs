use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sn_core::{ContentUpdateReport, NewNewsItem, NewsItem, SyncReport};
use sn_scrappers::SyncStatus;
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body of the admin create/update endpoints. `source` defaults to the
/// configured publisher.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPayload {
    pub title: String,
    pub content: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub external_link: Option<String>,
}

impl NewsPayload {
    fn into_item(self, default_source: &str) -> ApiResult<NewNewsItem> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::BadRequest("title must not be empty".to_string()));
        }
        Ok(NewNewsItem {
            title,
            content: self.content,
            source: self.source.unwrap_or_else(|| default_source.to_string()),
            date: self.date,
            important: self.important,
            external_link: self.external_link.filter(|link| !link.trim().is_empty()),
        })
    }
}

fn require_admin(headers: &HeaderMap, state: &AppState) -> ApiResult<()> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::Forbidden);
    };
    let Some(auth) = headers.get(header::AUTHORIZATION) else {
        return Err(ApiError::Unauthorized);
    };
    let Ok(auth) = auth.to_str() else {
        return Err(ApiError::Unauthorized);
    };
    match auth.strip_prefix("Bearer ") {
        Some(token) if token.trim() == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub async fn list_news(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<NewsItem>>> {
    Ok(Json(state.storage.list_news().await?))
}

pub async fn get_news(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<NewsItem>> {
    state
        .storage
        .get_news(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("News item {} not found", id)))
}

pub async fn create_news(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewsPayload>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state)?;
    let item = payload.into_item(&state.sync.profile().name)?;
    let stored = state.storage.insert_news(&item).await?;
    info!(id = stored.id, title = %stored.title, "📝 News item created");
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_news(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<NewsPayload>,
) -> ApiResult<Json<NewsItem>> {
    require_admin(&headers, &state)?;
    let item = payload.into_item(&state.sync.profile().name)?;
    state
        .storage
        .update_news(id, &item)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("News item {} not found", id)))
}

pub async fn delete_news(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&headers, &state)?;
    if state.storage.delete_news(id).await? {
        info!(id, "🗑️ News item deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("News item {} not found", id)))
    }
}

/// Fire-and-forget sync.
pub async fn trigger_sync(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let trigger = state.sync.spawn_sync();
    (StatusCode::ACCEPTED, Json(json!({ "status": trigger.as_str() })))
}

pub async fn sync_and_wait(State(state): State<Arc<AppState>>) -> ApiResult<Json<SyncReport>> {
    Ok(Json(state.sync.sync_now().await?))
}

pub async fn update_content(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ContentUpdateReport>> {
    Ok(Json(state.sync.update_content().await?))
}

pub async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    Json(state.sync.status())
}
