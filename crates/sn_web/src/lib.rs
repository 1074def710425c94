use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/news", get(handlers::list_news).post(handlers::create_news))
        .route(
            "/news/:id",
            get(handlers::get_news)
                .put(handlers::update_news)
                .delete(handlers::delete_news),
        )
        .route("/news/sync", post(handlers::trigger_sync))
        .route("/news/sync/status", get(handlers::sync_status))
        .route("/news/sync-wait", post(handlers::sync_and_wait))
        .route("/news/update-content", post(handlers::update_content))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::{create_app, ApiError, AppState};
    pub use sn_core::{NewsItem, Result, Error};
}
