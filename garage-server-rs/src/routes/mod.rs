pub mod auth;
pub mod backup;
pub mod collections;
pub mod health;

use crate::state::AppState;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/backup", backup::router(state.clone()))
        .nest("/api/collections", collections::router(state.clone()));

    if let Some(client_dist) = state.config.client_dist.clone().filter(|p| p.is_dir()) {
        let index_html = client_dist.join("index.html");
        router = router.fallback_service(
            ServeDir::new(&client_dist)
                .fallback(ServeFile::new(index_html)),
        );
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
