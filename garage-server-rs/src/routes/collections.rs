use crate::error::AppError;
use crate::routes::auth;
use crate::state::AppState;
use crate::store::{Record, StoreError};
use axum::extract::{Path, State};
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_collections))
        .route("/{name}", get(get_collection))
        .route_layer(middleware::from_fn_with_state(state, auth::require_token))
}

#[derive(Serialize)]
struct CollectionSummary {
    name: String,
    count: u64,
}

/// GET /api/collections
async fn list_collections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CollectionSummary>>, AppError> {
    let store = state.store.clone();
    let summaries = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
        let live = store.collections()?;
        live.iter()
            .map(|c| {
                Ok(CollectionSummary {
                    name: c.name().to_string(),
                    count: c.count()?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))??;
    Ok(Json(summaries))
}

/// GET /api/collections/{name}
async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Record>>, AppError> {
    let store = state.store.clone();
    let records = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
        let live = store.collections()?;
        let collection = live
            .resolve(&name)
            .ok_or_else(|| StoreError::UnknownCollection(name.clone()))?;
        collection.find_all()
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))??;
    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use crate::routes::create_router;
    use crate::routes::testing::{body_json, garage_store, state_with};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_lists_collections_with_counts() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state_with(garage_store(), dir.path(), |_| {}));

        let response = app.oneshot(get("/api/collections")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([
                {"name": "customers", "count": 2},
                {"name": "services", "count": 3},
            ])
        );
    }

    #[tokio::test]
    async fn test_get_collection_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let app = create_router(state_with(garage_store(), dir.path(), |_| {}));

        let response = app.clone().oneshot(get("/api/collections/Services")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["_id"], "s1");

        let response = app.oneshot(get("/api/collections/orders")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
