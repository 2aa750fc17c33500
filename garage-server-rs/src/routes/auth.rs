//! Bearer token check for the data routes.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Passes every request through when no `API_TOKEN` is configured.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if token == expected => {}
        Some(_) => return Err(AppError::Unauthorized("Invalid or expired token.".into())),
        None => {
            return Err(AppError::Unauthorized(
                "Access denied. No token provided.".into(),
            ))
        }
    }

    Ok(next.run(request).await)
}
