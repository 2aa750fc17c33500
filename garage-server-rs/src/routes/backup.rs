use crate::backup::{self, ArchiveInfo, BackupError, RestoreReport};
use crate::error::AppError;
use crate::routes::auth;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State};
use axum::http::header;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Multipart field carrying the uploaded archive.
const UPLOAD_FIELD: &str = "backup";

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/create", get(create_backup))
        .route(
            "/restore",
            post(restore_backup).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/list", get(list_backups))
        .route("/download/{name}", get(download_backup))
        .route_layer(middleware::from_fn_with_state(state, auth::require_token))
}

fn archive_response(name: &str, body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn stream_file(name: &str, path: &std::path::Path) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::Backup(BackupError::Io(e)))?;
    Ok(archive_response(name, Body::from_stream(ReaderStream::new(file))))
}

/// GET /api/backup/create
async fn create_backup(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let job = state.job_lock.lock().await;
    let store = state.store.clone();

    if state.config.persist_backups {
        let dir = state.config.backups_dir.clone();
        let keep = state.config.max_backups;
        let stored = tokio::task::spawn_blocking(move || {
            backup::create_stored_backup(store.as_ref(), &dir, keep)
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))??;
        drop(job);

        if !stored.removed.is_empty() {
            tracing::info!(removed = stored.removed.len(), "Old backups pruned");
        }
        return stream_file(&stored.name, &stored.path).await;
    }

    let (name, bytes) =
        tokio::task::spawn_blocking(move || backup::create_backup_archive(store.as_ref()))
            .await
            .map_err(|e| anyhow::anyhow!(e))??;
    drop(job);

    Ok(archive_response(&name, Body::from(bytes)))
}

#[derive(Deserialize)]
struct RestoreRequest {
    #[serde(rename = "folderName")]
    folder_name: Option<String>,
}

#[derive(Serialize)]
struct RestoreResponse {
    message: String,
    #[serde(flatten)]
    report: RestoreReport,
}

enum RestoreSource {
    Upload(PathBuf),
    Stored(PathBuf),
}

impl RestoreSource {
    fn path(&self) -> PathBuf {
        match self {
            RestoreSource::Upload(p) | RestoreSource::Stored(p) => p.clone(),
        }
    }
}

async fn write_field(field: &mut Field<'_>, path: &std::path::Path) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create upload file: {}", e))?;
    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| anyhow::anyhow!("Write error: {}", e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| anyhow::anyhow!("Flush error: {}", e))?;
    Ok(written)
}

/// Saves the `backup` field of the form into the upload directory.
async fn receive_upload(mut multipart: Multipart, upload_dir: PathBuf) -> Result<PathBuf, AppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        tokio::fs::create_dir_all(&upload_dir)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create upload directory: {}", e))?;
        let path = upload_dir.join(format!("restore-{}.zip", Uuid::new_v4()));

        let outcome = match write_field(&mut field, &path).await {
            Ok(0) => Err(AppError::BadRequest("Uploaded backup file is empty".into())),
            Ok(size) => {
                tracing::debug!(path = %path.display(), size, "Backup upload received");
                Ok(())
            }
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            remove_upload(&path).await;
            return Err(e);
        }
        return Ok(path);
    }

    Err(AppError::BadRequest("No backup file uploaded".into()))
}

async fn remove_upload(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to remove uploaded archive {}: {}", path.display(), e);
    }
}

/// POST /api/backup/restore
///
/// Accepts either a multipart upload (field `backup`) or a JSON body
/// `{ "folderName": ... }` naming an archive in the backup directory.
async fn restore_backup(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<RestoreResponse>, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let source = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        RestoreSource::Upload(receive_upload(multipart, state.config.upload_dir.clone()).await?)
    } else {
        let Json(body) = Json::<RestoreRequest>::from_request(request, &state)
            .await
            .map_err(|_| AppError::BadRequest("Backup file or folder name required".into()))?;
        let name = body
            .folder_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Backup file or folder name required".into()))?;
        let path = backup::resolve_stored(&state.config.backups_dir, &name).map_err(|e| match e {
            BackupError::NotFound(name) => AppError::BadRequest(format!("Backup not found: {name}")),
            other => other.into(),
        })?;
        RestoreSource::Stored(path)
    };

    let job = state.job_lock.lock().await;
    let store = state.store.clone();
    let strategy = state.config.restore_strategy;
    let path = source.path();
    tracing::info!(archive = %path.display(), ?strategy, "Starting restore");

    let result = tokio::task::spawn_blocking(move || {
        backup::restore_archive(store.as_ref(), &path, strategy)
    })
    .await
    .map_err(|e| anyhow::anyhow!(e));
    drop(job);

    if let RestoreSource::Upload(upload) = &source {
        remove_upload(upload).await;
    }

    let report = result??;
    if !report.skipped.is_empty() {
        tracing::warn!(skipped = ?report.skipped, "Restore skipped unmatched entries");
    }
    Ok(Json(RestoreResponse {
        message: "Restore successful".into(),
        report,
    }))
}

/// GET /api/backup/list
async fn list_backups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArchiveInfo>>, AppError> {
    let dir = state.config.backups_dir.clone();
    let archives = tokio::task::spawn_blocking(move || backup::list_archives(&dir))
        .await
        .map_err(|e| anyhow::anyhow!(e))??;
    Ok(Json(archives))
}

/// GET /api/backup/download/{name}
async fn download_backup(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let path = backup::resolve_stored(&state.config.backups_dir, &name)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or(name);
    stream_file(&file_name, &path).await
}
