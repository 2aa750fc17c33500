//! HTTP client for the garage backup API.

use crate::config::ServerConfig;
use crate::utils::errors::{CliError, Result};
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// A stored archive as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub name: String,
    pub created: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredCollection {
    pub collection: String,
    pub entry: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub message: String,
    #[serde(default)]
    pub restored: Vec<RestoredCollection>,
    #[serde(default)]
    pub skipped: Vec<String>,
    #[serde(default)]
    pub empty: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCount {
    pub name: String,
    pub count: u64,
}

pub struct BackupClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackupClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let resp = check(self.request(Method::GET, "/api/health").send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Asks the server for a fresh backup and saves it under `output_dir`.
    /// Returns the path of the saved archive.
    pub async fn create_backup(&self, output_dir: &Path) -> Result<PathBuf> {
        let resp = check(self.request(Method::GET, "/api/backup/create").send().await?).await?;

        let file_name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .ok_or_else(|| {
                CliError::UnexpectedResponse("missing attachment file name".into())
            })?;

        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(&file_name);
        let partial = output_dir.join(format!("{file_name}.partial"));

        if let Err(e) = download_to(resp, &partial).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!("Failed to remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }
        tokio::fs::rename(&partial, &path).await?;

        info!("Backup saved to {}", path.display());
        Ok(path)
    }

    pub async fn list_backups(&self) -> Result<Vec<ArchiveSummary>> {
        let resp = check(self.request(Method::GET, "/api/backup/list").send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Uploads a local archive for restore.
    pub async fn restore_file(&self, archive: &Path) -> Result<RestoreSummary> {
        let bytes = tokio::fs::read(archive).await?;
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "backup.zip".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("backup", part);

        let resp = self
            .request(Method::POST, "/api/backup/restore")
            .multipart(form)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Restores an archive already stored in the server's backup directory.
    pub async fn restore_stored(&self, name: &str) -> Result<RestoreSummary> {
        let resp = self
            .request(Method::POST, "/api/backup/restore")
            .json(&serde_json::json!({ "folderName": name }))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn collections(&self) -> Result<Vec<CollectionCount>> {
        let resp = check(self.request(Method::GET, "/api/collections").send().await?).await?;
        Ok(resp.json().await?)
    }
}

async fn download_to(resp: Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.sync_all().await?;
    debug!(bytes = written, "Archive downloaded");
    Ok(written)
}

/// Turns a non-2xx response into `CliError::Server` with the server's message.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CliError::Server {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("request failed").to_string()
        }),
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Extracts the file name from `attachment; filename="..."`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name = raw.trim_matches('"');
    // Never let the server pick a path outside the output directory.
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if name.is_empty() || name == ".." {
        return None;
    }
    Some(name.to_string())
}
