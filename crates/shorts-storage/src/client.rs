//! Storage client trait and the Google Drive v3 REST implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// An upload to remote storage.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Local file to publish
    pub path: PathBuf,
    /// Target remote folder id
    pub folder_id: String,
    /// Display name of the stored file
    pub display_name: String,
    /// MIME type
    pub mime_type: String,
}

/// A stored file: server-assigned id plus a shareable locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_id: String,
    pub locator: String,
}

/// Seam for the remote store. At-least-once semantics: callers retry on
/// transport errors, the store deduplicates nothing.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Download a file by id into `dest`.
    async fn download_file(&self, file_id: &str, dest: &Path) -> StorageResult<()>;

    /// Upload a local file, returning its id and shareable locator.
    async fn upload_file(&self, request: &UploadRequest) -> StorageResult<StoredFile>;
}

/// Google Drive v3 REST client.
pub struct DriveClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
    upload_base: String,
}

#[derive(Debug, Deserialize)]
struct DriveFileResponse {
    id: String,
}

impl DriveClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }

    /// Create from the `DRIVE_ACCESS_TOKEN` environment variable.
    pub fn from_env() -> StorageResult<Self> {
        let token = std::env::var("DRIVE_ACCESS_TOKEN")
            .map_err(|_| StorageError::config_error("DRIVE_ACCESS_TOKEN not set"))?;
        Ok(Self::new(token))
    }

    fn share_link(file_id: &str) -> String {
        format!("https://drive.google.com/file/d/{}/view", file_id)
    }
}

#[async_trait]
impl StorageClient for DriveClient {
    async fn download_file(&self, file_id: &str, dest: &Path) -> StorageResult<()> {
        let url = format!("{}/files/{}?alt=media", self.api_base, file_id);
        debug!(stage = "fetching", file_id, dest = %dest.display(), "Downloading from Drive");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(file_id));
        }
        if !response.status().is_success() {
            return Err(StorageError::download_failed(format!(
                "Drive returned {}",
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response;
        while let Some(chunk) = stream.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(stage = "fetching", file_id, dest = %dest.display(), "Download complete");
        Ok(())
    }

    async fn upload_file(&self, request: &UploadRequest) -> StorageResult<StoredFile> {
        let metadata = serde_json::json!({
            "name": request.display_name,
            "parents": [request.folder_id],
            "mimeType": request.mime_type,
        });

        let content = tokio::fs::read(&request.path).await?;
        debug!(
            name = %request.display_name,
            bytes = content.len(),
            folder = %request.folder_id,
            "Uploading to Drive"
        );

        let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
            .mime_str("application/json")
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        let media_part = reqwest::multipart::Part::bytes(content)
            .mime_str(&request.mime_type)
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let url = format!("{}/files?uploadType=multipart", self.upload_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::upload_failed(format!(
                "Drive returned {}",
                response.status()
            )));
        }

        let created: DriveFileResponse = response.json().await?;
        info!(stage = "uploading", file_id = %created.id, name = %request.display_name, "Upload complete");

        Ok(StoredFile {
            locator: Self::share_link(&created.id),
            file_id: created.id,
        })
    }
}
