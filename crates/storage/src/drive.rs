//! Google Drive AppData store — per-user documents in the hidden app folder.
//!
//! Each [`DataKind`] is one JSON file in `appDataFolder`. Files are looked up
//! by name, created on first save, and updated with a media upload.
//! Requests are retried under the configured policy, except for credential
//! and permission failures.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use promptscaffold_core::error::{StorageError, StorageErrorKind};
use promptscaffold_core::retry::{RetryPolicy, retry_if};
use promptscaffold_core::storage::{DataKind, RemoteStore};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

pub struct DriveStore {
    access_token: Option<String>,
    api_url: String,
    upload_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
    /// Remote file ids already resolved, by kind.
    file_ids: Mutex<HashMap<DataKind, String>>,
}

impl DriveStore {
    /// `None` or a blank token makes every call fail with `NoCredential`.
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            api_url: DEFAULT_API_URL.into(),
            upload_url: DEFAULT_UPLOAD_URL.into(),
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
            file_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Point both API roots somewhere else (tests, proxies).
    pub fn with_base_urls(mut self, api_url: impl Into<String>, upload_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.upload_url = upload_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn token(&self) -> Result<&str, StorageError> {
        self.access_token.as_deref().ok_or(StorageError::NoCredential)
    }

    fn cached_id(&self, kind: DataKind) -> Option<String> {
        self.file_ids.lock().ok()?.get(&kind).cloned()
    }

    fn remember_id(&self, kind: DataKind, id: &str) {
        if let Ok(mut ids) = self.file_ids.lock() {
            ids.insert(kind, id.to_string());
        }
    }

    fn forget_id(&self, kind: DataKind) {
        if let Ok(mut ids) = self.file_ids.lock() {
            ids.remove(&kind);
        }
    }

    /// Drop the cached id when the file behind it is gone, so the next
    /// attempt looks it up again.
    fn invalidate_on_not_found<T>(
        &self,
        kind: DataKind,
        result: Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        if let Err(e) = &result {
            if e.kind() == StorageErrorKind::NotFound {
                debug!(file = kind.file_name(), "Cached remote file id is stale");
                self.forget_id(kind);
            }
        }
        result
    }

    /// Find the remote file for `kind`, if it exists.
    async fn find_file(&self, kind: DataKind) -> Result<Option<String>, StorageError> {
        if let Some(id) = self.cached_id(kind) {
            return Ok(Some(id));
        }

        let token = self.token()?;
        let query = format!("name = '{}'", kind.file_name());
        let response = self
            .client
            .get(format!("{}/files", self.api_url))
            .bearer_auth(token)
            .query(&[
                ("spaces", "appDataFolder"),
                ("q", query.as_str()),
                ("fields", "files(id, name)"),
            ])
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response, kind)?;

        let list: FileList = response
            .json()
            .await
            .map_err(|e| StorageError::Other(format!("Malformed file list: {e}")))?;

        let id = list.files.into_iter().next().map(|f| f.id);
        if let Some(id) = &id {
            self.remember_id(kind, id);
        }
        Ok(id)
    }

    async fn download(&self, kind: DataKind, id: &str) -> Result<serde_json::Value, StorageError> {
        let response = self
            .client
            .get(format!("{}/files/{id}", self.api_url))
            .bearer_auth(self.token()?)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response, kind)?;

        let body = response.text().await.map_err(network_error)?;
        if body.trim().is_empty() {
            return Ok(kind.empty_document());
        }
        match serde_json::from_str(&body) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(file = kind.file_name(), error = %e, "Discarding malformed remote document");
                Ok(kind.empty_document())
            }
        }
    }

    async fn create_file(&self, kind: DataKind) -> Result<String, StorageError> {
        let metadata = serde_json::json!({
            "name": kind.file_name(),
            "parents": ["appDataFolder"],
            "mimeType": "application/json",
        });
        let response = self
            .client
            .post(format!("{}/files", self.api_url))
            .bearer_auth(self.token()?)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response, kind)?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| StorageError::Other(format!("Malformed create response: {e}")))?;
        info!(file = kind.file_name(), "Created remote file");
        self.remember_id(kind, &file.id);
        Ok(file.id)
    }

    async fn upload(&self, kind: DataKind, id: &str, body: String) -> Result<(), StorageError> {
        let response = self
            .client
            .patch(format!("{}/files/{id}", self.upload_url))
            .bearer_auth(self.token()?)
            .query(&[("uploadType", "media")])
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response, kind)?;
        Ok(())
    }

    async fn load_once(&self, kind: DataKind) -> Result<serde_json::Value, StorageError> {
        match self.find_file(kind).await? {
            Some(id) => {
                let result = self.download(kind, &id).await;
                self.invalidate_on_not_found(kind, result)
            }
            None => {
                debug!(file = kind.file_name(), "Remote file missing, using empty data");
                Ok(kind.empty_document())
            }
        }
    }

    async fn save_once(&self, kind: DataKind, document: &serde_json::Value) -> Result<(), StorageError> {
        let body = serde_json::to_string(document)
            .map_err(|e| StorageError::Other(format!("Serialization failed: {e}")))?;
        let id = match self.find_file(kind).await? {
            Some(id) => id,
            None => self.create_file(kind).await?,
        };
        let result = self.upload(kind, &id, body).await;
        self.invalidate_on_not_found(kind, result)
    }
}

fn network_error(e: reqwest::Error) -> StorageError {
    StorageError::Other(format!("Network error: {e}"))
}

/// Map an HTTP status to a storage error kind.
pub fn status_to_error(status: u16, context: &str) -> Option<StorageError> {
    match status {
        200..=299 => None,
        401 => Some(StorageError::Unauthorized(format!("{context}: access token rejected"))),
        403 => Some(StorageError::Forbidden(format!("{context}: insufficient scope"))),
        404 => Some(StorageError::NotFound(context.to_string())),
        _ => Some(StorageError::Other(format!("{context}: HTTP {status}"))),
    }
}

fn check_status(
    response: reqwest::Response,
    kind: DataKind,
) -> Result<reqwest::Response, StorageError> {
    match status_to_error(response.status().as_u16(), kind.file_name()) {
        None => Ok(response),
        Some(e) => Err(e),
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    fn name(&self) -> &str {
        "drive"
    }

    async fn load(&self, kind: DataKind) -> Result<serde_json::Value, StorageError> {
        self.token()?;
        retry_if(&self.retry, move || self.load_once(kind), StorageError::is_retryable).await
    }

    async fn save(&self, kind: DataKind, document: &serde_json::Value) -> Result<(), StorageError> {
        self.token()?;
        retry_if(
            &self.retry,
            move || self.save_once(kind, document),
            StorageError::is_retryable,
        )
        .await
    }
}

// --- Drive API types ---

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> DriveStore {
        DriveStore::new(Some("token".into()))
            .with_base_urls(server.uri(), server.uri())
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    fn listing(ids: &[&str]) -> ResponseTemplate {
        let files: Vec<serde_json::Value> =
            ids.iter().map(|id| serde_json::json!({ "id": id })).collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": files }))
    }

    #[tokio::test]
    async fn no_token_is_no_credential() {
        let store = DriveStore::new(None);
        let err = store.load(DataKind::Chats).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NoCredential);

        let blank = DriveStore::new(Some("   ".into()));
        let err = blank.save_all(&Default::default()).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NoCredential);
    }

    #[test]
    fn status_mapping() {
        assert!(status_to_error(200, "x").is_none());
        assert_eq!(status_to_error(401, "x").unwrap().kind(), StorageErrorKind::Unauthorized);
        assert_eq!(status_to_error(403, "x").unwrap().kind(), StorageErrorKind::Forbidden);
        assert_eq!(status_to_error(404, "x").unwrap().kind(), StorageErrorKind::NotFound);
        assert_eq!(status_to_error(503, "x").unwrap().kind(), StorageErrorKind::Other);
    }

    #[tokio::test]
    async fn missing_remote_file_loads_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param("spaces", "appDataFolder"))
            .and(query_param("q", "name = 'customFormats.json'"))
            .and(header("authorization", "Bearer token"))
            .respond_with(listing(&[]))
            .expect(1)
            .mount(&server)
            .await;

        let doc = store(&server).load(DataKind::CustomFormats).await.unwrap();
        assert_eq!(doc, serde_json::json!([]));
    }

    #[tokio::test]
    async fn existing_file_is_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(listing(&["abc"]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/abc"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"autoEnhance": true})))
            .expect(1)
            .mount(&server)
            .await;

        let doc = store(&server).load(DataKind::UserPreferences).await.unwrap();
        assert_eq!(doc["autoEnhance"], true);
    }

    #[tokio::test]
    async fn malformed_download_loads_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(listing(&["prefs"]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/prefs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let drive = store(&server);
        let doc = drive.load(DataKind::UserPreferences).await.unwrap();
        assert_eq!(doc, serde_json::json!({}));

        let data = drive.load_all().await.unwrap();
        assert_eq!(data.user_preferences, promptscaffold_core::UserPreferences::default());
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let err = store(&server).load(DataKind::Chats).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = store(&server).load(DataKind::Chats).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Other);
    }

    #[tokio::test]
    async fn save_creates_then_uploads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(listing(&[]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(body_json(serde_json::json!({
                "name": "chats.json",
                "parents": ["appDataFolder"],
                "mimeType": "application/json",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "new-id"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/files/new-id"))
            .and(query_param("uploadType", "media"))
            .and(body_json(serde_json::json!([{"title": "hi"}])))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "new-id"})))
            .expect(1)
            .mount(&server)
            .await;

        let drive = store(&server);
        drive
            .save(DataKind::Chats, &serde_json::json!([{"title": "hi"}]))
            .await
            .unwrap();
        assert_eq!(drive.cached_id(DataKind::Chats).as_deref(), Some("new-id"));
    }

    #[tokio::test]
    async fn stale_cached_id_is_looked_up_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/stale"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(listing(&["fresh"]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"rawText": "a fox"}])))
            .expect(1)
            .mount(&server)
            .await;

        let drive = store(&server);
        drive.remember_id(DataKind::Chats, "stale");
        let doc = drive.load(DataKind::Chats).await.unwrap();
        assert_eq!(doc[0]["rawText"], "a fox");
        assert_eq!(drive.cached_id(DataKind::Chats).as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn stale_id_on_upload_recreates_the_file() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/files/stale"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(listing(&[]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "recreated"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/files/recreated"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let drive = store(&server);
        drive.remember_id(DataKind::CustomFormats, "stale");
        drive
            .save(DataKind::CustomFormats, &serde_json::json!([]))
            .await
            .unwrap();
        assert_eq!(drive.cached_id(DataKind::CustomFormats).as_deref(), Some("recreated"));
    }
}
