use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::records::{DisplayUser, HistoryRow, NewVideo, VideoRow};
use crate::refresh::{FilterContext, QueryExecutor};

use super::query::{video_by_id_params, video_params, video_paths_params, HistoryQuery, QueryParams};

/// HTTP client for the project's REST and storage APIs.
///
/// Every request carries the anon key as both `apikey` and bearer token.
pub struct SupabaseClient {
    client: reqwest::Client,
    base: Url,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct StoragePath {
    storage_path: String,
}

impl SupabaseClient {
    pub fn new(base: Url, anon_key: &str, bucket: &str, timeout: Duration) -> Result<Self, ConsoleError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(anon_key)
            .map_err(|e| ConsoleError::Config(format!("Invalid anon key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", anon_key))
            .map_err(|e| ConsoleError::Config(format!("Invalid anon key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .user_agent("display-console/0.1")
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConsoleError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: with_trailing_slash(base),
            bucket: bucket.to_string(),
        })
    }

    pub fn from_config(config: &ConsoleConfig, anon_key: &str) -> Result<Self, ConsoleError> {
        Self::new(
            config.base_url()?,
            anon_key,
            &config.storage.bucket,
            Duration::from_secs(config.service.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, ConsoleError> {
        self.base
            .join(path)
            .map_err(|e| ConsoleError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, params: &QueryParams) -> Result<Vec<T>, ConsoleError> {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ConsoleError::Fetch(format!("Failed to query {}: {}", table, e)))?;

        check(response)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| ConsoleError::Fetch(format!("Malformed {} response: {}", table, e)))
    }

    async fn call_rpc(&self, function: &str, args: serde_json::Value) -> Result<reqwest::Response, ConsoleError> {
        let url = self.endpoint(&format!("rest/v1/rpc/{}", function))?;
        debug!("RPC {}", function);
        let response = self
            .client
            .post(url)
            .json(&args)
            .send()
            .await
            .map_err(|e| ConsoleError::Fetch(format!("Failed to call {}: {}", function, e)))?;
        check(response).await
    }

    async fn rpc<T: DeserializeOwned>(&self, function: &str, args: serde_json::Value) -> Result<T, ConsoleError> {
        self.call_rpc(function, args)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ConsoleError::Fetch(format!("Malformed {} response: {}", function, e)))
    }

    pub async fn list_users(&self) -> Result<Vec<DisplayUser>, ConsoleError> {
        let users: Option<Vec<DisplayUser>> = self.rpc("get_display_users", json!({})).await?;
        let users = users.unwrap_or_default();
        info!("Loaded {} display users", users.len());
        Ok(users)
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<(), ConsoleError> {
        // Returns void; the body is not inspected.
        self.call_rpc("create_display_user", json!({ "un": username, "pwd": password }))
            .await?;
        info!("Created display user {}", username);
        Ok(())
    }

    /// Returns false when the service refused (admin account or unknown user).
    pub async fn delete_user(&self, username: &str) -> Result<bool, ConsoleError> {
        let deleted: Option<bool> = self
            .rpc("delete_display_user", json!({ "un": username }))
            .await?;
        Ok(deleted.unwrap_or(false))
    }

    pub async fn list_videos(&self, user: Option<&str>) -> Result<Vec<VideoRow>, ConsoleError> {
        self.select("videos", &video_params(user)).await
    }

    pub async fn get_video(&self, id: i64) -> Result<Option<VideoRow>, ConsoleError> {
        let rows: Vec<VideoRow> = self.select("videos", &video_by_id_params(id)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn video_paths_for(&self, user: &str) -> Result<Vec<String>, ConsoleError> {
        let rows: Vec<StoragePath> = self.select("videos", &video_paths_params(user)).await?;
        Ok(rows.into_iter().map(|r| r.storage_path).collect())
    }

    pub async fn insert_video(&self, video: &NewVideo) -> Result<(), ConsoleError> {
        let url = self.endpoint("rest/v1/videos")?;
        let response = self
            .client
            .post(url)
            .header("Prefer", "return=minimal")
            .json(&[video])
            .send()
            .await
            .map_err(|e| ConsoleError::Fetch(format!("Failed to insert video row: {}", e)))?;
        check(response).await?;
        info!("Recorded video {} for {}", video.storage_path, video.display_user);
        Ok(())
    }

    pub async fn delete_video(&self, id: i64) -> Result<(), ConsoleError> {
        let url = self.endpoint("rest/v1/videos")?;
        let response = self
            .client
            .delete(url)
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await
            .map_err(|e| ConsoleError::Fetch(format!("Failed to delete video {}: {}", id, e)))?;
        check(response).await?;
        info!("Deleted video row {}", id);
        Ok(())
    }

    pub async fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRow>, ConsoleError> {
        self.select("login_history", &query.params()).await
    }

    /// Upload an object into the videos bucket. Existing objects are not overwritten.
    pub async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ConsoleError> {
        let url = self.endpoint(&format!("storage/v1/object/{}/{}", self.bucket, encode_object_path(path)))?;
        info!("Uploading {} ({} bytes)", path, bytes.len());
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ConsoleError::Storage(format!("Upload of {} failed: {}", path, e)))?;
        check(response).await?;
        Ok(())
    }

    pub async fn remove_objects(&self, paths: &[String]) -> Result<(), ConsoleError> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&format!("storage/v1/object/{}", self.bucket))?;
        let response = self
            .client
            .delete(url)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(|e| ConsoleError::Storage(format!("Failed to remove objects: {}", e)))?;
        check(response).await?;
        info!("Removed {} objects from {}", paths.len(), self.bucket);
        Ok(())
    }
}

#[async_trait]
impl QueryExecutor for SupabaseClient {
    async fn fetch_history(&self, filter: &FilterContext) -> Result<Vec<HistoryRow>, ConsoleError> {
        self.query_history(&HistoryQuery::from_filter(filter))
            .await
            .map_err(as_fetch_error)
    }

    async fn fetch_videos(&self, user: Option<&str>) -> Result<Vec<VideoRow>, ConsoleError> {
        self.list_videos(user).await.map_err(as_fetch_error)
    }
}

fn as_fetch_error(err: ConsoleError) -> ConsoleError {
    match err {
        ConsoleError::Fetch(_) => err,
        other => ConsoleError::Fetch(other.to_string()),
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Percent-encode each segment of an object path, keeping the separators.
pub fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ConsoleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            body.clone()
        }
    });
    warn!("Request failed with {}: {}", status.as_u16(), message);
    Err(ConsoleError::Remote {
        status: status.as_u16(),
        message,
    })
}

/// Pull the human-readable message out of a PostgREST or storage error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "msg", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}
