use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ConsoleError;
use crate::records::{NewVideo, VideoRow};
use crate::remote::SupabaseClient;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadedVideo {
    pub filename: String,
    pub storage_path: String,
    pub display_user: String,
    pub bytes: usize,
}

/// Object key for an upload: `<user>/<epoch millis>-<file name>`.
pub fn object_path(display_user: &str, filename: &str, epoch_millis: i64) -> String {
    format!("{}/{}-{}", display_user, epoch_millis, filename)
}

pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("ogv") => "video/ogg",
        _ => "application/octet-stream",
    }
}

pub async fn list_videos(client: &SupabaseClient, user: Option<&str>) -> Result<Vec<VideoRow>, ConsoleError> {
    client.list_videos(user).await
}

/// Upload a local file for `display_user` and record it in the videos table.
pub async fn upload_video(
    client: &SupabaseClient,
    file: &Path,
    display_user: &str,
    operator: &str,
) -> Result<UploadedVideo, ConsoleError> {
    let display_user = display_user.trim();
    if display_user.is_empty() {
        return Err(ConsoleError::Validation("Please select a display user".to_string()));
    }
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|_| file.is_file())
        .ok_or_else(|| ConsoleError::Validation("Please select a video file".to_string()))?
        .to_string();

    let bytes = tokio::fs::read(file).await?;
    let size = bytes.len();
    let storage_path = object_path(display_user, &filename, Utc::now().timestamp_millis());

    client
        .upload_object(&storage_path, bytes, content_type_for(&filename))
        .await?;
    client
        .insert_video(&NewVideo {
            filename: filename.clone(),
            storage_path: storage_path.clone(),
            uploaded_by: operator.to_string(),
            display_user: display_user.to_string(),
        })
        .await?;

    info!("Uploaded {} for {} ({} bytes)", filename, display_user, size);
    Ok(UploadedVideo {
        filename,
        storage_path,
        display_user: display_user.to_string(),
        bytes: size,
    })
}

/// Remove a video's stored object, then its row. A storage failure is logged
/// and the row is still deleted.
pub async fn delete_video(client: &SupabaseClient, id: i64) -> Result<VideoRow, ConsoleError> {
    let video = client
        .get_video(id)
        .await?
        .ok_or_else(|| ConsoleError::Validation(format!("Video {} not found", id)))?;

    if let Err(e) = client.remove_objects(&[video.storage_path.clone()]).await {
        warn!("Storage delete error for {}: {}", video.storage_path, e);
    }
    client.delete_video(id).await?;
    Ok(video)
}
