use async_trait::async_trait;

use crate::error::ConsoleError;
use crate::records::{HistoryRow, VideoRow};

use super::filter::FilterContext;

/// Read side of the remote service as seen by the refresh coordinator.
/// Rows come back newest first.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_history(&self, filter: &FilterContext) -> Result<Vec<HistoryRow>, ConsoleError>;

    async fn fetch_videos(&self, user: Option<&str>) -> Result<Vec<VideoRow>, ConsoleError>;
}
