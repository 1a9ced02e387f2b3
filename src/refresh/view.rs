use std::fmt;

use crate::records::{HistoryRow, VideoRow};

/// One of the two display regions kept current by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    History,
    Videos,
}

impl Region {
    /// Placeholder shown when a fetch succeeds with zero rows.
    pub fn empty_placeholder(self) -> &'static str {
        match self {
            Region::History => "No records found",
            Region::Videos => "No videos uploaded yet",
        }
    }

    /// Placeholder shown when a region has never loaded and its fetch fails.
    pub fn error_placeholder(self) -> &'static str {
        match self {
            Region::History => "Error loading history",
            Region::Videos => "Error loading videos",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::History => write!(f, "history"),
            Region::Videos => write!(f, "videos"),
        }
    }
}

/// What a display region currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionState<T> {
    Loading,
    Rows(Vec<T>),
    /// The last fetch succeeded with no rows.
    Empty,
    /// The region never loaded successfully and the last fetch failed.
    Error(String),
}

impl<T> RegionState<T> {
    /// Rows or an explicit empty result; both count as valid content that an
    /// error must not replace.
    pub fn has_content(&self) -> bool {
        matches!(self, RegionState::Rows(_) | RegionState::Empty)
    }

    pub fn rows(&self) -> &[T] {
        match self {
            RegionState::Rows(rows) => rows,
            _ => &[],
        }
    }
}

impl<T> Default for RegionState<T> {
    fn default() -> Self {
        RegionState::Loading
    }
}

/// Sink for rendered region states.
///
/// Called with the coordinator's state lock held so renders are applied in
/// order; implementations must not call back into the coordinator.
pub trait ViewSurface: Send + Sync {
    fn render_history(&self, state: &RegionState<HistoryRow>);

    fn render_videos(&self, state: &RegionState<VideoRow>);

    /// A refresh failed while the region kept its previous content.
    fn report_error(&self, region: Region, message: &str);
}
