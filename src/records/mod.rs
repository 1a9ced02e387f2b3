//! Rows exchanged with the remote service.

pub mod types;

pub use types::{DisplayUser, HistoryRow, NewVideo, VideoRow, OFFLINE_AFTER_SECS};
