//! Keeps the history and video regions current.
//!
//! The coordinator sits between three collaborators: a notification channel
//! (upstream), a query executor (downstream) and the view it renders into.

pub mod channel;
pub mod coordinator;
pub mod executor;
pub mod filter;
pub mod view;

pub use channel::{ChannelConnection, ChannelEvent, NotificationChannel, Subscription};
pub use coordinator::{RefreshCoordinator, RefreshSettings};
pub use executor::QueryExecutor;
pub use filter::{FilterContext, FilterSource, SharedFilters};
pub use view::{Region, RegionState, ViewSurface};
