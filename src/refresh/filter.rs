use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;

/// The operator's current filter selections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    /// History: restrict to one (UTC) calendar day.
    pub date: Option<NaiveDate>,
    /// History: restrict to one display user.
    pub user: Option<String>,
    /// Video list: restrict to one display user.
    pub video_user: Option<String>,
}

impl FilterContext {
    pub fn new(date: Option<NaiveDate>, user: Option<String>, video_user: Option<String>) -> Self {
        Self {
            date,
            user: normalize(user),
            video_user: normalize(video_user),
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where a refresh reads its filters from at the moment it executes.
pub trait FilterSource: Send + Sync {
    fn current(&self) -> FilterContext;
}

impl FilterSource for FilterContext {
    fn current(&self) -> FilterContext {
        self.clone()
    }
}

/// Mutable filter state edited by the operator while the console runs.
#[derive(Debug, Default)]
pub struct SharedFilters {
    inner: Mutex<FilterContext>,
}

impl SharedFilters {
    pub fn new(initial: FilterContext) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    /// Replace the history filters, keeping the video filter.
    pub fn set_history(&self, date: Option<NaiveDate>, user: Option<String>) {
        let mut filters = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        filters.date = date;
        filters.user = normalize(user);
    }

    pub fn set_video_user(&self, user: Option<String>) {
        let mut filters = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        filters.video_user = normalize(user);
    }

    /// Reset the history filters to "all dates, all users".
    pub fn clear_history(&self) {
        self.set_history(None, None);
    }
}

impl FilterSource for SharedFilters {
    fn current(&self) -> FilterContext {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_users_mean_no_filter() {
        let ctx = FilterContext::new(None, Some("  ".into()), Some(" foyer ".into()));
        assert!(ctx.user.is_none());
        assert_eq!(ctx.video_user.as_deref(), Some("foyer"));
    }

    #[test]
    fn test_shared_filters_reads_latest_selection() {
        let filters = SharedFilters::new(FilterContext::default());
        filters.set_history(NaiveDate::from_ymd_opt(2026, 1, 2), Some("kiosk".into()));
        filters.set_video_user(Some("".into()));
        let ctx = filters.current();
        assert_eq!(ctx.user.as_deref(), Some("kiosk"));
        assert!(ctx.video_user.is_none());

        filters.clear_history();
        assert_eq!(filters.current(), FilterContext::default());
    }
}
