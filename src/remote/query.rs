//! PostgREST query parameters for the history and video tables.

use chrono::NaiveDate;

use crate::error::ConsoleError;
use crate::ist::utc_day_bounds;
use crate::refresh::FilterContext;

/// The admin account's own logins are never part of the audit views.
pub const ADMIN_USER: &str = "admin";

pub type QueryParams = Vec<(String, String)>;

/// Filters for a `login_history` read, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user: Option<String>,
    /// First day included (from 00:00:00 UTC).
    pub from: Option<NaiveDate>,
    /// Last day included (until 23:59:59 UTC).
    pub to: Option<NaiveDate>,
}

impl HistoryQuery {
    pub fn all(user: Option<String>) -> Self {
        Self {
            user,
            from: None,
            to: None,
        }
    }

    pub fn single_day(date: NaiveDate, user: Option<String>) -> Self {
        Self {
            user,
            from: Some(date),
            to: Some(date),
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate, user: Option<String>) -> Result<Self, ConsoleError> {
        if start > end {
            return Err(ConsoleError::Validation(
                "Start date must be before or equal to end date".to_string(),
            ));
        }
        Ok(Self {
            user,
            from: Some(start),
            to: Some(end),
        })
    }

    pub fn from_filter(filter: &FilterContext) -> Self {
        match filter.date {
            Some(date) => Self::single_day(date, filter.user.clone()),
            None => Self::all(filter.user.clone()),
        }
    }

    pub fn params(&self) -> QueryParams {
        let mut params = vec![
            param("select", "*"),
            param("user_name", format!("neq.{}", ADMIN_USER)),
        ];
        if let Some(user) = &self.user {
            params.push(param("user_name", format!("eq.{}", user)));
        }
        if let Some(from) = self.from {
            params.push(param("login_time", format!("gte.{}", utc_day_bounds(from).0)));
        }
        if let Some(to) = self.to {
            params.push(param("login_time", format!("lte.{}", utc_day_bounds(to).1)));
        }
        params.push(param("order", "login_time.desc"));
        params
    }
}

/// `videos` read, newest upload first, optionally for one display user.
pub fn video_params(user: Option<&str>) -> QueryParams {
    let mut params = vec![param("select", "*")];
    if let Some(user) = user {
        params.push(param("display_user", format!("eq.{}", user)));
    }
    params.push(param("order", "uploaded_at.desc"));
    params
}

pub fn video_by_id_params(id: i64) -> QueryParams {
    vec![param("select", "*"), param("id", format!("eq.{}", id))]
}

/// Storage paths of every video owned by `user`.
pub fn video_paths_params(user: &str) -> QueryParams {
    vec![
        param("select", "storage_path"),
        param("display_user", format!("eq.{}", user)),
    ]
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_pairs(params: &QueryParams) -> Vec<(&str, &str)> {
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_all_history_excludes_admin() {
        let params = HistoryQuery::all(None).params();
        assert_eq!(
            as_pairs(&params),
            vec![
                ("select", "*"),
                ("user_name", "neq.admin"),
                ("order", "login_time.desc"),
            ]
        );
    }

    #[test]
    fn test_single_day_for_user() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let params = HistoryQuery::single_day(date, Some("lobby".into())).params();
        assert_eq!(
            as_pairs(&params),
            vec![
                ("select", "*"),
                ("user_name", "neq.admin"),
                ("user_name", "eq.lobby"),
                ("login_time", "gte.2026-10-16T00:00:00.000Z"),
                ("login_time", "lte.2026-10-16T23:59:59.000Z"),
                ("order", "login_time.desc"),
            ]
        );
    }

    #[test]
    fn test_range_bounds_and_validation() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 10, 3).unwrap();
        let q = HistoryQuery::range(start, end, None).unwrap();
        let params = q.params();
        assert!(params.contains(&("login_time".into(), "gte.2026-10-01T00:00:00.000Z".into())));
        assert!(params.contains(&("login_time".into(), "lte.2026-10-03T23:59:59.000Z".into())));

        assert!(HistoryQuery::range(start, start, None).is_ok());
        let err = HistoryQuery::range(end, start, None).unwrap_err();
        assert_eq!(err.to_string(), "Start date must be before or equal to end date");
    }

    #[test]
    fn test_from_filter() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let filter = FilterContext::new(Some(date), Some("kiosk".into()), Some("other".into()));
        let q = HistoryQuery::from_filter(&filter);
        assert_eq!(q, HistoryQuery::single_day(date, Some("kiosk".into())));

        let q = HistoryQuery::from_filter(&FilterContext::default());
        assert_eq!(q, HistoryQuery::all(None));
    }

    #[test]
    fn test_video_params() {
        assert_eq!(
            as_pairs(&video_params(Some("foyer"))),
            vec![
                ("select", "*"),
                ("display_user", "eq.foyer"),
                ("order", "uploaded_at.desc"),
            ]
        );
        assert_eq!(video_params(None).len(), 2);
    }
}
