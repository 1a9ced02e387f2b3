use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ist::{parse_timestamp, to_ist};

/// A device without a logout for longer than this is shown as offline.
pub const OFFLINE_AFTER_SECS: i64 = 70;

/// A named kiosk/device account as returned by `get_display_users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayUser {
    pub username: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A row of the `videos` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRow {
    pub id: i64,
    pub filename: String,
    pub storage_path: String,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    pub display_user: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// Insert payload for the `videos` table; id and upload time are assigned by the service.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewVideo {
    pub filename: String,
    pub storage_path: String,
    pub uploaded_by: String,
    pub display_user: String,
}

/// A row of the `login_history` audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRow {
    #[serde(default)]
    pub id: Option<i64>,
    pub user_name: String,
    pub login_time: String,
    #[serde(default)]
    pub logout_time: Option<String>,
    #[serde(default)]
    pub last_ping: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl HistoryRow {
    /// Logout column for the live history table.
    ///
    /// Sessions without a logout are "Active" unless the device stopped
    /// pinging more than [`OFFLINE_AFTER_SECS`] ago.
    pub fn logout_display(&self, now: DateTime<Utc>) -> String {
        if let Some(logout) = non_empty(&self.logout_time) {
            return to_ist(logout);
        }
        if let Some(ping) = non_empty(&self.last_ping) {
            if let Some(ping_at) = parse_timestamp(ping) {
                if (now - ping_at).num_seconds() > OFFLINE_AFTER_SECS {
                    return format!("{} (detected offline)", to_ist(ping));
                }
            }
        }
        "Active".to_string()
    }

    /// Logout column for CSV exports. Any open session with a ping counts as offline.
    pub fn logout_export(&self) -> String {
        if let Some(logout) = non_empty(&self.logout_time) {
            return to_ist(logout);
        }
        match non_empty(&self.last_ping) {
            Some(ping) => format!("{} (detected offline)", to_ist(ping)),
            None => String::new(),
        }
    }

    pub fn device(&self) -> &str {
        self.device_model.as_deref().unwrap_or("")
    }

    pub fn agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(logout: Option<&str>, ping: Option<&str>) -> HistoryRow {
        HistoryRow {
            id: Some(1),
            user_name: "lobby-tv".to_string(),
            login_time: "2026-10-16T08:00:00Z".to_string(),
            logout_time: logout.map(str::to_string),
            last_ping: ping.map(str::to_string),
            device_model: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_logout_display_prefers_logout_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let r = row(Some("2026-10-16T09:00:00Z"), Some("2026-10-16T08:59:00Z"));
        assert_eq!(r.logout_display(now), "16/10/2026 14:30:00");
    }

    #[test]
    fn test_logout_display_recent_ping_is_active() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 1, 0).unwrap();
        let r = row(None, Some("2026-10-16T09:00:00Z"));
        assert_eq!(r.logout_display(now), "Active");
    }

    #[test]
    fn test_logout_display_stale_ping_is_offline() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 1, 11).unwrap();
        let r = row(None, Some("2026-10-16T09:00:00Z"));
        assert_eq!(r.logout_display(now), "16/10/2026 14:30:00 (detected offline)");
    }

    #[test]
    fn test_logout_display_without_ping() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        assert_eq!(row(None, None).logout_display(now), "Active");
        assert_eq!(row(Some(""), None).logout_display(now), "Active");
    }

    #[test]
    fn test_logout_export() {
        assert_eq!(row(None, None).logout_export(), "");
        assert_eq!(
            row(None, Some("2026-10-16T09:00:00Z")).logout_export(),
            "16/10/2026 14:30:00 (detected offline)"
        );
    }

    #[test]
    fn test_history_row_deserializes_with_missing_columns() {
        let json = r#"{"user_name":"kiosk-1","login_time":"2026-10-16T08:00:00+00:00","logout_time":null}"#;
        let r: HistoryRow = serde_json::from_str(json).unwrap();
        assert_eq!(r.user_name, "kiosk-1");
        assert!(r.logout_time.is_none());
        assert_eq!(r.device(), "");
        assert_eq!(r.agent(), "");
    }
}
