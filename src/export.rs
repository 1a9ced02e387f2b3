//! CSV export of login history.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::admin::is_valid_username;
use crate::error::ConsoleError;
use crate::ist::to_ist;
use crate::records::HistoryRow;
use crate::remote::{HistoryQuery, SupabaseClient};

pub const CSV_HEADER: &str = "Username,Login (IST),Logout (IST),Device,User-Agent";

/// Which slice of history to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    All,
    Date(NaiveDate),
    /// Inclusive on both ends.
    Range(NaiveDate, NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub scope: ExportScope,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub records: usize,
}

impl ExportRequest {
    pub fn new(scope: ExportScope, user: Option<String>) -> Self {
        let user = user.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        Self { scope, user }
    }

    /// The user ends up in the file name, so it must be a plain username.
    pub fn validate(&self) -> Result<(), ConsoleError> {
        match &self.user {
            Some(user) if !is_valid_username(user) => Err(ConsoleError::Validation(format!(
                "Invalid user \"{}\": usernames only contain letters, numbers, underscore, and hyphen",
                user
            ))),
            _ => Ok(()),
        }
    }

    pub fn query(&self) -> Result<HistoryQuery, ConsoleError> {
        self.validate()?;
        match self.scope {
            ExportScope::All => Ok(HistoryQuery::all(self.user.clone())),
            ExportScope::Date(date) => Ok(HistoryQuery::single_day(date, self.user.clone())),
            ExportScope::Range(start, end) => HistoryQuery::range(start, end, self.user.clone()),
        }
    }

    pub fn filename(&self) -> String {
        let span = match self.scope {
            ExportScope::All => "all".to_string(),
            ExportScope::Date(date) => date.format("%Y-%m-%d").to_string(),
            ExportScope::Range(start, end) => {
                format!("{}-to-{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        };
        match &self.user {
            Some(user) => format!("history-{}-{}.csv", user, span),
            None => format!("history-{}.csv", span),
        }
    }

    /// Message reported when the query returns no rows.
    pub fn empty_message(&self) -> String {
        let user = self.user.is_some();
        match self.scope {
            ExportScope::All if user => "No records found for selected user".to_string(),
            ExportScope::All => "No records found".to_string(),
            ExportScope::Date(_) if user => "No records found for selected date and user".to_string(),
            ExportScope::Date(_) => "No records found for selected date".to_string(),
            ExportScope::Range(..) if user => {
                "No records found for selected date range and user".to_string()
            }
            ExportScope::Range(..) => "No records found for selected date range".to_string(),
        }
    }
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render rows as CSV with every field quoted. Times are shown in IST.
pub fn csv_from_rows(rows: &[HistoryRow]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows {
        let fields = [
            quoted(&row.user_name),
            quoted(&to_ist(&row.login_time)),
            quoted(&row.logout_export()),
            quoted(row.device()),
            quoted(row.agent()),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Write `rows` to `<dir>/<filename>`. Errors on an empty result.
pub fn write_export(request: &ExportRequest, rows: &[HistoryRow], dir: &Path) -> Result<ExportOutcome, ConsoleError> {
    request.validate()?;
    if rows.is_empty() {
        return Err(ConsoleError::Export(request.empty_message()));
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(request.filename());
    std::fs::write(&path, csv_from_rows(rows))?;
    info!("Exported {} records to {:?}", rows.len(), path);
    Ok(ExportOutcome {
        path,
        records: rows.len(),
    })
}

/// Fetch the requested history and write it as CSV into `dir`.
pub async fn export_history(
    client: &SupabaseClient,
    request: &ExportRequest,
    dir: &Path,
) -> Result<ExportOutcome, ConsoleError> {
    let query = request.query()?;
    let rows = client.query_history(&query).await?;
    write_export(request, &rows, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_row() -> HistoryRow {
        HistoryRow {
            id: Some(7),
            user_name: "lobby".to_string(),
            login_time: "2026-10-16T03:30:00Z".to_string(),
            logout_time: None,
            last_ping: Some("2026-10-16T04:00:00Z".to_string()),
            device_model: Some("Fire TV".to_string()),
            user_agent: Some("Mozilla/5.0 \"Silk\"".to_string()),
        }
    }

    #[test]
    fn test_filenames() {
        let d = date("2026-10-16");
        let e = date("2026-10-18");
        let cases = [
            (ExportRequest::new(ExportScope::All, None), "history-all.csv"),
            (ExportRequest::new(ExportScope::All, Some("lobby".into())), "history-lobby-all.csv"),
            (ExportRequest::new(ExportScope::Date(d), None), "history-2026-10-16.csv"),
            (ExportRequest::new(ExportScope::Date(d), Some("lobby".into())), "history-lobby-2026-10-16.csv"),
            (ExportRequest::new(ExportScope::Range(d, e), None), "history-2026-10-16-to-2026-10-18.csv"),
            (
                ExportRequest::new(ExportScope::Range(d, e), Some("lobby".into())),
                "history-lobby-2026-10-16-to-2026-10-18.csv",
            ),
        ];
        for (request, expected) in cases {
            assert_eq!(request.filename(), expected);
        }
    }

    #[test]
    fn test_blank_user_means_all_users() {
        let request = ExportRequest::new(ExportScope::All, Some("  ".into()));
        assert_eq!(request.user, None);
        assert_eq!(request.filename(), "history-all.csv");
    }

    #[test]
    fn test_user_with_path_characters_is_rejected() {
        let dir = TempDir::new().unwrap();
        for user in ["../lobby", "a/b", "lobby tv"] {
            let request = ExportRequest::new(ExportScope::All, Some(user.into()));
            let err = request.query().unwrap_err();
            assert!(matches!(err, ConsoleError::Validation(ref m) if m.contains("Invalid user")));
            assert!(write_export(&request, &[sample_row()], dir.path()).is_err());
        }
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
        assert!(ExportRequest::new(ExportScope::All, Some("lobby_tv-2".into())).query().is_ok());
    }

    #[test]
    fn test_empty_messages() {
        let d = date("2026-10-16");
        assert_eq!(ExportRequest::new(ExportScope::All, None).empty_message(), "No records found");
        assert_eq!(
            ExportRequest::new(ExportScope::All, Some("x".into())).empty_message(),
            "No records found for selected user"
        );
        assert_eq!(
            ExportRequest::new(ExportScope::Date(d), Some("x".into())).empty_message(),
            "No records found for selected date and user"
        );
        assert_eq!(
            ExportRequest::new(ExportScope::Range(d, d), None).empty_message(),
            "No records found for selected date range"
        );
    }

    #[test]
    fn test_range_must_be_ordered() {
        let request = ExportRequest::new(
            ExportScope::Range(date("2026-10-18"), date("2026-10-16")),
            None,
        );
        let err = request.query().unwrap_err();
        assert_eq!(err.to_string(), "Start date must be before or equal to end date");
    }

    #[test]
    fn test_csv_from_rows() {
        let mut closed = sample_row();
        closed.logout_time = Some("2026-10-16T05:00:00Z".to_string());
        closed.device_model = None;
        closed.user_agent = None;

        let csv = csv_from_rows(&[sample_row(), closed]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            r#""lobby","16/10/2026 09:00:00","16/10/2026 09:30:00 (detected offline)","Fire TV","Mozilla/5.0 ""Silk""""#
        );
        assert_eq!(
            lines[2],
            r#""lobby","16/10/2026 09:00:00","16/10/2026 10:30:00","","""#
        );
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn test_write_export() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("exports");
        let request = ExportRequest::new(ExportScope::Date(date("2026-10-16")), Some("lobby".into()));

        let outcome = write_export(&request, &[sample_row()], &out).unwrap();
        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.path, out.join("history-lobby-2026-10-16.csv"));
        let written = std::fs::read_to_string(&outcome.path).unwrap();
        assert!(written.starts_with(CSV_HEADER));

        let err = write_export(&request, &[], &out).unwrap_err();
        assert!(matches!(err, ConsoleError::Export(_)));
        assert_eq!(err.to_string(), "No records found for selected date and user");
    }
}
