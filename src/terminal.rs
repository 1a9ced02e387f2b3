//! Plain-text tables for the terminal.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::ist::{to_ist, to_ist_date};
use crate::records::{DisplayUser, HistoryRow, VideoRow};
use crate::refresh::{Region, RegionState, ViewSurface};

const AGENT_WIDTH: usize = 48;

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Lay out rows under a header, each column padded to its widest cell.
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(header.to_vec());
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

pub fn history_table(rows: &[HistoryRow], now: DateTime<Utc>) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.user_name.clone(),
                to_ist(&r.login_time),
                r.logout_display(now),
                r.device().to_string(),
                truncate(r.agent(), AGENT_WIDTH),
            ]
        })
        .collect();
    table(&["USER", "LOGIN (IST)", "LOGOUT (IST)", "DEVICE", "USER-AGENT"], &body)
}

pub fn video_table(rows: &[VideoRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|v| {
            vec![
                v.id.to_string(),
                v.filename.clone(),
                v.display_user.clone(),
                v.uploaded_at.as_deref().map(to_ist).unwrap_or_default(),
                v.uploaded_by.clone().unwrap_or_default(),
            ]
        })
        .collect();
    table(&["ID", "FILE", "DISPLAY USER", "UPLOADED (IST)", "BY"], &body)
}

pub fn user_table(users: &[DisplayUser]) -> String {
    let body: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                u.username.clone(),
                u.created_at.as_deref().map(to_ist_date).unwrap_or_default(),
            ]
        })
        .collect();
    table(&["USERNAME", "CREATED"], &body)
}

fn region_text<T>(region: Region, state: &RegionState<T>, render: impl FnOnce(&[T]) -> String) -> String {
    match state {
        RegionState::Loading => "Loading...\n".to_string(),
        RegionState::Rows(rows) => render(rows),
        RegionState::Empty => format!("{}\n", region.empty_placeholder()),
        RegionState::Error(_) => format!("{}\n", region.error_placeholder()),
    }
}

/// Renders coordinator output to stdout.
#[derive(Debug, Default)]
pub struct TerminalView;

impl TerminalView {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, title: &str, body: &str) {
        let mut out = io::stdout().lock();
        // A closed stdout leaves nothing to report to.
        let _ = writeln!(out, "\n== {} ==\n{}", title, body);
        let _ = out.flush();
    }
}

impl ViewSurface for TerminalView {
    fn render_history(&self, state: &RegionState<HistoryRow>) {
        let now = Utc::now();
        let body = region_text(Region::History, state, |rows| history_table(rows, now));
        self.emit("Login history", &body);
    }

    fn render_videos(&self, state: &RegionState<VideoRow>) {
        let body = region_text(Region::Videos, state, video_table);
        self.emit("Videos", &body);
    }

    fn report_error(&self, region: Region, message: &str) {
        eprintln!("Error refreshing {}: {}", region, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_history_table_columns() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 4, 0, 30).unwrap();
        let rows = vec![HistoryRow {
            id: Some(1),
            user_name: "lobby".into(),
            login_time: "2026-10-16T03:30:00Z".into(),
            logout_time: None,
            last_ping: Some("2026-10-16T04:00:00Z".into()),
            device_model: Some("Fire TV".into()),
            user_agent: None,
        }];
        let text = history_table(&rows, now);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("USER "));
        assert!(lines[1].starts_with("-----"));
        assert!(lines[2].contains("16/10/2026 09:00:00"));
        assert!(lines[2].contains("Active"));
        assert!(lines[2].contains("Fire TV"));
    }

    #[test]
    fn test_region_placeholders() {
        let empty: RegionState<VideoRow> = RegionState::Empty;
        assert_eq!(region_text(Region::Videos, &empty, video_table), "No videos uploaded yet\n");
        let failed: RegionState<HistoryRow> = RegionState::Error("boom".into());
        assert_eq!(
            region_text(Region::History, &failed, |r| history_table(r, Utc::now())),
            "Error loading history\n"
        );
    }
}
