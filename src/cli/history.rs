use chrono::{NaiveDate, Utc};

use crate::error::ConsoleError;
use crate::refresh::Region;
use crate::remote::HistoryQuery;
use crate::terminal::history_table;

use super::Console;

/// Print login history once. No date shows every day.
pub async fn show(console: &Console, date: Option<NaiveDate>, user: Option<String>) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let user = user.filter(|u| !u.trim().is_empty());
    let query = match date {
        Some(date) => HistoryQuery::single_day(date, user),
        None => HistoryQuery::all(user),
    };
    let rows = client.query_history(&query).await?;
    if rows.is_empty() {
        println!("{}", Region::History.empty_placeholder());
    } else {
        print!("{}", history_table(&rows, Utc::now()));
    }
    Ok(())
}
