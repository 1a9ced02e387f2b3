use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::error::ConsoleError;
use crate::ist::{parse_date, today_ist};
use crate::refresh::{ChannelConnection, FilterContext, FilterSource, RefreshCoordinator, SharedFilters};
use crate::terminal::TerminalView;

use super::Console;

const HELP: &str = "\
Commands:
  refresh               reload history and videos now
  filter [DATE] [USER]  show history for DATE (YYYY-MM-DD) and/or USER
  clear                 show history for all dates and users
  videos [USER]         show videos for USER, or all users
  visible               reconnect if needed and catch up
  status                show channel state and filters
  quit                  stop watching";

/// A line typed while watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    Refresh,
    Filter {
        date: Option<NaiveDate>,
        user: Option<String>,
    },
    Clear,
    Videos(Option<String>),
    Visible,
    Status,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<WatchCommand>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "refresh" | "r" => WatchCommand::Refresh,
        "clear" => WatchCommand::Clear,
        "visible" => WatchCommand::Visible,
        "status" => WatchCommand::Status,
        "help" | "?" => WatchCommand::Help,
        "quit" | "exit" | "q" => WatchCommand::Quit,
        "videos" => WatchCommand::Videos(args.first().map(|u| u.to_string())),
        "filter" => {
            if args.len() > 2 {
                return Err(ConsoleError::Validation("Usage: filter [DATE] [USER]".to_string()));
            }
            let mut date = None;
            let mut user = None;
            for arg in args {
                if date.is_none() && user.is_none() && looks_like_date(arg) {
                    date = Some(parse_date(arg)?);
                } else if user.is_none() {
                    user = Some(arg.to_string());
                } else {
                    return Err(ConsoleError::Validation("Usage: filter [DATE] [USER]".to_string()));
                }
            }
            WatchCommand::Filter { date, user }
        }
        other => {
            return Err(ConsoleError::Validation(format!(
                "Unknown command \"{}\" (type help)",
                other
            )))
        }
    };
    Ok(Some(command))
}

fn looks_like_date(arg: &str) -> bool {
    arg.len() == 10 && arg.as_bytes().get(4) == Some(&b'-') && arg.as_bytes().get(7) == Some(&b'-')
}

/// Keep the history and video views live until `quit` or end of input.
pub async fn run(console: &Console, initial: FilterContext) -> Result<(), ConsoleError> {
    let executor = Arc::new(console.client()?);
    let channel = Arc::new(console.realtime()?);
    let filters = Arc::new(SharedFilters::new(initial));
    let coordinator = RefreshCoordinator::create(
        executor,
        channel,
        filters.clone(),
        Arc::new(TerminalView::new()),
        console.config.refresh.settings(),
    );

    println!("Watching for changes. Type help for commands.");
    coordinator.on_visible().await;
    if coordinator.connection() != ChannelConnection::Subscribed {
        eprintln!("Realtime updates unavailable; use refresh or visible to retry");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        debug!("Watch command: {:?}", command);

        match command {
            WatchCommand::Refresh => coordinator.run_refresh_now(filters.current()).await,
            WatchCommand::Filter { date, user } => {
                filters.set_history(date, user);
                coordinator.run_refresh_now(filters.current()).await;
            }
            WatchCommand::Clear => {
                filters.clear_history();
                coordinator.run_refresh_now(filters.current()).await;
            }
            WatchCommand::Videos(user) => {
                filters.set_video_user(user);
                coordinator.run_refresh_now(filters.current()).await;
            }
            WatchCommand::Visible => {
                coordinator.on_visible().await;
            }
            WatchCommand::Status => {
                let current = filters.current();
                println!(
                    "Channel: {:?} | date: {} | user: {} | videos: {}",
                    coordinator.connection(),
                    current.date.map(|d| d.to_string()).unwrap_or_else(|| "all".into()),
                    current.user.as_deref().unwrap_or("all"),
                    current.video_user.as_deref().unwrap_or("all"),
                );
            }
            WatchCommand::Help => println!("{}", HELP),
            WatchCommand::Quit => break,
        }
    }

    coordinator.dispose();
    info!("Stopped watching");
    Ok(())
}

/// Filters for a new watch session. History defaults to today in IST.
pub fn initial_filters(date: Option<NaiveDate>, all_dates: bool, user: Option<String>, video_user: Option<String>) -> FilterContext {
    let date = if all_dates {
        None
    } else {
        Some(date.unwrap_or_else(|| today_ist(Utc::now())))
    };
    FilterContext::new(date, user, video_user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("refresh").unwrap(), Some(WatchCommand::Refresh));
        assert_eq!(parse_command("  QUIT ").unwrap(), Some(WatchCommand::Quit));
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("videos").unwrap(), Some(WatchCommand::Videos(None)));
        assert_eq!(
            parse_command("videos foyer").unwrap(),
            Some(WatchCommand::Videos(Some("foyer".into())))
        );
    }

    #[test]
    fn test_parse_filter() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16);
        assert_eq!(
            parse_command("filter 2026-10-16 lobby").unwrap(),
            Some(WatchCommand::Filter {
                date,
                user: Some("lobby".into())
            })
        );
        assert_eq!(
            parse_command("filter lobby").unwrap(),
            Some(WatchCommand::Filter {
                date: None,
                user: Some("lobby".into())
            })
        );
        assert_eq!(
            parse_command("filter").unwrap(),
            Some(WatchCommand::Filter { date: None, user: None })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("filter 2026-13-40").is_err());
        assert!(parse_command("filter a b c").is_err());
        let err = parse_command("reboot").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command \"reboot\" (type help)");
    }

    #[test]
    fn test_initial_filters() {
        let ctx = initial_filters(None, true, Some("".into()), None);
        assert_eq!(ctx, FilterContext::default());

        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let ctx = initial_filters(Some(date), false, None, Some("foyer".into()));
        assert_eq!(ctx.date, Some(date));
        assert_eq!(ctx.video_user.as_deref(), Some("foyer"));

        assert!(initial_filters(None, false, None, None).date.is_some());
    }
}
