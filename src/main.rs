use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::error;

use display_console::cli::{self, Console};
use display_console::export::{ExportRequest, ExportScope};
use display_console::ist::parse_date;

#[derive(Parser)]
#[command(name = "display-console", version, about = "Manage display users, their videos and login history")]
struct Cli {
    /// Config file (default: <config dir>/display-console/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Display user accounts
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
    /// Videos assigned to display users
    Videos {
        #[command(subcommand)]
        action: VideosAction,
    },
    /// Print login history
    History {
        /// Day to show (YYYY-MM-DD); all days when omitted
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Export login history to CSV
    Export {
        #[command(subcommand)]
        scope: ExportCommand,
    },
    /// Keep history and videos live, refreshing on realtime notifications
    Watch {
        /// History day (YYYY-MM-DD); defaults to today in IST
        #[arg(long, value_parser = date_arg, conflicts_with = "all_dates")]
        date: Option<NaiveDate>,
        /// Show history for every day
        #[arg(long)]
        all_dates: bool,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        video_user: Option<String>,
    },
    /// Anon key in the system keychain
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    List,
    Create {
        username: String,
        #[arg(long)]
        password: String,
    },
    Delete { username: String },
}

#[derive(Subcommand)]
enum VideosAction {
    List {
        #[arg(long)]
        user: Option<String>,
    },
    Upload {
        file: PathBuf,
        /// Display user the video is for
        #[arg(long)]
        user: String,
    },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ExportCommand {
    All {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Date {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Range {
        #[arg(value_parser = date_arg)]
        start: NaiveDate,
        #[arg(value_parser = date_arg)]
        end: NaiveDate,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    Set { key: String },
    /// Show whether a key is stored
    Get,
    Delete,
}

fn date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).map_err(String::from)
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    display_console::init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    if let Command::Key { action } = &args.command {
        match action {
            KeyAction::Set { key } => cli::key::set(key)?,
            KeyAction::Get => cli::key::status()?,
            KeyAction::Delete => cli::key::delete()?,
        }
        return Ok(());
    }

    let console = Console::load(args.config.as_deref())?;
    match args.command {
        Command::Users { action } => match action {
            UsersAction::List => cli::users::list(&console).await?,
            UsersAction::Create { username, password } => {
                cli::users::create(&console, &username, &password).await?
            }
            UsersAction::Delete { username } => cli::users::delete(&console, &username).await?,
        },
        Command::Videos { action } => match action {
            VideosAction::List { user } => cli::videos::list(&console, user.as_deref()).await?,
            VideosAction::Upload { file, user } => cli::videos::upload(&console, &file, &user).await?,
            VideosAction::Delete { id } => cli::videos::delete(&console, id).await?,
        },
        Command::History { date, user } => cli::history::show(&console, date, user).await?,
        Command::Export { scope } => {
            let (scope, user, out) = match scope {
                ExportCommand::All { user, out } => (ExportScope::All, user, out),
                ExportCommand::Date { date, user, out } => (ExportScope::Date(date), user, out),
                ExportCommand::Range { start, end, user, out } => (ExportScope::Range(start, end), user, out),
            };
            cli::export::run(&console, ExportRequest::new(scope, user), out).await?
        }
        Command::Watch {
            date,
            all_dates,
            user,
            video_user,
        } => {
            let initial = cli::watch::initial_filters(date, all_dates, user, video_user);
            cli::watch::run(&console, initial).await?
        }
        Command::Key { .. } => {}
    }
    Ok(())
}
