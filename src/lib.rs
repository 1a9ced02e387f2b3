pub mod admin;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ist;
pub mod keychain;
pub mod records;
pub mod refresh;
pub mod remote;
pub mod terminal;

pub use config::ConsoleConfig;
pub use error::ConsoleError;
pub use refresh::{FilterContext, RefreshCoordinator, RefreshSettings};

/// Log to stderr so command output on stdout stays clean.
/// `RUST_LOG` wins over the default level.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
