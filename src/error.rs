use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Realtime channel could not be established or was refused.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A read against the remote service failed or returned something unparseable.
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("{0}")]
    Validation(String),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// True when the remote service rejected a write because of a unique constraint.
    pub fn is_duplicate(&self) -> bool {
        match self {
            ConsoleError::Remote { message, .. } => {
                message.contains("duplicate") || message.contains("unique")
            }
            _ => false,
        }
    }
}

impl From<ConsoleError> for String {
    fn from(err: ConsoleError) -> Self {
        err.to_string()
    }
}
