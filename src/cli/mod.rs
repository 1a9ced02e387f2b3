//! Command handlers behind the `display-console` binary.

pub mod export;
pub mod history;
pub mod key;
pub mod users;
pub mod videos;
pub mod watch;

use std::path::Path;

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::keychain::resolve_anon_key;
use crate::remote::{RealtimeChannel, SupabaseClient};

/// Loaded configuration plus the credentials every remote command needs.
pub struct Console {
    pub config: ConsoleConfig,
}

impl Console {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConsoleError> {
        Ok(Self {
            config: ConsoleConfig::load(config_path)?,
        })
    }

    pub fn client(&self) -> Result<SupabaseClient, ConsoleError> {
        let key = resolve_anon_key(&self.config)?;
        SupabaseClient::from_config(&self.config, &key)
    }

    pub fn realtime(&self) -> Result<RealtimeChannel, ConsoleError> {
        let key = resolve_anon_key(&self.config)?;
        RealtimeChannel::from_config(&self.config, &key)
    }
}
