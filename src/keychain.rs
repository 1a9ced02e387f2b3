use keyring::Entry;
use tracing::{info, warn};

use crate::config::{ConsoleConfig, ENV_ANON_KEY};
use crate::error::ConsoleError;

const KEYCHAIN_SERVICE: &str = "display-console-anon-key";
const KEYCHAIN_ACCOUNT: &str = "display-console";

fn entry() -> Result<Entry, ConsoleError> {
    Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).map_err(|e| {
        warn!("Failed to create keyring entry: {}", e);
        ConsoleError::Config(e.to_string())
    })
}

pub fn set_anon_key(key: &str) -> Result<(), ConsoleError> {
    info!("Storing anon key in keychain");
    entry()?.set_password(key).map_err(|e| {
        warn!("Failed to store anon key: {}", e);
        ConsoleError::Config(e.to_string())
    })
}

pub fn get_anon_key() -> Result<Option<String>, ConsoleError> {
    match entry()?.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => {
            info!("No anon key stored in keychain");
            Ok(None)
        }
        Err(e) => {
            warn!("Failed to read anon key: {}", e);
            Err(ConsoleError::Config(e.to_string()))
        }
    }
}

pub fn delete_anon_key() -> Result<(), ConsoleError> {
    info!("Deleting anon key from keychain");
    entry()?.delete_credential().map_err(|e| {
        warn!("Failed to delete anon key: {}", e);
        ConsoleError::Config(e.to_string())
    })
}

/// The anon key from config/env, falling back to the keychain.
pub fn resolve_anon_key(config: &ConsoleConfig) -> Result<String, ConsoleError> {
    if let Some(key) = config.service.anon_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    get_anon_key()?.ok_or_else(|| {
        ConsoleError::Config(format!(
            "No anon key configured. Run `display-console key set <key>`, set service.anon_key, or export {}.",
            ENV_ANON_KEY
        ))
    })
}
