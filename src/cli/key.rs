use crate::error::ConsoleError;
use crate::keychain;

pub fn set(key: &str) -> Result<(), ConsoleError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ConsoleError::Validation("Anon key must not be empty".to_string()));
    }
    keychain::set_anon_key(key)?;
    println!("Anon key stored in the system keychain");
    Ok(())
}

/// Report whether a key is stored without echoing it.
pub fn status() -> Result<(), ConsoleError> {
    match keychain::get_anon_key()? {
        Some(key) => println!("Anon key stored ({} characters)", key.chars().count()),
        None => println!("No anon key stored"),
    }
    Ok(())
}

pub fn delete() -> Result<(), ConsoleError> {
    keychain::delete_anon_key()?;
    println!("Anon key removed from the system keychain");
    Ok(())
}
