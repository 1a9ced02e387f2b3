use serde::Serialize;
use tracing::{info, warn};

use crate::error::ConsoleError;
use crate::records::DisplayUser;
use crate::remote::{SupabaseClient, ADMIN_USER};

/// Outcome of deleting a display user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserDeletion {
    pub username: String,
    /// Storage objects removed along with the user.
    pub removed_objects: usize,
}

/// Letters, digits, underscore and hyphen only.
pub fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Check a new account's credentials. Returns the trimmed username.
pub fn validate_new_user(username: &str, password: &str) -> Result<String, ConsoleError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ConsoleError::Validation(
            "Please enter both username and password".to_string(),
        ));
    }
    if !is_valid_username(username) {
        return Err(ConsoleError::Validation(
            "Username can only contain letters, numbers, underscore, and hyphen".to_string(),
        ));
    }
    if username == ADMIN_USER {
        return Err(ConsoleError::Validation(format!(
            "Cannot create user with username \"{}\"",
            ADMIN_USER
        )));
    }
    Ok(username.to_string())
}

pub async fn list_users(client: &SupabaseClient) -> Result<Vec<DisplayUser>, ConsoleError> {
    client.list_users().await
}

/// Create a display user after validating the credentials locally.
pub async fn create_user(client: &SupabaseClient, username: &str, password: &str) -> Result<String, ConsoleError> {
    let username = validate_new_user(username, password)?;
    match client.create_user(&username, password).await {
        Ok(()) => Ok(username),
        Err(e) if e.is_duplicate() => Err(ConsoleError::Validation(
            "Username already exists. Please choose a different username.".to_string(),
        )),
        Err(e) => Err(e),
    }
}

/// Delete a display user and every stored video object that belonged to them.
///
/// Object paths are collected before the account goes away; a failure to
/// clean up storage is logged and does not undo the deletion.
pub async fn delete_user(client: &SupabaseClient, username: &str) -> Result<UserDeletion, ConsoleError> {
    let paths = match client.video_paths_for(username).await {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Could not list videos for {}: {}", username, e);
            Vec::new()
        }
    };

    if !client.delete_user(username).await? {
        return Err(ConsoleError::Validation(
            "Failed to delete user. User may be admin or not found.".to_string(),
        ));
    }
    info!("Deleted display user {}", username);

    let removed_objects = match client.remove_objects(&paths).await {
        Ok(()) => paths.len(),
        Err(e) => {
            warn!("Failed to remove stored videos for {}: {}", username, e);
            0
        }
    };

    Ok(UserDeletion {
        username: username.to_string(),
        removed_objects,
    })
}
