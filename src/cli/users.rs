use crate::admin;
use crate::error::ConsoleError;
use crate::terminal::user_table;

use super::Console;

pub async fn list(console: &Console) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let users = admin::list_users(&client).await?;
    if users.is_empty() {
        println!("No display users yet");
    } else {
        print!("{}", user_table(&users));
    }
    Ok(())
}

pub async fn create(console: &Console, username: &str, password: &str) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let username = admin::create_user(&client, username, password).await?;
    println!("User \"{}\" created successfully!", username);
    Ok(())
}

pub async fn delete(console: &Console, username: &str) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let deletion = admin::delete_user(&client, username).await?;
    println!(
        "User \"{}\" deleted ({} stored video(s) removed)",
        deletion.username, deletion.removed_objects
    );
    Ok(())
}
