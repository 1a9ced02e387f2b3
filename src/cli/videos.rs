use std::path::Path;

use crate::admin;
use crate::error::ConsoleError;
use crate::refresh::Region;
use crate::terminal::video_table;

use super::Console;

pub async fn list(console: &Console, user: Option<&str>) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let videos = admin::list_videos(&client, user).await?;
    if videos.is_empty() {
        println!("{}", Region::Videos.empty_placeholder());
    } else {
        print!("{}", video_table(&videos));
    }
    Ok(())
}

pub async fn upload(console: &Console, file: &Path, user: &str) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let uploaded = admin::upload_video(&client, file, user, &console.config.operator).await?;
    println!(
        "Uploaded \"{}\" for {} ({} bytes) as {}",
        uploaded.filename, uploaded.display_user, uploaded.bytes, uploaded.storage_path
    );
    Ok(())
}

pub async fn delete(console: &Console, id: i64) -> Result<(), ConsoleError> {
    let client = console.client()?;
    let video = admin::delete_video(&client, id).await?;
    println!("Deleted video {} (\"{}\")", video.id, video.filename);
    Ok(())
}
