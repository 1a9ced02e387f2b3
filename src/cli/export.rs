use std::path::PathBuf;

use crate::error::ConsoleError;
use crate::export::{export_history, ExportRequest};

use super::Console;

pub async fn run(console: &Console, request: ExportRequest, out: Option<PathBuf>) -> Result<(), ConsoleError> {
    // Validate the range before touching credentials or the network.
    request.query()?;
    let client = console.client()?;
    let dir = out.unwrap_or_else(|| console.config.export_dir());
    let outcome = export_history(&client, &request, &dir).await?;
    println!(
        "Exported {} records successfully to {}",
        outcome.records,
        outcome.path.display()
    );
    Ok(())
}
