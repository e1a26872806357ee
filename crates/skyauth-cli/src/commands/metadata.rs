//! Client metadata command.

use anyhow::Result;
use console::style;
use skyauth::ClientMetadata;

use crate::settings::Settings;

/// Prints the client metadata document as JSON.
pub fn run(settings: &Settings, client_name: Option<String>) -> Result<()> {
    let identity = settings.identity()?;
    let metadata = ClientMetadata::for_identity(&identity, client_name);

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    eprintln!();
    eprintln!(
        "{}",
        style(format!("Serve this document at {}", identity.client_id())).dim()
    );

    Ok(())
}
