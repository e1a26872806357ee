//! Server discovery command.

use anyhow::Result;
use console::style;

use crate::settings::Settings;

/// Prints the endpoints the client would use.
pub async fn run(settings: &Settings) -> Result<()> {
    let transport = settings.transport()?;
    let endpoints = settings.endpoints(&transport).await?;

    println!("{}", style("Authorization server:").bold().green());
    println!();
    println!("ISSUER={}", endpoints.issuer());
    println!("PAR_ENDPOINT={}", endpoints.par_endpoint());
    println!("AUTHORIZATION_ENDPOINT={}", endpoints.authorization_endpoint());
    println!("TOKEN_ENDPOINT={}", endpoints.token_endpoint());

    Ok(())
}
