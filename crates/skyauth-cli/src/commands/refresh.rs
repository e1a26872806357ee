//! Token refresh command.

use anyhow::{Context, Result};
use console::style;
use skyauth::{OAuthError, TokenClient};

use crate::settings::Settings;

/// Redeems a refresh token, retrying once on failure.
pub async fn run(settings: &Settings, refresh_token: &str, fail_status: u16) -> Result<()> {
    let identity = settings.identity()?;
    let transport = settings.transport()?;
    let endpoints = settings.endpoints(&transport).await?;

    let client = TokenClient::new(transport, endpoints, identity);
    let outcome = client.refresh(refresh_token, fail_status).await;

    if outcome.retried {
        println!("{}", style("First attempt failed, retried once.").dim());
    }

    match outcome.result {
        Ok(tokens) => {
            println!("{}", style("Tokens refreshed:").bold().green());
            println!();
            super::print_tokens(&tokens.merge_refresh(refresh_token));
            Ok(())
        }
        Err(e) if refresh_token_rejected(&e) => {
            println!(
                "{}",
                style("The refresh token was rejected. Run `skyauth authorize` again.").yellow()
            );
            Err(e).context("refresh failed")
        }
        Err(e) => Err(e).context("refresh failed"),
    }
}

/// The server turned the refresh grant down, as opposed to answering with
/// an unusable token response.
const fn refresh_token_rejected(err: &OAuthError) -> bool {
    matches!(err, OAuthError::AuthenticationFailure)
}
