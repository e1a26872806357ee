//! Interactive authorization command.

use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use dialoguer::Input;
use skyauth::{Authorizer, ConsentError, ConsentLauncher, ConsentRequest};
use tracing::warn;
use url::Url;

use crate::settings::Settings;

/// Runs the authorization code flow in the terminal.
pub async fn run(settings: &Settings, login_hint: Option<&str>, open_browser: bool) -> Result<()> {
    let identity = settings.identity()?;
    let transport = settings.transport()?;
    let endpoints = settings.endpoints(&transport).await?;

    println!("{}", style("Authorizing").bold().cyan());
    println!("Server: {}", style(endpoints.issuer()).yellow());
    println!();

    let authorizer = Authorizer::new(
        identity,
        endpoints,
        transport,
        TerminalLauncher { open_browser },
    );
    let tokens = authorizer
        .authorize(login_hint)
        .await
        .context("authorization failed")?;

    println!();
    println!("{}", style("Authorization complete:").bold().green());
    println!();
    super::print_tokens(&tokens);

    Ok(())
}

/// Shows the authorization URL and reads the redirect URL back from stdin.
struct TerminalLauncher {
    open_browser: bool,
}

#[async_trait]
impl ConsentLauncher for TerminalLauncher {
    async fn present(&self, request: ConsentRequest) -> Result<Url, ConsentError> {
        println!("Open this URL to approve access:");
        println!();
        println!("  {}", style(&request.authorization_url).underlined());
        println!();

        if self.open_browser {
            if let Err(e) = open::that(request.authorization_url.as_str()) {
                warn!(error = %e, "failed to open browser");
            }
        }

        let answer = tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt("Paste the redirect URL (empty to cancel)")
                .allow_empty(true)
                .interact_text()
        })
        .await
        .map_err(|e| ConsentError::Failed(format!("prompt task failed: {e}")))?
        .map_err(|e| ConsentError::Failed(format!("failed to read redirect URL: {e}")))?;

        parse_redirect(&answer, &request.callback_scheme)
    }
}

fn parse_redirect(answer: &str, callback_scheme: &str) -> Result<Url, ConsentError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ConsentError::Cancelled);
    }

    let url =
        Url::parse(answer).map_err(|e| ConsentError::Failed(format!("invalid redirect URL: {e}")))?;
    if url.scheme() != callback_scheme {
        return Err(ConsentError::Failed(format!(
            "redirect URL must use the {callback_scheme} scheme"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_answer_cancels() {
        assert_eq!(parse_redirect("  ", "app.example"), Err(ConsentError::Cancelled));
    }

    #[test]
    fn test_redirect_parsed() {
        let url = parse_redirect("app.example:/oauth?code=c&state=s\n", "app.example").unwrap();
        assert_eq!(url.query(), Some("code=c&state=s"));
    }

    #[test]
    fn test_wrong_scheme() {
        assert!(matches!(
            parse_redirect("https://evil.example/?code=c", "app.example"),
            Err(ConsentError::Failed(_))
        ));
    }

    #[test]
    fn test_garbage() {
        assert!(matches!(
            parse_redirect("not a url", "app.example"),
            Err(ConsentError::Failed(_))
        ));
    }
}
