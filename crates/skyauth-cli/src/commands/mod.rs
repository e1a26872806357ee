//! Subcommand implementations.

pub mod authorize;
pub mod discover;
pub mod metadata;
pub mod pkce;
pub mod refresh;

use console::style;
use skyauth::TokenPair;

/// Prints a token pair, one field per line.
pub fn print_tokens(tokens: &TokenPair) {
    println!("ACCESS_TOKEN={}", tokens.access_token);
    if let Some(refresh_token) = &tokens.refresh_token {
        println!("REFRESH_TOKEN={refresh_token}");
    }
    if let Some(token_type) = &tokens.token_type {
        println!("TOKEN_TYPE={token_type}");
    }
    if let Some(expires_in) = tokens.expires_in {
        println!("EXPIRES_IN={expires_in}");
    }
    if let Some(scope) = &tokens.scope {
        println!("SCOPE={scope}");
    }
    if let Some(sub) = &tokens.sub {
        println!("SUB={sub}");
    }
    println!();
    println!("{}", style("Treat these values as secrets.").dim());
}
