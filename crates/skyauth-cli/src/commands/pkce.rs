//! PKCE generation command.

use anyhow::Result;
use console::style;
use skyauth::Pkce;

/// Generates a fresh verifier and its challenge.
#[allow(clippy::unnecessary_wraps)]
pub fn run() -> Result<()> {
    let pkce = Pkce::generate();

    println!("{}", style("Generated PKCE pair:").bold().green());
    println!();
    println!("CODE_VERIFIER={}", pkce.verifier());
    println!("CODE_CHALLENGE={}", pkce.challenge());
    println!("CODE_CHALLENGE_METHOD={}", pkce.method());

    Ok(())
}
