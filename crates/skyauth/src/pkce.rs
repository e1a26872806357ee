//! PKCE (Proof Key for Code Exchange) generation.
//!
//! Implements the client half of RFC 7636 with the S256 method. A new
//! verifier is generated for every authorization attempt.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{OAuthError, Result};

/// Minimum length for a code verifier.
const MIN_VERIFIER_LENGTH: usize = 43;

/// Maximum length for a code verifier.
const MAX_VERIFIER_LENGTH: usize = 128;

/// Random bytes behind a generated verifier (43 base64url characters).
const VERIFIER_ENTROPY_BYTES: usize = 32;

/// Random bytes behind a generated `state` value.
const STATE_ENTROPY_BYTES: usize = 16;

/// The only challenge method this client sends.
pub const CHALLENGE_METHOD: &str = "S256";

/// A code verifier and the challenge derived from it.
#[derive(Clone)]
pub struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    /// Generates a fresh verifier/challenge pair from the thread CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = random_base64url(VERIFIER_ENTROPY_BYTES);
        let challenge = compute_s256_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Builds a pair from an existing verifier.
    ///
    /// # Errors
    /// Returns an error if the verifier length or charset is invalid.
    pub fn from_verifier(verifier: impl Into<String>) -> Result<Self> {
        let verifier = verifier.into();
        validate_verifier(&verifier)?;
        let challenge = compute_s256_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// The secret verifier, sent only with the token exchange.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The challenge, sent with the pushed authorization request.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// The challenge method (always `S256`).
    #[must_use]
    pub const fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl std::fmt::Debug for Pkce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkce")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Validates a code verifier against RFC 7636 section 4.1.
///
/// # Errors
/// Returns an error if the verifier is too short, too long or contains
/// characters outside `[A-Za-z0-9-._~]`.
pub fn validate_verifier(code_verifier: &str) -> Result<()> {
    if code_verifier.len() < MIN_VERIFIER_LENGTH {
        return Err(OAuthError::Configuration(format!(
            "code verifier too short (min {MIN_VERIFIER_LENGTH})"
        )));
    }

    if code_verifier.len() > MAX_VERIFIER_LENGTH {
        return Err(OAuthError::Configuration(format!(
            "code verifier too long (max {MAX_VERIFIER_LENGTH})"
        )));
    }

    if !code_verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    {
        return Err(OAuthError::Configuration(
            "code verifier contains invalid characters".into(),
        ));
    }

    Ok(())
}

/// Computes the S256 code challenge from a code verifier.
///
/// S256: BASE64URL(SHA256(code_verifier))
#[must_use]
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generates an unguessable `state` value for correlating the callback.
#[must_use]
pub fn generate_state() -> String {
    random_base64url(STATE_ENTROPY_BYTES)
}

fn random_base64url(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            compute_s256_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generate_verifier_shape() {
        let pkce = Pkce::generate();

        assert_eq!(pkce.verifier().len(), 43);
        assert!(validate_verifier(pkce.verifier()).is_ok());
        assert_eq!(pkce.challenge(), compute_s256_challenge(pkce.verifier()));
        assert_eq!(pkce.method(), "S256");
    }

    #[test]
    fn test_generate_is_fresh() {
        let verifiers: HashSet<String> = (0..16)
            .map(|_| Pkce::generate().verifier().to_string())
            .collect();
        assert_eq!(verifiers.len(), 16);
    }

    #[test]
    fn test_from_verifier() {
        let verifier = "test_verifier_that_is_long_enough_for_pkce_requirements";
        let pkce = Pkce::from_verifier(verifier).unwrap();
        assert_eq!(pkce.challenge(), compute_s256_challenge(verifier));
    }

    #[test]
    fn test_verifier_too_short() {
        let result = validate_verifier("tooshort");
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
    }

    #[test]
    fn test_verifier_too_long() {
        let result = validate_verifier(&"a".repeat(129));
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
        assert!(validate_verifier(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn test_verifier_invalid_chars() {
        let result = validate_verifier("valid_prefix_but_has_invalid_chars_@#$%^&*()_1234567890");
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
    }

    #[test]
    fn test_state_is_random() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let pkce = Pkce::generate();
        let debug = format!("{pkce:?}");
        assert!(!debug.contains(pkce.verifier()));
    }
}
