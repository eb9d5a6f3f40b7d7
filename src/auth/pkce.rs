//! PKCE S256 verifier and challenge generation
//!
//! This module implements the Proof Key for Code Exchange (PKCE) extension
//! to OAuth 2.0 as defined in RFC 7636, using the `S256` challenge method.
//!
//! # How PKCE works
//!
//! 1. The client generates a high-entropy random string called the
//!    `code_verifier`.
//! 2. The client computes a SHA-256 hash of the verifier and base64url-encodes
//!    it to produce the `code_challenge`.
//! 3. The authorization request includes `code_challenge` and
//!    `code_challenge_method=S256`.
//! 4. The token exchange request includes the original `code_verifier`.
//! 5. The authorization server recomputes the challenge and compares it to
//!    the value sent in step 3, proving possession of the verifier.
//!
//! The verifier is built from the 62-character alphanumeric alphabet, one
//! character per random byte (`byte % 62`), which keeps every character
//! inside the RFC 7636 unreserved set.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::auth::entropy::secure_random_bytes;
use crate::error::{Result, TrackvaultError};

/// The 62-character alphanumeric alphabet used for verifier characters.
const VERIFIER_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Minimum verifier length permitted by RFC 7636 section 4.1.
pub const MIN_VERIFIER_LENGTH: usize = 43;

/// Maximum verifier length permitted by RFC 7636 section 4.1.
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// Verifier length used by the authorization flow.  The maximum allowed
/// length, for maximum entropy.
pub const DEFAULT_VERIFIER_LENGTH: usize = 128;

// ---------------------------------------------------------------------------
// PkcePair
// ---------------------------------------------------------------------------

/// A PKCE S256 pair consisting of a verifier and its derived challenge.
///
/// Created once per authorization attempt by [`PkcePair::generate`], held for
/// the lifetime of that attempt, and discarded after the token exchange.
/// The invariant `challenge == derive_challenge(&verifier)` holds by
/// construction and the pair is never mutated.
///
/// # Examples
///
/// ```
/// use trackvault::auth::pkce::{PkcePair, DEFAULT_VERIFIER_LENGTH};
///
/// let pair = PkcePair::generate(DEFAULT_VERIFIER_LENGTH).unwrap();
/// assert_eq!(pair.verifier.len(), 128);
/// assert!(!pair.challenge.contains('='));
/// ```
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// The code verifier: `length` characters drawn from the 62-character
    /// alphanumeric alphabet.  Sent to the token endpoint in the
    /// `code_verifier` parameter during the authorization code exchange.
    pub verifier: String,

    /// The code challenge: the base64url-encoded (no padding) SHA-256 digest
    /// of the UTF-8 representation of [`Self::verifier`].  Sent to the
    /// authorization endpoint in the `code_challenge` parameter.
    pub challenge: String,
}

impl PkcePair {
    /// Generates a fresh verifier of the requested length together with its
    /// derived challenge.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::Pkce`] when `length` falls outside the
    /// RFC 7636 range of 43 to 128 characters, and
    /// [`TrackvaultError::EntropyUnavailable`] when the OS random source
    /// cannot be read.
    pub fn generate(length: usize) -> Result<Self> {
        let verifier = generate_verifier(length)?;
        let challenge = derive_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Generates a random code verifier of exactly `length` characters.
///
/// Each character is selected by reducing one cryptographically random byte
/// modulo 62 into the alphanumeric alphabet.
///
/// # Errors
///
/// Returns [`TrackvaultError::Pkce`] when `length` is outside `[43, 128]`
/// (RFC 7636 section 4.1), and [`TrackvaultError::EntropyUnavailable`] when
/// the random source fails.
///
/// # Examples
///
/// ```
/// use trackvault::auth::pkce::generate_verifier;
///
/// let verifier = generate_verifier(43).unwrap();
/// assert_eq!(verifier.len(), 43);
/// assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));
///
/// // Out-of-range lengths are rejected.
/// assert!(generate_verifier(42).is_err());
/// ```
pub fn generate_verifier(length: usize) -> Result<String> {
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        return Err(TrackvaultError::Pkce(format!(
            "verifier length {} outside RFC 7636 range [{}, {}]",
            length, MIN_VERIFIER_LENGTH, MAX_VERIFIER_LENGTH
        ))
        .into());
    }

    let random_bytes = secure_random_bytes(length)?;
    let verifier = random_bytes
        .iter()
        .map(|b| VERIFIER_ALPHABET[(*b as usize) % VERIFIER_ALPHABET.len()] as char)
        .collect();

    Ok(verifier)
}

/// Derives the S256 code challenge for a verifier.
///
/// Computes `BASE64URL(SHA256(ASCII(code_verifier)))` without padding, as
/// specified in RFC 7636 section 4.2.  Deterministic with no side effects.
///
/// # Examples
///
/// ```
/// use trackvault::auth::pkce::derive_challenge;
///
/// // RFC 7636 Appendix B test vector.
/// let challenge = derive_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
/// assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
/// ```
pub fn derive_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
