//! Cryptographically secure random byte generation
//!
//! All PKCE material in this crate is derived from bytes produced here.  The
//! generator reads the operating system's secure entropy source directly
//! rather than a seeded userspace PRNG, and surfaces a read failure as a
//! distinct [`TrackvaultError::EntropyUnavailable`] error instead of
//! panicking.

use rand::TryRngCore as _;

use crate::error::{Result, TrackvaultError};

/// Fills a freshly allocated buffer with `n` cryptographically secure random
/// bytes from the OS entropy source.
///
/// # Errors
///
/// Returns [`TrackvaultError::EntropyUnavailable`] when the underlying secure
/// source cannot be read.  This does not happen on supported platforms under
/// normal operation, but the failure mode is preserved so callers can report
/// it rather than proceed with predictable material.
///
/// # Examples
///
/// ```
/// use trackvault::auth::entropy::secure_random_bytes;
///
/// let bytes = secure_random_bytes(32).expect("OS entropy must be readable");
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn secure_random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; n];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TrackvaultError::EntropyUnavailable(e.to_string()))?;
    Ok(bytes)
}
