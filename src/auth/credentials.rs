//! Self-signed credential material for local TLS readiness
//!
//! Loads a persisted private key/certificate pair from the application data
//! directory, generating and persisting a fresh self-signed pair on first run
//! (or after the files have been removed).  The loopback redirect listener
//! currently binds plain HTTP, so this material is held for local TLS
//! readiness rather than consumed by the listener; see DESIGN.md.
//!
//! Persistence failures are deliberately non-fatal: the in-memory material is
//! still returned and a warning is emitted, and the next run regenerates.

use std::fs;
use std::path::{Path, PathBuf};

use rcgen::{CertificateParams, DnType, KeyPair, PKCS_ECDSA_P384_SHA384};
use tracing::{debug, warn};

use crate::error::{Result, TrackvaultError};

/// File name of the persisted private key under the app data directory.
const KEY_FILE: &str = "generated_key.pem";

/// File name of the persisted self-signed certificate.
const CERT_FILE: &str = "generated_certificate.pem";

// ---------------------------------------------------------------------------
// CredentialMaterial
// ---------------------------------------------------------------------------

/// A matched private key / self-signed certificate pair.
///
/// Exclusively owned by [`CredentialStore`] callers; loaded once at startup
/// and reused across process runs until the persisted files are removed.
#[derive(Debug)]
pub struct CredentialMaterial {
    /// The private key backing the certificate.
    pub key_pair: KeyPair,

    /// PEM encoding of the self-signed certificate.  `None` when the key was
    /// loaded from disk but the certificate file was absent; loading the
    /// certificate is not required for the store to succeed.
    pub certificate_pem: Option<String>,

    /// The identity the certificate is issued to (and by, being self-signed).
    pub issuer: String,
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// Loads or generates the persisted key/certificate pair.
///
/// # Examples
///
/// ```no_run
/// use trackvault::auth::credentials::CredentialStore;
///
/// # fn example() -> trackvault::error::Result<()> {
/// let (key_path, cert_path) = CredentialStore::default_paths()?;
/// let material = CredentialStore::ensure(&key_path, &cert_path, "Trackvault")?;
/// assert_eq!(material.issuer, "Trackvault");
/// # Ok(())
/// # }
/// ```
pub struct CredentialStore;

impl CredentialStore {
    /// Returns the default key and certificate paths under the OS
    /// application-data directory.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::CredentialPersistence`] when no home
    /// directory can be determined for the current user.
    pub fn default_paths() -> Result<(PathBuf, PathBuf)> {
        let dirs = directories::ProjectDirs::from("com", "trackvault", "trackvault")
            .ok_or_else(|| {
                TrackvaultError::CredentialPersistence(
                    "could not determine application data directory".to_string(),
                )
            })?;
        let data_dir = dirs.data_dir();
        Ok((data_dir.join(KEY_FILE), data_dir.join(CERT_FILE)))
    }

    /// Loads the key at `key_path`, or generates and persists a new
    /// self-signed pair bound to `issuer`.
    ///
    /// Success requires only that the key loads; the certificate file is read
    /// best-effort.  Calling twice without deleting the persisted files does
    /// not regenerate.  A failure to persist the freshly generated pair is
    /// surfaced as a warning and the in-memory material is returned anyway.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::CredentialPersistence`] only when key or
    /// certificate *generation* fails; persistence failures never error.
    pub fn ensure(key_path: &Path, cert_path: &Path, issuer: &str) -> Result<CredentialMaterial> {
        if let Ok(pem) = fs::read_to_string(key_path) {
            if let Ok(key_pair) = KeyPair::from_pem(&pem) {
                debug!(path = %key_path.display(), "loaded existing private key");
                let certificate_pem = fs::read_to_string(cert_path).ok();
                return Ok(CredentialMaterial {
                    key_pair,
                    certificate_pem,
                    issuer: issuer.to_string(),
                });
            }
        }

        warn!(
            path = %key_path.display(),
            "could not load private key, generating a new self-signed pair"
        );

        // ECDSA P-384 keys; rcgen cannot generate RSA.
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).map_err(|e| {
            TrackvaultError::CredentialPersistence(format!("key generation failed: {e}"))
        })?;

        let mut params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .map_err(|e| {
                    TrackvaultError::CredentialPersistence(format!(
                        "certificate parameters invalid: {e}"
                    ))
                })?;
        params.distinguished_name.push(DnType::CommonName, issuer);

        let certificate = params.self_signed(&key_pair).map_err(|e| {
            TrackvaultError::CredentialPersistence(format!(
                "self-signed certificate generation failed: {e}"
            ))
        })?;
        let certificate_pem = certificate.pem();

        if let Err(e) = Self::persist(key_path, cert_path, &key_pair, &certificate_pem) {
            warn!(error = %e, "could not persist credentials, continuing in-memory");
        }

        Ok(CredentialMaterial {
            key_pair,
            certificate_pem: Some(certificate_pem),
            issuer: issuer.to_string(),
        })
    }

    /// Writes the key and certificate PEM files, creating parent directories
    /// as needed.
    fn persist(
        key_path: &Path,
        cert_path: &Path,
        key_pair: &KeyPair,
        certificate_pem: &str,
    ) -> Result<()> {
        if let Some(parent) = key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = cert_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(key_path, key_pair.serialize_pem())?;
        fs::write(cert_path, certificate_pem)?;
        debug!(
            key = %key_path.display(),
            cert = %cert_path.display(),
            "persisted self-signed credential pair"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_in(dir: &TempDir) -> (PathBuf, PathBuf) {
        (
            dir.path().join("key.pem"),
            dir.path().join("certificate.pem"),
        )
    }

    #[test]
    fn test_first_call_generates_and_persists_pair() {
        let dir = TempDir::new().expect("tempdir");
        let (key_path, cert_path) = paths_in(&dir);

        let material =
            CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("ensure");

        assert!(key_path.exists(), "key file must be persisted");
        assert!(cert_path.exists(), "certificate file must be persisted");
        assert_eq!(material.issuer, "TestIssuer");
        assert!(material.certificate_pem.is_some());
    }

    #[test]
    fn test_second_call_does_not_regenerate() {
        let dir = TempDir::new().expect("tempdir");
        let (key_path, cert_path) = paths_in(&dir);

        CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("first ensure");
        let key_before = fs::read(&key_path).expect("read key");
        let cert_before = fs::read(&cert_path).expect("read cert");

        CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("second ensure");
        let key_after = fs::read(&key_path).expect("re-read key");
        let cert_after = fs::read(&cert_path).expect("re-read cert");

        assert_eq!(key_before, key_after, "key bytes must be unchanged");
        assert_eq!(cert_before, cert_after, "certificate bytes must be unchanged");
    }

    #[test]
    fn test_load_succeeds_without_certificate_file() {
        let dir = TempDir::new().expect("tempdir");
        let (key_path, cert_path) = paths_in(&dir);

        CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("generate");
        fs::remove_file(&cert_path).expect("remove certificate");

        // The load-key-only check must still succeed, with no certificate.
        let material =
            CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("reload");
        assert!(material.certificate_pem.is_none());
        assert!(
            !cert_path.exists(),
            "a successful key load must not regenerate the certificate"
        );
    }

    #[test]
    fn test_corrupt_key_file_triggers_regeneration() {
        let dir = TempDir::new().expect("tempdir");
        let (key_path, cert_path) = paths_in(&dir);

        fs::write(&key_path, b"not a pem key").expect("write garbage");
        let material =
            CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("ensure");

        assert!(material.certificate_pem.is_some());
        let persisted = fs::read_to_string(&key_path).expect("read key");
        assert!(
            persisted.contains("PRIVATE KEY"),
            "corrupt key must be replaced with a fresh PEM key"
        );
    }

    #[test]
    fn test_generated_key_is_ecdsa_p384() {
        let dir = TempDir::new().expect("tempdir");
        let (key_path, cert_path) = paths_in(&dir);

        let material =
            CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("ensure");
        assert!(
            material.key_pair.is_compatible(&PKCS_ECDSA_P384_SHA384),
            "generated keys must be ECDSA P-384"
        );

        // The persisted key must round-trip with the same algorithm.
        let reloaded =
            CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("reload");
        assert!(reloaded.key_pair.is_compatible(&PKCS_ECDSA_P384_SHA384));
    }

    #[test]
    fn test_certificate_pem_is_well_formed() {
        let dir = TempDir::new().expect("tempdir");
        let (key_path, cert_path) = paths_in(&dir);

        let material =
            CredentialStore::ensure(&key_path, &cert_path, "TestIssuer").expect("ensure");
        let pem = material.certificate_pem.expect("certificate present");
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(pem.trim_end().ends_with("-----END CERTIFICATE-----"));
    }
}
