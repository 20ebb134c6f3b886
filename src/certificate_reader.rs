//! CA certificate material loading.
//!
//! All I/O happens once, at construction time: the CA certificate, the CA
//! private key, and every certificate in the upstream trust directory are
//! loaded eagerly and cached for the life of the process. There is no
//! partial or degraded startup; any unreadable or unparseable file is fatal.
//!
//! An upstream directory that simply does not exist is not an error (the
//! deployment has no upstream trust sources); a directory that exists but
//! cannot be listed is.

use std::fs;
use std::path::{Path, PathBuf};

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tracing::{debug, info};

use crate::configs::{keys, Config};
use crate::errors::{CertificateError, ConfigError};
use crate::private_key_reader::PrivateKeyReader;

/// Final fallback for the upstream certificate directory.
const DEFAULT_UPSTREAM_CERT_DIR: &str = "/etc/sconce/certs/upstream";

/// Loaded CA material: the CA's own certificate and key, plus the set of
/// upstream trusted certificates.
#[derive(Debug)]
pub struct CertificateReader {
    ca_cert: X509,
    ca_key: PKey<Private>,
    upstream_certs: Vec<X509>,
}

impl CertificateReader {
    /// Loads CA material from the paths named in `config`.
    ///
    /// `ca.cert` and `ca.key` must be set; `ca.key_password` is honored when
    /// present. The upstream directory resolves through
    /// `crypto.upstream_cert_repo`, then `ca.upstream_cert_dir`, then the
    /// built-in default path.
    pub fn new(config: &Config, key_reader: &PrivateKeyReader) -> Result<Self, ConfigError> {
        let ca_cert_path = PathBuf::from(config.require_string(keys::CA_CERT)?);
        let ca_key_path = PathBuf::from(config.require_string(keys::CA_KEY)?);
        let ca_key_password = config.get_string(keys::CA_KEY_PASSWORD);

        let ca_cert = Self::read_certificate(&ca_cert_path).map_err(|source| {
            ConfigError::UnreadableCert {
                owner: "CA".to_string(),
                path: ca_cert_path.clone(),
                source,
            }
        })?;

        let ca_key = key_reader
            .read_file(&ca_key_path, ca_key_password)
            .map_err(|source| ConfigError::UnreadableKey {
                owner: "CA".to_string(),
                path: ca_key_path.clone(),
                source,
            })?;

        let upstream_dir = config
            .get_string(keys::CRYPTO_UPSTREAM_CERT_REPO)
            .or_else(|| config.get_string(keys::CA_UPSTREAM_CERT_DIR))
            .unwrap_or(DEFAULT_UPSTREAM_CERT_DIR);

        let upstream_certs =
            Self::read_upstream_certificates(Path::new(upstream_dir)).map_err(|source| {
                ConfigError::UnreadableCert {
                    owner: "upstream certificate repository".to_string(),
                    path: PathBuf::from(upstream_dir),
                    source,
                }
            })?;

        Ok(Self {
            ca_cert,
            ca_key,
            upstream_certs,
        })
    }

    /// The CA's own certificate.
    pub fn ca_cert(&self) -> &X509 {
        &self.ca_cert
    }

    /// The CA's private key.
    pub fn ca_key(&self) -> &PKey<Private> {
        &self.ca_key
    }

    /// Upstream trusted certificates, deduplicated. Empty when the upstream
    /// directory does not exist.
    pub fn upstream_ca_certs(&self) -> &[X509] {
        &self.upstream_certs
    }

    /// Parses a single PEM certificate file.
    pub fn read_certificate(path: &Path) -> Result<X509, CertificateError> {
        let pem = fs::read(path).map_err(|source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        X509::from_pem(&pem).map_err(|source| CertificateError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads every regular file in `dir` as an X.509 certificate.
    fn read_upstream_certificates(dir: &Path) -> Result<Vec<X509>, CertificateError> {
        if !dir.exists() {
            debug!(
                directory = %dir.display(),
                "upstream certificate directory does not exist; continuing without upstream certificates"
            );
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir).map_err(|source| CertificateError::UnlistableDirectory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut certs: Vec<X509> = Vec::new();
        let mut seen: Vec<Vec<u8>> = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|source| CertificateError::UnlistableDirectory {
                path: dir.to_path_buf(),
                source,
            })?;

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let cert = Self::read_certificate(&path)?;
            let der = cert.to_der()?;

            // certificate equality collapses duplicates
            if !seen.contains(&der) {
                seen.push(der);
                certs.push(cert);
            }
        }

        info!(
            directory = %dir.display(),
            count = certs.len(),
            "loaded upstream CA certificates"
        );

        Ok(certs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CertificateError, ConfigError};
    use crate::test_util;

    #[test]
    fn test_loads_ca_material() {
        let dir = tempfile::tempdir().unwrap();
        let (ca_key, ca_cert) = test_util::generate_ca("Loader CA");
        let config = test_util::ca_config(dir.path(), &ca_key, &ca_cert);

        let reader = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap();

        assert_eq!(
            reader.ca_cert().to_der().unwrap(),
            ca_cert.to_der().unwrap()
        );
        assert_eq!(
            reader.ca_key().private_key_to_der().unwrap(),
            ca_key.private_key_to_der().unwrap()
        );
    }

    #[test]
    fn test_requires_ca_paths() {
        let config = Config::new();
        let err = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(key) if key == "ca.cert"));
    }

    #[test]
    fn test_missing_upstream_directory_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let (ca_key, ca_cert) = test_util::generate_ca("Loader CA");
        let mut config = test_util::ca_config(dir.path(), &ca_key, &ca_cert);
        config.set(
            keys::CRYPTO_UPSTREAM_CERT_REPO,
            dir.path().join("does-not-exist").to_str().unwrap(),
        );

        let reader = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap();
        assert!(reader.upstream_ca_certs().is_empty());
    }

    #[test]
    fn test_loads_and_dedupes_upstream_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let (ca_key, ca_cert) = test_util::generate_ca("Loader CA");
        let mut config = test_util::ca_config(dir.path(), &ca_key, &ca_cert);

        let upstream_dir = dir.path().join("upstream");
        std::fs::create_dir(&upstream_dir).unwrap();

        let (_, upstream_a) = test_util::generate_ca("Upstream A");
        let (_, upstream_b) = test_util::generate_ca("Upstream B");
        test_util::write_cert(&upstream_dir.join("a.crt"), &upstream_a);
        test_util::write_cert(&upstream_dir.join("b.crt"), &upstream_b);
        // the same certificate under a second name collapses
        test_util::write_cert(&upstream_dir.join("b-copy.crt"), &upstream_b);

        config.set(
            keys::CRYPTO_UPSTREAM_CERT_REPO,
            upstream_dir.to_str().unwrap(),
        );

        let reader = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap();
        assert_eq!(reader.upstream_ca_certs().len(), 2);
    }

    #[test]
    fn test_upstream_falls_back_to_legacy_key() {
        let dir = tempfile::tempdir().unwrap();
        let (ca_key, ca_cert) = test_util::generate_ca("Loader CA");
        let mut config = test_util::ca_config(dir.path(), &ca_key, &ca_cert);

        let upstream_dir = dir.path().join("upstream-legacy");
        std::fs::create_dir(&upstream_dir).unwrap();
        let (_, upstream) = test_util::generate_ca("Upstream Legacy");
        test_util::write_cert(&upstream_dir.join("u.crt"), &upstream);

        config.clear(keys::CRYPTO_UPSTREAM_CERT_REPO);
        config.set(keys::CA_UPSTREAM_CERT_DIR, upstream_dir.to_str().unwrap());

        let reader = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap();
        assert_eq!(reader.upstream_ca_certs().len(), 1);
    }

    #[test]
    fn test_unlistable_upstream_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (ca_key, ca_cert) = test_util::generate_ca("Loader CA");
        let mut config = test_util::ca_config(dir.path(), &ca_key, &ca_cert);

        // point the repo at a regular file: it exists, but cannot be listed
        let bogus = dir.path().join("not-a-directory");
        std::fs::write(&bogus, b"junk").unwrap();
        config.set(keys::CRYPTO_UPSTREAM_CERT_REPO, bogus.to_str().unwrap());

        let err = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnreadableCert {
                source: CertificateError::UnlistableDirectory { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_garbage_upstream_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (ca_key, ca_cert) = test_util::generate_ca("Loader CA");
        let mut config = test_util::ca_config(dir.path(), &ca_key, &ca_cert);

        let upstream_dir = dir.path().join("upstream-bad");
        std::fs::create_dir(&upstream_dir).unwrap();
        std::fs::write(upstream_dir.join("bogus.crt"), b"not a certificate").unwrap();

        config.set(
            keys::CRYPTO_UPSTREAM_CERT_REPO,
            upstream_dir.to_str().unwrap(),
        );

        let err = CertificateReader::new(&config, &PrivateKeyReader::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnreadableCert {
                source: CertificateError::Parse { .. },
                ..
            }
        ));
    }
}
