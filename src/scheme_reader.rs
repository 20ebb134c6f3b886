//! Resolution of crypto schemes from configuration.
//!
//! The scheme list (`crypto.schemes`) is an ordered, comma-delimited list of
//! names; order is negotiation priority and is preserved, duplicates
//! included. Each name resolves independently through its scheme-scoped
//! configuration keys, except for the distinguished `legacy` scheme, which
//! falls back through the pre-scheme `ca.*` keys and finally the paths the
//! service has always shipped with. That fallback chain is deliberate
//! compatibility behavior; installations that never heard of schemes keep
//! signing with the same CA they were configured with years ago.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::certificate_reader::CertificateReader;
use crate::configs::{keys, Config};
use crate::errors::ConfigError;
use crate::private_key_reader::PrivateKeyReader;
use crate::scheme::Scheme;

/// Name of the legacy scheme, matched case-insensitively.
pub const LEGACY_SCHEME: &str = "legacy";

/// Paths used by the legacy scheme when neither scoped nor `ca.*`
/// configuration provides them.
pub const LEGACY_DEFAULT_CA_CERT_PATH: &str = "/etc/sconce/certs/sconce-ca.crt";
pub const LEGACY_DEFAULT_CA_KEY_PATH: &str = "/etc/sconce/certs/sconce-ca.key";

pub const LEGACY_DEFAULT_SIGNATURE_ALGORITHM: &str = "SHA256withRSA";
pub const LEGACY_DEFAULT_KEY_ALGORITHM: &str = "RSA";
pub const LEGACY_DEFAULT_KEY_SIZE: u32 = 4096;

static SCHEME_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-_]*(\s*,\s*[A-Za-z0-9][A-Za-z0-9\-_]*)*$").unwrap()
});

static SCHEME_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-_]*$").unwrap());

/// Resolves [`Scheme`] values from configuration.
///
/// Resolution is all-or-nothing per scheme: a missing required key, an
/// unreadable file, or undecryptable key material fails the whole resolution
/// with a configuration error naming the scheme and the offending key or
/// path.
pub struct SchemeReader<'a> {
    config: &'a Config,
    key_reader: &'a PrivateKeyReader,
}

impl<'a> SchemeReader<'a> {
    pub fn new(config: &'a Config, key_reader: &'a PrivateKeyReader) -> Self {
        Self { config, key_reader }
    }

    /// Resolves the configured scheme list, preserving declaration order and
    /// duplicates.
    pub fn read_schemes(&self) -> Result<Vec<Scheme>, ConfigError> {
        let declaration = self
            .config
            .get_string(keys::CRYPTO_SCHEMES)
            .ok_or(ConfigError::NoSchemesDefined)?;

        if !SCHEME_LIST_RE.is_match(declaration) {
            return Err(ConfigError::MalformedSchemeList(declaration.to_string()));
        }

        let schemes = declaration
            .split(',')
            .map(str::trim)
            .map(|name| self.read_named_scheme(name))
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = schemes.len(), "resolved crypto schemes");
        Ok(schemes)
    }

    /// Resolves the default scheme. An absent `crypto.default_scheme` falls
    /// back to `legacy`.
    pub fn read_default_scheme(&self) -> Result<Scheme, ConfigError> {
        let name = self
            .config
            .get_string(keys::CRYPTO_DEFAULT_SCHEME)
            .unwrap_or(LEGACY_SCHEME);

        if !SCHEME_NAME_RE.is_match(name) {
            return Err(ConfigError::MalformedDefaultScheme(name.to_string()));
        }

        self.read_named_scheme(name)
    }

    /// Resolves a single scheme by name through its scheme-scoped keys, or
    /// through the legacy fallback chain for the `legacy` scheme.
    pub fn read_named_scheme(&self, name: &str) -> Result<Scheme, ConfigError> {
        debug!(scheme = name, "resolving crypto scheme");

        if name.eq_ignore_ascii_case(LEGACY_SCHEME) {
            self.read_legacy_scheme()
        } else {
            self.read_scoped_scheme(name)
        }
    }

    /// Resolves a scheme from explicit configuration key names.
    ///
    /// This is the entry point for subsystems that keep scheme configuration
    /// in their own key namespace (token signing, for instance). The password
    /// and key-size keys are optional; everything else is required.
    #[allow(clippy::too_many_arguments)]
    pub fn read_scheme(
        &self,
        name: &str,
        cert_key: &str,
        key_key: &str,
        password_key: Option<&str>,
        signature_algorithm_key: &str,
        key_algorithm_key: &str,
        key_size_key: Option<&str>,
    ) -> Result<Scheme, ConfigError> {
        require_nonblank("scheme name", name)?;
        require_nonblank("certificate configuration key", cert_key)?;
        require_nonblank("private key configuration key", key_key)?;
        require_nonblank("signature algorithm configuration key", signature_algorithm_key)?;
        require_nonblank("key algorithm configuration key", key_algorithm_key)?;

        let cert_path = self.require_scheme_value(name, cert_key)?;
        let key_path = self.require_scheme_value(name, key_key)?;
        let signature_algorithm = self.require_scheme_value(name, signature_algorithm_key)?;
        let key_algorithm = self.require_scheme_value(name, key_algorithm_key)?;

        let password = password_key.and_then(|key| self.config.get_string(key));
        let key_size = match key_size_key {
            Some(key) => self.config.get_u32(key)?,
            None => None,
        };

        self.load_scheme(
            name,
            Path::new(cert_path),
            Path::new(key_path),
            password,
            signature_algorithm,
            key_algorithm,
            key_size,
        )
    }

    fn read_scoped_scheme(&self, name: &str) -> Result<Scheme, ConfigError> {
        self.read_scheme(
            name,
            &keys::scheme_key(name, keys::SCHEME_CERT),
            &keys::scheme_key(name, keys::SCHEME_KEY),
            Some(&keys::scheme_key(name, keys::SCHEME_KEY_PASSWORD)),
            &keys::scheme_key(name, keys::SCHEME_SIGNATURE_ALGORITHM),
            &keys::scheme_key(name, keys::SCHEME_KEY_ALGORITHM),
            Some(&keys::scheme_key(name, keys::SCHEME_KEY_SIZE)),
        )
    }

    fn read_legacy_scheme(&self) -> Result<Scheme, ConfigError> {
        let config = self.config;

        let cert_path = config
            .get_string(&keys::scheme_key(LEGACY_SCHEME, keys::SCHEME_CERT))
            .or_else(|| config.get_string(keys::CA_CERT))
            .unwrap_or(LEGACY_DEFAULT_CA_CERT_PATH);

        let key_path = config
            .get_string(&keys::scheme_key(LEGACY_SCHEME, keys::SCHEME_KEY))
            .or_else(|| config.get_string(keys::CA_KEY))
            .unwrap_or(LEGACY_DEFAULT_CA_KEY_PATH);

        let password = config
            .get_string(&keys::scheme_key(LEGACY_SCHEME, keys::SCHEME_KEY_PASSWORD))
            .or_else(|| config.get_string(keys::CA_KEY_PASSWORD));

        let signature_algorithm = config
            .get_string(&keys::scheme_key(
                LEGACY_SCHEME,
                keys::SCHEME_SIGNATURE_ALGORITHM,
            ))
            .unwrap_or(LEGACY_DEFAULT_SIGNATURE_ALGORITHM);

        let key_algorithm = config
            .get_string(&keys::scheme_key(LEGACY_SCHEME, keys::SCHEME_KEY_ALGORITHM))
            .unwrap_or(LEGACY_DEFAULT_KEY_ALGORITHM);

        // The key size only defaults to 4096 while the key algorithm is still
        // the legacy RSA. An operator overriding the algorithm without naming
        // a key size gets no key size, not a silently wrong one.
        let key_size = match config.get_u32(&keys::scheme_key(LEGACY_SCHEME, keys::SCHEME_KEY_SIZE))? {
            Some(size) => Some(size),
            None if key_algorithm == LEGACY_DEFAULT_KEY_ALGORITHM => {
                Some(LEGACY_DEFAULT_KEY_SIZE)
            }
            None => None,
        };

        self.load_scheme(
            LEGACY_SCHEME,
            Path::new(cert_path),
            Path::new(key_path),
            password,
            signature_algorithm,
            key_algorithm,
            key_size,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn load_scheme(
        &self,
        name: &str,
        cert_path: &Path,
        key_path: &Path,
        password: Option<&str>,
        signature_algorithm: &str,
        key_algorithm: &str,
        key_size: Option<u32>,
    ) -> Result<Scheme, ConfigError> {
        let certificate =
            CertificateReader::read_certificate(cert_path).map_err(|source| {
                ConfigError::UnreadableCert {
                    owner: format!("scheme {name}"),
                    path: cert_path.to_path_buf(),
                    source,
                }
            })?;

        let private_key = self
            .key_reader
            .read_file(key_path, password)
            .map_err(|source| ConfigError::UnreadableKey {
                owner: format!("scheme {name}"),
                path: key_path.to_path_buf(),
                source,
            })?;

        let mut builder = Scheme::builder()
            .name(name)
            .certificate(certificate)
            .private_key(private_key)
            .signature_algorithm(signature_algorithm)
            .key_algorithm(key_algorithm);

        if let Some(size) = key_size {
            builder = builder.key_size(size);
        }

        builder.build()
    }

    fn require_scheme_value(&self, scheme: &str, key: &str) -> Result<&'a str, ConfigError> {
        self.config
            .get_string(key)
            .ok_or_else(|| ConfigError::IncompleteScheme {
                scheme: scheme.to_string(),
                key: key.to_string(),
            })
    }
}

fn require_nonblank(what: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::BlankArgument(what))
    } else {
        Ok(())
    }
}
