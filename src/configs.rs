//! Flat key/value configuration for the crypto core.
//!
//! Configuration is a map of dotted keys to string values, loaded from a TOML
//! file (nested tables flatten into dotted keys) on top of a built-in
//! defaults table. Scheme-scoped keys live under `crypto.scheme.<name>.*`;
//! the old single-CA deployment keys live under `ca.*` and are only consulted
//! by the legacy fallbacks.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;

/// Well-known configuration keys.
pub mod keys {
    /// Comma-delimited list of scheme names, in negotiation priority order.
    pub const CRYPTO_SCHEMES: &str = "crypto.schemes";
    /// Name of the default scheme; absent means `legacy`.
    pub const CRYPTO_DEFAULT_SCHEME: &str = "crypto.default_scheme";
    /// Directory of upstream trusted certificates, one per file.
    pub const CRYPTO_UPSTREAM_CERT_REPO: &str = "crypto.upstream_cert_repo";

    /// Prefix under which per-scheme keys are nested.
    pub const SCHEME_PREFIX: &str = "crypto.scheme";
    pub const SCHEME_CERT: &str = "cert";
    pub const SCHEME_KEY: &str = "key";
    pub const SCHEME_KEY_PASSWORD: &str = "key.password";
    pub const SCHEME_SIGNATURE_ALGORITHM: &str = "signature_algorithm";
    pub const SCHEME_KEY_ALGORITHM: &str = "key_algorithm";
    pub const SCHEME_KEY_SIZE: &str = "key_size";

    // Pre-scheme deployment keys. New configurations should not set these;
    // they remain readable so upgraded installations keep working unchanged.
    pub const CA_CERT: &str = "ca.cert";
    pub const CA_KEY: &str = "ca.key";
    pub const CA_KEY_PASSWORD: &str = "ca.key_password";
    pub const CA_UPSTREAM_CERT_DIR: &str = "ca.upstream_cert_dir";

    /// Builds the fully-qualified config key for a scheme-scoped setting,
    /// e.g. `scheme_key("modern", SCHEME_CERT)` -> `crypto.scheme.modern.cert`.
    pub fn scheme_key(scheme: &str, suffix: &str) -> String {
        format!("{SCHEME_PREFIX}.{scheme}.{suffix}")
    }
}

/// Default values shipped with the service.
const DEFAULTS: &[(&str, &str)] = &[
    (keys::CA_CERT, "/etc/sconce/certs/sconce-ca.crt"),
    (keys::CA_KEY, "/etc/sconce/certs/sconce-ca.key"),
    (keys::CRYPTO_UPSTREAM_CERT_REPO, "/etc/sconce/certs/upstream"),
];

/// Key/value configuration with typed accessors.
///
/// Values are immutable to readers; `set`/`clear` exist so tests and embedding
/// applications can assemble configurations programmatically.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// An empty configuration with no defaults applied.
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration holding only the built-in defaults.
    pub fn with_defaults() -> Self {
        let mut config = Self::new();
        for (key, value) in DEFAULTS {
            config.set(*key, *value);
        }
        config
    }

    /// Builds a configuration from explicit entries, without defaults.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut config = Self::new();
        for (key, value) in entries {
            config.set(key, value);
        }
        config
    }

    /// Loads a TOML configuration file on top of the built-in defaults.
    ///
    /// Nested tables flatten into dotted keys, so
    ///
    /// ```toml
    /// [crypto.scheme.modern]
    /// cert = "/etc/sconce/certs/modern.crt"
    /// ```
    ///
    /// is readable as `crypto.scheme.modern.cert`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table: toml::Table = text.parse().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::with_defaults();
        flatten_table("", &table, &mut config.values)?;
        Ok(config)
    }

    /// Sets a value, replacing any existing one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes a value entirely.
    pub fn clear(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Fetches a string value, or `None` if the key is unset.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fetches a string value, failing if the key is unset.
    pub fn require_string(&self, key: &str) -> Result<&str, ConfigError> {
        self.get_string(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Fetches an unsigned integer value, failing if the value is present but
    /// not parseable.
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.get_string(key) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }
}

fn flatten_table(
    prefix: &str,
    table: &toml::Table,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        match value {
            toml::Value::Table(nested) => flatten_table(&key, nested, out)?,
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Integer(i) => {
                out.insert(key, i.to_string());
            }
            toml::Value::Float(f) => {
                out.insert(key, f.to_string());
            }
            toml::Value::Boolean(b) => {
                out.insert(key, b.to_string());
            }
            toml::Value::Datetime(dt) => {
                out.insert(key, dt.to_string());
            }
            toml::Value::Array(_) => {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_get_and_require() {
        let config = Config::from_entries([("crypto.schemes", "legacy,modern")]);

        assert_eq!(config.get_string(keys::CRYPTO_SCHEMES), Some("legacy,modern"));
        assert_eq!(config.get_string("crypto.default_scheme"), None);
        assert!(config.require_string("crypto.default_scheme").is_err());
    }

    #[test]
    fn test_get_u32() {
        let config = Config::from_entries([
            ("crypto.scheme.a.key_size", "4096"),
            ("crypto.scheme.b.key_size", "not-a-number"),
        ]);

        assert_eq!(config.get_u32("crypto.scheme.a.key_size").unwrap(), Some(4096));
        assert_eq!(config.get_u32("crypto.scheme.c.key_size").unwrap(), None);
        assert!(config.get_u32("crypto.scheme.b.key_size").is_err());
    }

    #[test]
    fn test_defaults_present() {
        let config = Config::with_defaults();

        assert_eq!(
            config.get_string(keys::CA_CERT),
            Some("/etc/sconce/certs/sconce-ca.crt")
        );
        assert_eq!(
            config.get_string(keys::CRYPTO_UPSTREAM_CERT_REPO),
            Some("/etc/sconce/certs/upstream")
        );
    }

    #[test]
    fn test_from_file_flattens_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[crypto]
schemes = "legacy, modern"

[crypto.scheme.modern]
cert = "/tmp/modern.crt"
key_size = 4096

[crypto.scheme.modern.key]
password = "hunter2"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.get_string("crypto.schemes"), Some("legacy, modern"));
        assert_eq!(
            config.get_string("crypto.scheme.modern.cert"),
            Some("/tmp/modern.crt")
        );
        assert_eq!(
            config.get_string("crypto.scheme.modern.key.password"),
            Some("hunter2")
        );
        assert_eq!(
            config.get_u32("crypto.scheme.modern.key_size").unwrap(),
            Some(4096)
        );
        // defaults survive underneath the file contents
        assert_eq!(
            config.get_string(keys::CA_KEY),
            Some("/etc/sconce/certs/sconce-ca.key")
        );
    }

    #[test]
    fn test_scheme_key_builder() {
        assert_eq!(
            keys::scheme_key("modern", keys::SCHEME_CERT),
            "crypto.scheme.modern.cert"
        );
    }
}
