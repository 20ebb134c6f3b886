//! Error types for the crypto scheme management core.
//!
//! Failures are split by concern so callers can tell an operator mistake
//! (configuration) from bad key material, bad certificate material, or a
//! failed signing operation. Signature *mismatches* are not errors anywhere
//! in this crate; validators report them as `false`.

use std::path::PathBuf;

use openssl::error::ErrorStack;
use thiserror::Error;

/// Errors raised while resolving configuration into usable crypto state.
///
/// These are fatal at resolution time: no partially-resolved scheme is ever
/// returned. Key and certificate causes are chained as sources so the
/// offending file can be reported alongside the scheme that referenced it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required configuration: {0}")]
    MissingKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must not be blank")]
    BlankArgument(&'static str),

    #[error("no crypto schemes defined")]
    NoSchemesDefined,

    #[error("malformed crypto schemes declaration: {0}")]
    MalformedSchemeList(String),

    #[error("malformed default crypto scheme declaration: {0}")]
    MalformedDefaultScheme(String),

    #[error("unable to read scheme {scheme}: missing required configuration {key}")]
    IncompleteScheme { scheme: String, key: String },

    #[error("invalid scheme definition for {scheme}: {detail}")]
    InvalidScheme { scheme: String, detail: String },

    #[error("unable to read private key for {owner} from {path}")]
    UnreadableKey {
        owner: String,
        path: PathBuf,
        #[source]
        source: KeyError,
    },

    #[error("unable to read certificate for {owner} from {path}")]
    UnreadableCert {
        owner: String,
        path: PathBuf,
        #[source]
        source: CertificateError,
    },
}

/// Errors raised while reading, decrypting, or generating private keys.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unable to read key material")]
    Io(#[from] std::io::Error),

    #[error("no PEM begin marker found in key material")]
    MissingBeginMarker,

    #[error("missing PEM end marker for block type \"{0}\"")]
    MissingEndMarker(String),

    #[error("duplicate PEM header: {0}")]
    DuplicateHeader(String),

    #[error("malformed PEM header: {0}")]
    MalformedHeader(String),

    #[error("unrecognized private key type: \"{0}\"")]
    UnknownKeyType(String),

    #[error("private key is encrypted but no passphrase was provided")]
    MissingPassphrase,

    #[error("unsupported PEM encryption cipher: {0}")]
    UnsupportedCipher(String),

    #[error("unable to decrypt private key")]
    Decrypt(#[source] ErrorStack),

    #[error("unable to parse private key")]
    Malformed(#[source] ErrorStack),

    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("key size is required to generate {0} keys")]
    MissingKeySize(String),

    #[error("key generation failed")]
    Generation(#[source] ErrorStack),
}

/// Errors raised while loading, parsing, or constructing certificates.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("unable to read certificate from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse certificate from {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },

    #[error("unable to list upstream certificate directory {path}")]
    UnlistableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("distinguished name requires a common name or an organization name")]
    EmptyDistinguishedName,

    #[error("certificate builder is missing a {0}")]
    MissingBuilderField(&'static str),

    #[error("scheme {0} has no private key")]
    SchemeWithoutKey(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("certificate operation failed")]
    Provider(#[from] ErrorStack),
}

/// Errors raised while producing or validating signatures.
///
/// A signature that simply does not match is never an error; validators
/// return `Ok(false)` so callers can distinguish "invalid signature" from
/// "broken system".
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("scheme {0} has no private key")]
    SchemeWithoutKey(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("no signature set; call for_signature before validate")]
    SignatureNotSet,

    #[error("unable to read data to sign or validate")]
    Io(#[from] std::io::Error),

    #[error("signing operation failed")]
    Provider(#[from] ErrorStack),
}
