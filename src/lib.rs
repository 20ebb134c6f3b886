//! Sconce crypto core — certificate scheme management and signing for the
//! Sconce entitlement service.
//!
//! This crate owns the service's PKI state: it resolves named *crypto
//! schemes* (certificate + optional private key + signature/key algorithm)
//! from configuration, loads the CA and upstream trust material once at
//! startup, and hands out per-operation signers, signature validators,
//! certificate builders, and key pair generators bound to a chosen scheme.
//!
//! # Architecture
//!
//! ```text
//! Config ──> SchemeReader ──> [Scheme, Scheme, ...] + default Scheme
//!               │  │
//!               │  └── PrivateKeyReader   (PEM: PKCS1/PKCS8/SEC1, encrypted or not)
//!               └───── CertificateReader  (CA cert + key, upstream trust directory)
//!                              │
//!                              v
//!                        CryptoManager ──> Signer / SignatureValidator /
//!                                          X509CertificateBuilder / KeyPairGenerator
//! ```
//!
//! All file I/O happens during [`CryptoManager`] construction; every
//! operation afterwards is in-memory cryptographic computation. The manager
//! and its schemes are immutable and safe to share across request-handling
//! threads. Signers, validators, and builders are cheap single-use objects:
//! create one per operation and keep it on one thread.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sconce::configs::Config;
//! use sconce::crypto_manager::CryptoManager;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file(Path::new("/etc/sconce/sconce.toml"))?;
//!     let manager = CryptoManager::new(&config)?;
//!
//!     let scheme = manager.default_crypto_scheme();
//!     let signature = manager.signer(scheme)?.sign(b"payload")?;
//!
//!     let valid = manager
//!         .signature_validator(scheme)
//!         .for_signature(&signature)
//!         .validate(b"payload")?;
//!     assert!(valid);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [crypto]
//! schemes = "legacy, modern"
//! default_scheme = "legacy"
//! upstream_cert_repo = "/etc/sconce/certs/upstream"
//!
//! [crypto.scheme.modern]
//! cert = "/etc/sconce/certs/modern.crt"
//! key = "/etc/sconce/certs/modern.key"
//! signature_algorithm = "SHA256withRSA"
//! key_algorithm = "RSA"
//! key_size = 4096
//! ```
//!
//! The `legacy` scheme needs no scheme-scoped configuration at all: it falls
//! back to the pre-scheme `ca.*` keys and finally the paths the service has
//! always shipped with, so existing single-CA installations upgrade without
//! config changes.
//!
//! # Error model
//!
//! Configuration, key, and certificate problems are fatal at resolution time
//! and carry the offending scheme, key, or path. A signature that fails to
//! validate is **not** an error: validators return `Ok(false)` so callers in
//! authorization paths can tell "signature invalid" from "system broken".

pub mod certificate_builder;
pub mod certificate_reader;
pub mod configs;
pub mod consumer;
pub mod crypto_manager;
pub mod errors;
pub mod key_pair_generator;
pub mod private_key_reader;
pub mod scheme;
pub mod scheme_reader;
pub mod signature_validator;
pub mod signer;

#[cfg(test)]
mod test_util;

pub use certificate_builder::{X509CertificateBuilder, X509ExtensionSpec};
pub use certificate_reader::CertificateReader;
pub use configs::Config;
pub use consumer::{Consumer, KeyPairData};
pub use crypto_manager::{CryptoManager, DefaultSchemeNegotiator, SchemeNegotiator};
pub use errors::{CertificateError, ConfigError, KeyError, SignatureError};
pub use key_pair_generator::KeyPairGenerator;
pub use private_key_reader::PrivateKeyReader;
pub use scheme::{DistinguishedName, Scheme, SchemeBuilder};
pub use scheme_reader::SchemeReader;
pub use signature_validator::SignatureValidator;
pub use signer::Signer;
