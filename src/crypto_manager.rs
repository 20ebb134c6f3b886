//! Top-level facade over the crypto scheme machinery.
//!
//! A [`CryptoManager`] resolves all configured schemes and the default scheme
//! once, at construction, and hands out per-operation signers, validators,
//! certificate builders, and key pair generators bound to a chosen scheme.
//! Callers never touch the readers directly.
//!
//! Manager state is immutable after construction and safe to share across
//! request-handling threads.

use openssl::x509::{X509Ref, X509};
use tracing::debug;

use crate::certificate_reader::CertificateReader;
use crate::certificate_builder::X509CertificateBuilder;
use crate::configs::Config;
use crate::consumer::{Consumer, CRYPTO_SCHEME_FACT};
use crate::errors::{CertificateError, ConfigError, SignatureError};
use crate::key_pair_generator::KeyPairGenerator;
use crate::private_key_reader::PrivateKeyReader;
use crate::scheme::Scheme;
use crate::scheme_reader::SchemeReader;
use crate::signature_validator::SignatureValidator;
use crate::signer::Signer;

/// Strategy for choosing a scheme for a consumer.
///
/// The matching rule is deployment policy, not crypto machinery, so it is
/// pluggable. Implementations pick from `schemes` (already in priority
/// order) or return `None` when nothing fits.
pub trait SchemeNegotiator: Send + Sync {
    fn negotiate<'a>(&self, consumer: &Consumer, schemes: &'a [Scheme]) -> Option<&'a Scheme>;
}

/// Default negotiation: a consumer naming a scheme through its
/// `crypto.scheme` fact gets that scheme if it is in the configured list
/// (case-insensitively) and nothing otherwise; a consumer with no such fact
/// gets the first scheme, in priority order, whose name it declares as a
/// capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSchemeNegotiator;

impl SchemeNegotiator for DefaultSchemeNegotiator {
    fn negotiate<'a>(&self, consumer: &Consumer, schemes: &'a [Scheme]) -> Option<&'a Scheme> {
        if let Some(requested) = consumer.fact(CRYPTO_SCHEME_FACT) {
            return schemes
                .iter()
                .find(|scheme| scheme.name().eq_ignore_ascii_case(requested));
        }

        schemes
            .iter()
            .find(|scheme| consumer.has_capability(scheme.name()))
    }
}

/// Facade over resolved crypto schemes and CA material.
pub struct CryptoManager {
    schemes: Vec<Scheme>,
    default_scheme: Scheme,
    certificate_reader: CertificateReader,
    negotiator: Box<dyn SchemeNegotiator>,
}

impl CryptoManager {
    /// Resolves all configured state with the default negotiation strategy.
    ///
    /// Fails on any configuration, key, or certificate problem; there is no
    /// degraded mode.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_negotiator(config, Box::new(DefaultSchemeNegotiator))
    }

    /// Resolves all configured state with a custom negotiation strategy.
    pub fn with_negotiator(
        config: &Config,
        negotiator: Box<dyn SchemeNegotiator>,
    ) -> Result<Self, ConfigError> {
        let key_reader = PrivateKeyReader::new();
        let certificate_reader = CertificateReader::new(config, &key_reader)?;

        let scheme_reader = SchemeReader::new(config, &key_reader);
        let resolved = scheme_reader.read_schemes()?;
        let default_scheme = scheme_reader.read_default_scheme()?;

        // The reader preserves duplicates; the facade list is deduplicated,
        // first occurrence winning, so priority order is stable.
        let mut schemes: Vec<Scheme> = Vec::with_capacity(resolved.len());
        for scheme in resolved {
            let duplicate = schemes
                .iter()
                .any(|existing| existing.name().eq_ignore_ascii_case(scheme.name()));

            if duplicate {
                debug!(scheme = scheme.name(), "ignoring duplicate crypto scheme");
            } else {
                schemes.push(scheme);
            }
        }

        Ok(Self {
            schemes,
            default_scheme,
            certificate_reader,
            negotiator,
        })
    }

    /// All configured schemes in priority order. Never empty.
    pub fn crypto_schemes(&self) -> &[Scheme] {
        &self.schemes
    }

    /// Looks up a scheme from the configured list by name,
    /// case-insensitively. The default scheme is only found here if it is
    /// also in the list.
    pub fn crypto_scheme(&self, name: &str) -> Option<&Scheme> {
        self.schemes
            .iter()
            .find(|scheme| scheme.name().eq_ignore_ascii_case(name))
    }

    /// Negotiates a scheme for a consumer; `None` when no configured scheme
    /// fits the consumer's declared facts and capabilities.
    pub fn crypto_scheme_for_consumer(&self, consumer: &Consumer) -> Option<&Scheme> {
        self.negotiator.negotiate(consumer, &self.schemes)
    }

    /// The configured default scheme. It need not appear in the scheme list.
    pub fn default_crypto_scheme(&self) -> &Scheme {
        &self.default_scheme
    }

    /// Upstream trusted certificates loaded at startup.
    pub fn upstream_certificates(&self) -> &[X509] {
        self.certificate_reader.upstream_ca_certs()
    }

    /// Whether `certificate` is trusted: it equals a scheme certificate (the
    /// default scheme included), equals an upstream certificate, or verifies
    /// as directly signed by one of those. This is a single-level signer
    /// check, not full chain validation.
    pub fn is_trusted_certificate(&self, certificate: &X509Ref) -> Result<bool, CertificateError> {
        let candidate_der = certificate.to_der()?;

        for trusted in self.trusted_certificates() {
            if trusted.to_der()? == candidate_der {
                return Ok(true);
            }
        }

        for trusted in self.trusted_certificates() {
            let Ok(public_key) = trusted.public_key() else {
                continue;
            };

            if certificate.verify(&public_key).unwrap_or(false) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Creates a signer bound to `scheme`. The scheme must carry a private
    /// key.
    pub fn signer(&self, scheme: &Scheme) -> Result<Signer, SignatureError> {
        Signer::for_scheme(scheme)
    }

    /// Creates a signature validator bound to `scheme`. No private key is
    /// required; validation only needs the scheme certificate.
    pub fn signature_validator(&self, scheme: &Scheme) -> SignatureValidator {
        SignatureValidator::for_scheme(scheme)
    }

    /// Creates a certificate builder issuing under `scheme`. The scheme must
    /// carry a private key.
    pub fn certificate_builder(
        &self,
        scheme: &Scheme,
    ) -> Result<X509CertificateBuilder, CertificateError> {
        if !scheme.has_private_key() {
            return Err(CertificateError::SchemeWithoutKey(scheme.name().to_string()));
        }

        Ok(X509CertificateBuilder::for_scheme(scheme))
    }

    /// Creates a key pair generator for `scheme`'s key algorithm and size.
    /// No private key is required.
    pub fn key_pair_generator(&self, scheme: &Scheme) -> KeyPairGenerator {
        KeyPairGenerator::for_scheme(scheme)
    }

    fn trusted_certificates(&self) -> impl Iterator<Item = &X509> {
        self.schemes
            .iter()
            .map(Scheme::certificate)
            .chain(std::iter::once(self.default_scheme.certificate()))
            .chain(self.certificate_reader.upstream_ca_certs().iter())
    }
}
