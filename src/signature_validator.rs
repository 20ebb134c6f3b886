//! Signature validation bound to a crypto scheme.
//!
//! Validation tries the scheme's own certificate first and then, when
//! supplied, each additional certificate in order. The additional-certificate
//! fallback exists for deployments whose historical data was signed by one of
//! several rotated CA keys; strict single-certificate validation would
//! invalidate those signatures.
//!
//! A signature that matches no candidate is a `false` result, never an error.

use std::fs;
use std::path::Path;

use openssl::pkey::{HasPublic, PKeyRef};
use openssl::x509::X509;

use crate::errors::SignatureError;
use crate::scheme::Scheme;
use crate::signer::digest_for_algorithm;

/// Validates signatures against a scheme's certificate, with an optional
/// legacy multi-certificate fallback.
///
/// Single-use: set the signature with [`for_signature`](Self::for_signature),
/// optionally add fallback certificates, then call
/// [`validate`](Self::validate) or [`validate_file`](Self::validate_file).
pub struct SignatureValidator {
    certificate: X509,
    signature_algorithm: String,
    signature: Option<Vec<u8>>,
    additional_certificates: Vec<X509>,
}

impl SignatureValidator {
    pub(crate) fn for_scheme(scheme: &Scheme) -> Self {
        Self {
            certificate: scheme.certificate().clone(),
            signature_algorithm: scheme.signature_algorithm().to_string(),
            signature: None,
            additional_certificates: Vec::new(),
        }
    }

    /// Sets the signature to validate. Required before `validate`.
    pub fn for_signature(mut self, signature: &[u8]) -> Self {
        self.signature = Some(signature.to_vec());
        self
    }

    /// Appends fallback certificates to try after the scheme's own
    /// certificate, in the order supplied.
    #[deprecated(
        note = "legacy fallback for data signed by rotated CA keys; new callers should validate \
                against a single scheme certificate"
    )]
    pub fn with_additional_certificates<I>(mut self, certificates: I) -> Self
    where
        I: IntoIterator<Item = X509>,
    {
        self.additional_certificates.extend(certificates);
        self
    }

    /// Validates the signature over `data`.
    ///
    /// Returns `Ok(true)` on the first candidate certificate whose public key
    /// verifies the signature, `Ok(false)` when every candidate fails. Fails
    /// only when no signature has been set or the scheme's signature
    /// algorithm is unsupported.
    pub fn validate(&self, data: &[u8]) -> Result<bool, SignatureError> {
        let signature = self
            .signature
            .as_deref()
            .ok_or(SignatureError::SignatureNotSet)?;

        let digest = digest_for_algorithm(&self.signature_algorithm)?;

        let candidates =
            std::iter::once(&self.certificate).chain(self.additional_certificates.iter());

        for candidate in candidates {
            let Ok(public_key) = candidate.public_key() else {
                // an unusable candidate is a non-match, not a failure
                continue;
            };

            if verifies(digest, &public_key, data, signature) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Validates the signature over a file's contents.
    pub fn validate_file(&self, path: &Path) -> Result<bool, SignatureError> {
        let data = fs::read(path)?;
        self.validate(&data)
    }
}

fn verifies<T: HasPublic>(
    digest: openssl::hash::MessageDigest,
    key: &PKeyRef<T>,
    data: &[u8],
    signature: &[u8],
) -> bool {
    let attempt = || -> Result<bool, openssl::error::ErrorStack> {
        let mut verifier = openssl::sign::Verifier::new(digest, key)?;
        verifier.update(data)?;
        verifier.verify(signature)
    };

    // provider errors (key type mismatch and the like) count as a non-match
    attempt().unwrap_or(false)
}
