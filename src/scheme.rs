//! Crypto scheme and distinguished name value objects.
//!
//! A [`Scheme`] is one named way of doing PKI operations: a certificate, an
//! optional private key, a signature algorithm, a key algorithm, and an
//! optional key size. Schemes are resolved once from configuration and shared
//! read-only for the life of the process.

use std::fmt;

use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Name, X509};

use crate::errors::{CertificateError, ConfigError};

/// A named crypto configuration.
///
/// Schemes without a private key can validate signatures but cannot sign data
/// or issue certificates. Instances are immutable and cheap to clone (the
/// underlying certificate and key handles are reference counted).
#[derive(Clone)]
pub struct Scheme {
    name: String,
    certificate: X509,
    private_key: Option<PKey<Private>>,
    signature_algorithm: String,
    key_algorithm: String,
    key_size: Option<u32>,
}

impl Scheme {
    /// Starts building a scheme.
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn private_key(&self) -> Option<&PKey<Private>> {
        self.private_key.as_ref()
    }

    /// Whether this scheme can sign data and issue certificates.
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Signature algorithm name, e.g. `SHA256withRSA`.
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    /// Key algorithm name, e.g. `RSA`.
    pub fn key_algorithm(&self) -> &str {
        &self.key_algorithm
    }

    /// Key size in bits, when the scheme is expected to generate key pairs.
    pub fn key_size(&self) -> Option<u32> {
        self.key_size
    }
}

impl fmt::Debug for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheme")
            .field("name", &self.name)
            .field("signature_algorithm", &self.signature_algorithm)
            .field("key_algorithm", &self.key_algorithm)
            .field("key_size", &self.key_size)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish_non_exhaustive()
    }
}

impl PartialEq for Scheme {
    fn eq(&self, other: &Self) -> bool {
        let certs_equal = match (self.certificate.to_der(), other.certificate.to_der()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };

        let keys_equal = match (&self.private_key, &other.private_key) {
            (None, None) => true,
            (Some(a), Some(b)) => match (a.private_key_to_der(), b.private_key_to_der()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
            _ => false,
        };

        self.name == other.name
            && self.signature_algorithm == other.signature_algorithm
            && self.key_algorithm == other.key_algorithm
            && self.key_size == other.key_size
            && certs_equal
            && keys_equal
    }
}

/// Builder for [`Scheme`] values.
///
/// `build()` fails if the name, certificate, signature algorithm, or key
/// algorithm are missing or blank.
#[derive(Default)]
pub struct SchemeBuilder {
    name: String,
    certificate: Option<X509>,
    private_key: Option<PKey<Private>>,
    signature_algorithm: String,
    key_algorithm: String,
    key_size: Option<u32>,
}

impl SchemeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn certificate(mut self, certificate: X509) -> Self {
        self.certificate = Some(certificate);
        self
    }

    pub fn private_key(mut self, key: PKey<Private>) -> Self {
        self.private_key = Some(key);
        self
    }

    pub fn signature_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.signature_algorithm = algorithm.into();
        self
    }

    pub fn key_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.key_algorithm = algorithm.into();
        self
    }

    pub fn key_size(mut self, size: u32) -> Self {
        self.key_size = Some(size);
        self
    }

    pub fn build(self) -> Result<Scheme, ConfigError> {
        let invalid = |detail: &str| ConfigError::InvalidScheme {
            scheme: self.name.clone(),
            detail: detail.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("scheme name must not be blank"));
        }
        if self.signature_algorithm.trim().is_empty() {
            return Err(invalid("signature algorithm must not be blank"));
        }
        if self.key_algorithm.trim().is_empty() {
            return Err(invalid("key algorithm must not be blank"));
        }

        let certificate = self
            .certificate
            .ok_or_else(|| invalid("certificate must be present"))?;

        Ok(Scheme {
            name: self.name,
            certificate,
            private_key: self.private_key,
            signature_algorithm: self.signature_algorithm,
            key_algorithm: self.key_algorithm,
            key_size: self.key_size,
        })
    }
}

/// A subject distinguished name with a common name and/or organization name.
///
/// At least one component must be present; blank components are treated as
/// absent. Serializes as `CN=<common name>, O=<organization name>`, omitting
/// absent parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    common_name: Option<String>,
    organization_name: Option<String>,
}

impl DistinguishedName {
    pub fn new(
        common_name: Option<&str>,
        organization_name: Option<&str>,
    ) -> Result<Self, CertificateError> {
        let common_name = common_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        let organization_name = organization_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        if common_name.is_none() && organization_name.is_none() {
            return Err(CertificateError::EmptyDistinguishedName);
        }

        Ok(Self {
            common_name,
            organization_name,
        })
    }

    /// Builds a DN holding only a common name.
    pub fn common_name(name: &str) -> Result<Self, CertificateError> {
        Self::new(Some(name), None)
    }

    pub fn common_name_value(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn organization_name_value(&self) -> Option<&str> {
        self.organization_name.as_deref()
    }

    /// The string form, e.g. `CN=consumer-1234, O=Example Corp`.
    pub fn value(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(cn) = &self.common_name {
            parts.push(format!("CN={cn}"));
        }
        if let Some(o) = &self.organization_name {
            parts.push(format!("O={o}"));
        }
        parts.join(", ")
    }

    /// Converts to an X.501 name for certificate construction.
    pub(crate) fn to_x509_name(&self) -> Result<X509Name, openssl::error::ErrorStack> {
        let mut builder = X509Name::builder()?;
        if let Some(cn) = &self.common_name {
            builder.append_entry_by_nid(openssl::nid::Nid::COMMONNAME, cn)?;
        }
        if let Some(o) = &self.organization_name {
            builder.append_entry_by_nid(openssl::nid::Nid::ORGANIZATIONNAME, o)?;
        }
        Ok(builder.build())
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    #[test]
    fn test_builder_produces_scheme() {
        let (key, cert) = test_util::generate_ca("Test CA");

        let scheme = Scheme::builder()
            .name("modern")
            .certificate(cert)
            .private_key(key)
            .signature_algorithm("SHA256withRSA")
            .key_algorithm("RSA")
            .key_size(4096)
            .build()
            .unwrap();

        assert_eq!(scheme.name(), "modern");
        assert!(scheme.has_private_key());
        assert_eq!(scheme.key_size(), Some(4096));
    }

    #[test]
    fn test_builder_allows_keyless_scheme() {
        let (_, cert) = test_util::generate_ca("Test CA");

        let scheme = Scheme::builder()
            .name("verify-only")
            .certificate(cert)
            .signature_algorithm("SHA256withRSA")
            .key_algorithm("RSA")
            .build()
            .unwrap();

        assert!(!scheme.has_private_key());
        assert_eq!(scheme.key_size(), None);
    }

    #[test]
    fn test_builder_rejects_blank_fields() {
        let (key, cert) = test_util::generate_ca("Test CA");

        let blank_name = Scheme::builder()
            .name("   ")
            .certificate(cert.clone())
            .signature_algorithm("SHA256withRSA")
            .key_algorithm("RSA")
            .build();
        assert!(blank_name.is_err());

        let no_cert = Scheme::builder()
            .name("modern")
            .private_key(key)
            .signature_algorithm("SHA256withRSA")
            .key_algorithm("RSA")
            .build();
        assert!(no_cert.is_err());

        let blank_sig = Scheme::builder()
            .name("modern")
            .certificate(cert.clone())
            .signature_algorithm("")
            .key_algorithm("RSA")
            .build();
        assert!(blank_sig.is_err());

        let blank_key_algo = Scheme::builder()
            .name("modern")
            .certificate(cert)
            .signature_algorithm("SHA256withRSA")
            .key_algorithm("")
            .build();
        assert!(blank_key_algo.is_err());
    }

    #[test]
    fn test_scheme_equality() {
        let scheme = test_util::generate_rsa_scheme("modern");
        let copy = scheme.clone();
        assert_eq!(scheme, copy);

        let other = test_util::generate_rsa_scheme("modern");
        // same name, different key material
        assert_ne!(scheme, other);
    }

    #[test]
    fn test_dn_value_formats() {
        let both = DistinguishedName::new(Some("consumer-1"), Some("Example Corp")).unwrap();
        assert_eq!(both.value(), "CN=consumer-1, O=Example Corp");

        let cn_only = DistinguishedName::new(Some("consumer-1"), None).unwrap();
        assert_eq!(cn_only.value(), "CN=consumer-1");

        let org_only = DistinguishedName::new(None, Some("Example Corp")).unwrap();
        assert_eq!(org_only.value(), "O=Example Corp");
    }

    #[test]
    fn test_dn_rejects_blank_components() {
        assert!(DistinguishedName::new(None, None).is_err());
        assert!(DistinguishedName::new(Some("  "), Some("")).is_err());
    }
}
