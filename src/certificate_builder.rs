//! Client certificate construction.
//!
//! Certificates issued here carry the extension set the service has always
//! stamped onto client certificates: KeyUsage (digitalSignature,
//! keyEncipherment, dataEncipherment), ExtendedKeyUsage (clientAuth),
//! BasicConstraints (CA=false), the Netscape cert-type extension (sslClient +
//! email) for old client stacks, SubjectKeyIdentifier and
//! AuthorityKeyIdentifier, and a SubjectAlternativeName that repeats the
//! subject DN as a directoryName entry next to any explicit alternate name.
//!
//! The DN-in-SAN repetition is required: RFC 6125 section 6.4.4 obligates
//! validators to use the SAN instead of the subject whenever a SAN is
//! present, so a SAN carrying only the alternate name would hide the
//! subject identity from conforming validators.

use std::time::SystemTime;

use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Extension, X509};

use crate::errors::{CertificateError, SignatureError};
use crate::scheme::{DistinguishedName, Scheme};
use crate::signer::digest_for_algorithm;

const OID_NETSCAPE_CERT_TYPE: &str = "2.16.840.1.113730.1.1";
const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2

// DER tags used by the hand-built extension values
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_4_CONSTRUCTED: u8 = 0xa4; // GeneralName directoryName

/// A caller-supplied certificate extension: OID, critical flag, and a UTF-8
/// string or raw byte value. Absent values are normalized to empty rather
/// than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509ExtensionSpec {
    oid: String,
    critical: bool,
    value: ExtensionValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExtensionValue {
    Utf8(String),
    Bytes(Vec<u8>),
}

impl X509ExtensionSpec {
    /// A string-valued extension, DER-encoded as a UTF8String.
    pub fn utf8(oid: impl Into<String>, critical: bool, value: Option<String>) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value: ExtensionValue::Utf8(value.unwrap_or_default()),
        }
    }

    /// A byte-valued extension, DER-encoded as an OCTET STRING.
    pub fn bytes(oid: impl Into<String>, critical: bool, value: Option<Vec<u8>>) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value: ExtensionValue::Bytes(value.unwrap_or_default()),
        }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    fn der_value(&self) -> Vec<u8> {
        match &self.value {
            ExtensionValue::Utf8(text) => der_encode(TAG_UTF8_STRING, text.as_bytes()),
            ExtensionValue::Bytes(bytes) => der_encode(TAG_OCTET_STRING, bytes),
        }
    }
}

#[derive(Debug)]
enum Serial {
    Random,
    Explicit(u64),
}

/// Fluent builder for certificates issued under one scheme.
///
/// The issuer is always the scheme certificate's subject and the signature is
/// always made with the scheme's private key and signature algorithm. A
/// distinguished name, key pair, validity window, and serial must be set
/// before [`build`](Self::build).
///
/// Builders are single-use and must not be shared across threads while still
/// accumulating state.
#[derive(Debug)]
pub struct X509CertificateBuilder {
    scheme: Scheme,
    dn: Option<DistinguishedName>,
    subject_alt_name: Option<String>,
    validity: Option<(SystemTime, SystemTime)>,
    key_pair: Option<PKey<Private>>,
    serial: Option<Serial>,
    extensions: Vec<X509ExtensionSpec>,
}

impl X509CertificateBuilder {
    pub(crate) fn for_scheme(scheme: &Scheme) -> Self {
        Self {
            scheme: scheme.clone(),
            dn: None,
            subject_alt_name: None,
            validity: None,
            key_pair: None,
            serial: None,
            extensions: Vec::new(),
        }
    }

    /// Sets the subject distinguished name.
    pub fn with_dn(mut self, dn: DistinguishedName) -> Self {
        self.dn = Some(dn);
        self
    }

    /// Sets an additional subject alternative name. The subject DN is
    /// repeated inside the SAN extension alongside this name.
    pub fn with_subject_alt_name(mut self, name: &str) -> Self {
        self.subject_alt_name = Some(name.to_string());
        self
    }

    /// Sets the validity window.
    pub fn with_validity(mut self, not_before: SystemTime, not_after: SystemTime) -> Self {
        self.validity = Some((not_before, not_after));
        self
    }

    /// Sets the subject key pair; the certificate carries its public half.
    pub fn with_key_pair(mut self, key_pair: &PKey<Private>) -> Self {
        self.key_pair = Some(key_pair.clone());
        self
    }

    /// Sets an explicit serial number.
    pub fn with_serial(mut self, serial: u64) -> Self {
        self.serial = Some(Serial::Explicit(serial));
        self
    }

    /// Uses a random 128-bit serial number.
    pub fn with_random_serial(mut self) -> Self {
        self.serial = Some(Serial::Random);
        self
    }

    /// Appends caller-supplied extensions, preserving their critical flags.
    pub fn with_extensions<I>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = X509ExtensionSpec>,
    {
        self.extensions.extend(extensions);
        self
    }

    /// Builds and signs the certificate.
    pub fn build(self) -> Result<X509, CertificateError> {
        let signing_key = self
            .scheme
            .private_key()
            .ok_or_else(|| CertificateError::SchemeWithoutKey(self.scheme.name().to_string()))?;

        let dn = self
            .dn
            .ok_or(CertificateError::MissingBuilderField("distinguished name"))?;
        let key_pair = self
            .key_pair
            .ok_or(CertificateError::MissingBuilderField("key pair"))?;
        let (not_before, not_after) = self
            .validity
            .ok_or(CertificateError::MissingBuilderField("validity window"))?;
        let serial = self
            .serial
            .ok_or(CertificateError::MissingBuilderField("serial number"))?;

        let digest = digest_for_algorithm(self.scheme.signature_algorithm()).map_err(
            |err| match err {
                SignatureError::UnsupportedAlgorithm(alg) => {
                    CertificateError::UnsupportedAlgorithm(alg)
                }
                other => CertificateError::UnsupportedAlgorithm(other.to_string()),
            },
        )?;

        let mut builder = X509::builder()?;
        builder.set_version(X509_VERSION_3)?;

        let asn1_serial = match serial {
            Serial::Explicit(value) => BigNum::from_slice(&value.to_be_bytes())?,
            Serial::Random => {
                let mut serial = BigNum::new()?;
                serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
                serial
            }
        }
        .to_asn1_integer()?;
        builder.set_serial_number(&asn1_serial)?;

        let subject_name = dn.to_x509_name()?;
        builder.set_subject_name(&subject_name)?;
        builder.set_issuer_name(self.scheme.certificate().subject_name())?;

        let not_before = asn1_time(not_before)?;
        let not_after = asn1_time(not_after)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;

        builder.set_pubkey(&key_pair)?;

        // key usage set required for proper client certificate function
        let key_usage = KeyUsage::new()
            .digital_signature()
            .key_encipherment()
            .data_encipherment()
            .build()?;
        builder.append_extension(key_usage)?;

        let extended_key_usage = ExtendedKeyUsage::new().client_auth().build()?;
        builder.append_extension(extended_key_usage)?;

        let basic_constraints = BasicConstraints::new().build()?;
        builder.append_extension(basic_constraints)?;

        // Netscape cert type (sslClient | email), still expected by old
        // client stacks. BIT STRING with bits 0 and 2 set.
        builder.append_extension(raw_extension(
            OID_NETSCAPE_CERT_TYPE,
            false,
            &der_encode(TAG_BIT_STRING, &[0x05, 0xa0]),
        )?)?;

        let subject_key_id =
            SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(subject_key_id)?;

        // keyid from the issuing certificate's SKI, issuer+serial when the
        // issuing certificate carries none
        let authority_key_id = AuthorityKeyIdentifier::new()
            .keyid(false)
            .issuer(false)
            .build(&builder.x509v3_context(Some(self.scheme.certificate()), None))?;
        builder.append_extension(authority_key_id)?;

        if let Some(alt_name) = &self.subject_alt_name {
            // The subject DN rides along in the SAN; see the module docs.
            // Neither entry is critical since the subject field is not empty.
            let alt_dn = DistinguishedName::common_name(alt_name)?;

            let mut general_names = Vec::new();
            general_names
                .extend(der_encode(TAG_CONTEXT_4_CONSTRUCTED, &subject_name.to_der()?));
            general_names
                .extend(der_encode(TAG_CONTEXT_4_CONSTRUCTED, &alt_dn.to_x509_name()?.to_der()?));

            builder.append_extension(raw_extension(
                OID_SUBJECT_ALT_NAME,
                false,
                &der_encode(TAG_SEQUENCE, &general_names),
            )?)?;
        }

        for extension in &self.extensions {
            builder.append_extension(raw_extension(
                extension.oid(),
                extension.critical(),
                &extension.der_value(),
            )?)?;
        }

        builder.sign(signing_key, digest)?;
        Ok(builder.build())
    }
}

fn asn1_time(time: SystemTime) -> Result<Asn1Time, CertificateError> {
    let seconds = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0);
    Ok(Asn1Time::from_unix(seconds)?)
}

fn raw_extension(
    oid: &str,
    critical: bool,
    der_value: &[u8],
) -> Result<X509Extension, openssl::error::ErrorStack> {
    let oid = Asn1Object::from_str(oid)?;
    let contents = Asn1OctetString::new_from_bytes(der_value)?;
    X509Extension::new_from_der(&oid, critical, &contents)
}

/// Encodes one DER TLV with definite length.
fn der_encode(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);

    let length = content.len();
    if length < 128 {
        out.push(length as u8);
    } else {
        let bytes = length.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let significant = &bytes[skip..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }

    out.extend_from_slice(content);
    out
}
