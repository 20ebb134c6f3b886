//! Shared helpers for the crate's test suites: throwaway CAs, schemes, and
//! on-disk PEM fixtures.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier};
use openssl::x509::{X509Name, X509};

use crate::certificate_builder::X509CertificateBuilder;
use crate::configs::{keys, Config};
use crate::consumer::Consumer;
use crate::scheme::{DistinguishedName, Scheme};

pub(crate) fn generate_rsa_key(bits: u32) -> PKey<Private> {
    let rsa = Rsa::generate(bits).unwrap();
    PKey::from_rsa(rsa).unwrap()
}

/// Generates a self-signed CA certificate and its private key.
pub(crate) fn generate_ca(common_name: &str) -> (PKey<Private>, X509) {
    let key = generate_rsa_key(2048);

    let mut name = X509Name::builder().unwrap();
    name.append_entry_by_nid(openssl::nid::Nid::COMMONNAME, common_name)
        .unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(128, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();

    let not_before = openssl::asn1::Asn1Time::days_from_now(0).unwrap();
    let not_after = openssl::asn1::Asn1Time::days_from_now(365).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();

    builder.set_pubkey(&key).unwrap();

    let basic_constraints = BasicConstraints::new().critical().ca().build().unwrap();
    builder.append_extension(basic_constraints).unwrap();

    let key_usage = KeyUsage::new()
        .critical()
        .key_cert_sign()
        .crl_sign()
        .digital_signature()
        .build()
        .unwrap();
    builder.append_extension(key_usage).unwrap();

    let subject_key_id = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(subject_key_id).unwrap();

    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// Generates a complete RSA scheme with its own throwaway CA.
pub(crate) fn generate_rsa_scheme(name: &str) -> Scheme {
    let (key, cert) = generate_ca(&format!("{name} CA"));

    Scheme::builder()
        .name(name)
        .certificate(cert)
        .private_key(key)
        .signature_algorithm("SHA256withRSA")
        .key_algorithm("RSA")
        .key_size(2048)
        .build()
        .unwrap()
}

/// Same scheme shape with a chosen signature algorithm.
pub(crate) fn scheme_with_algorithm(name: &str, signature_algorithm: &str) -> Scheme {
    let (key, cert) = generate_ca(&format!("{name} CA"));

    Scheme::builder()
        .name(name)
        .certificate(cert)
        .private_key(key)
        .signature_algorithm(signature_algorithm)
        .key_algorithm("RSA")
        .build()
        .unwrap()
}

/// Copies a scheme, dropping its private key.
pub(crate) fn strip_private_key(scheme: &Scheme) -> Scheme {
    let mut builder = Scheme::builder()
        .name(scheme.name())
        .certificate(scheme.certificate().clone())
        .signature_algorithm(scheme.signature_algorithm())
        .key_algorithm(scheme.key_algorithm());

    if let Some(size) = scheme.key_size() {
        builder = builder.key_size(size);
    }

    builder.build().unwrap()
}

pub(crate) fn write_cert(path: &Path, cert: &X509) {
    fs::write(path, cert.to_pem().unwrap()).unwrap();
}

/// Writes a key as PKCS8 PEM, encrypted when a password is given.
pub(crate) fn write_key(path: &Path, key: &PKey<Private>, password: Option<&str>) {
    let pem = match password {
        Some(password) => key
            .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), password.as_bytes())
            .unwrap(),
        None => key.private_key_to_pem_pkcs8().unwrap(),
    };
    fs::write(path, pem).unwrap();
}

/// Writes CA material to disk and returns a config pointing `ca.cert` and
/// `ca.key` at it.
pub(crate) fn ca_config(dir: &Path, ca_key: &PKey<Private>, ca_cert: &X509) -> Config {
    let cert_path = dir.join("service-ca.crt");
    let key_path = dir.join("service-ca.key");
    write_cert(&cert_path, ca_cert);
    write_key(&key_path, ca_key, None);

    Config::from_entries([
        (keys::CA_CERT, cert_path.to_str().unwrap()),
        (keys::CA_KEY, key_path.to_str().unwrap()),
    ])
}

/// Writes a scheme's cert and key to disk and fills in its scoped
/// configuration keys.
pub(crate) fn scheme_config(
    config: &mut Config,
    dir: &Path,
    scheme: &Scheme,
    key_password: Option<&str>,
) {
    let name = scheme.name();

    let cert_path = dir.join(format!("{name}.crt"));
    let key_path = dir.join(format!("{name}.key"));
    write_cert(&cert_path, scheme.certificate());
    write_key(&key_path, scheme.private_key().unwrap(), key_password);

    config.set(
        keys::scheme_key(name, keys::SCHEME_CERT),
        cert_path.to_str().unwrap(),
    );
    config.set(
        keys::scheme_key(name, keys::SCHEME_KEY),
        key_path.to_str().unwrap(),
    );

    if let Some(password) = key_password {
        config.set(keys::scheme_key(name, keys::SCHEME_KEY_PASSWORD), password);
    }

    config.set(
        keys::scheme_key(name, keys::SCHEME_SIGNATURE_ALGORITHM),
        scheme.signature_algorithm(),
    );
    config.set(
        keys::scheme_key(name, keys::SCHEME_KEY_ALGORITHM),
        scheme.key_algorithm(),
    );

    if let Some(size) = scheme.key_size() {
        config.set(
            keys::scheme_key(name, keys::SCHEME_KEY_SIZE),
            size.to_string(),
        );
    }
}

pub(crate) fn consumer(name: &str) -> Consumer {
    Consumer::new(format!("uuid-{name}"), name)
}

/// Issues a client certificate signed under the given scheme.
pub(crate) fn issue_client_cert(scheme: &Scheme, common_name: &str) -> X509 {
    let now = SystemTime::now();

    X509CertificateBuilder::for_scheme(scheme)
        .with_dn(DistinguishedName::common_name(common_name).unwrap())
        .with_key_pair(&generate_rsa_key(2048))
        .with_validity(now, now + Duration::from_secs(86_400 * 30))
        .with_random_serial()
        .build()
        .unwrap()
}
