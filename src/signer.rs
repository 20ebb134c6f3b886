//! Data signing bound to a crypto scheme.

use std::io::Read;

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};

use crate::errors::SignatureError;
use crate::scheme::Scheme;

/// Maps a JCA-style signature algorithm name (e.g. `SHA256withRSA`,
/// `SHA384withECDSA`) to the digest used by the provider. The key half of the
/// name is carried by the key material itself.
pub(crate) fn digest_for_algorithm(algorithm: &str) -> Result<MessageDigest, SignatureError> {
    let upper = algorithm.to_ascii_uppercase();
    let digest_name = match upper.find("WITH") {
        Some(index) => &upper[..index],
        None => upper.as_str(),
    };

    match digest_name {
        "SHA1" | "SHA-1" => Ok(MessageDigest::sha1()),
        "SHA224" | "SHA-224" => Ok(MessageDigest::sha224()),
        "SHA256" | "SHA-256" => Ok(MessageDigest::sha256()),
        "SHA384" | "SHA-384" => Ok(MessageDigest::sha384()),
        "SHA512" | "SHA-512" => Ok(MessageDigest::sha512()),
        _ => Err(SignatureError::UnsupportedAlgorithm(algorithm.to_string())),
    }
}

/// Signs byte data or streams with one scheme's private key and signature
/// algorithm.
///
/// Instances are cheap and single-use; create one per operation via
/// [`CryptoManager::signer`](crate::crypto_manager::CryptoManager::signer).
pub struct Signer {
    scheme_name: String,
    key: PKey<Private>,
    digest: MessageDigest,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("scheme_name", &self.scheme_name)
            .field("key", &self.key)
            .field("digest", &self.digest.type_().as_raw())
            .finish()
    }
}

impl Signer {
    /// Binds a signer to a scheme. The scheme must carry a private key and a
    /// supported signature algorithm.
    pub(crate) fn for_scheme(scheme: &Scheme) -> Result<Self, SignatureError> {
        let key = scheme
            .private_key()
            .cloned()
            .ok_or_else(|| SignatureError::SchemeWithoutKey(scheme.name().to_string()))?;

        Ok(Self {
            scheme_name: scheme.name().to_string(),
            key,
            digest: digest_for_algorithm(scheme.signature_algorithm())?,
        })
    }

    /// Name of the scheme this signer is bound to.
    pub fn scheme_name(&self) -> &str {
        &self.scheme_name
    }

    /// Signs a byte buffer, returning the raw signature bytes.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut signer = openssl::sign::Signer::new(self.digest, &self.key)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }

    /// Signs everything readable from `source`, returning the raw signature
    /// bytes.
    pub fn sign_reader(&self, source: &mut dyn Read) -> Result<Vec<u8>, SignatureError> {
        let mut signer = openssl::sign::Signer::new(self.digest, &self.key)?;

        let mut buffer = [0u8; 8192];
        loop {
            let read = source.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            signer.update(&buffer[..read])?;
        }

        Ok(signer.sign_to_vec()?)
    }
}
