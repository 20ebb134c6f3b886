//! Asymmetric key pair generation and per-consumer retrieval.

use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use tracing::warn;

use crate::consumer::{Consumer, KeyPairData};
use crate::errors::KeyError;
use crate::scheme::Scheme;

/// Generates key pairs under one scheme's key algorithm and size.
///
/// Also owns the consumer key-pair lifecycle: a consumer's cached PKCS8 key
/// data is reused when parseable and silently replaced with freshly generated
/// material when it is not. Persisting the updated consumer is the caller's
/// concern.
pub struct KeyPairGenerator {
    key_algorithm: String,
    key_size: Option<u32>,
}

impl KeyPairGenerator {
    pub(crate) fn for_scheme(scheme: &Scheme) -> Self {
        Self {
            key_algorithm: scheme.key_algorithm().to_string(),
            key_size: scheme.key_size(),
        }
    }

    pub fn key_algorithm(&self) -> &str {
        &self.key_algorithm
    }

    /// Generates a fresh key pair.
    ///
    /// RSA requires the scheme to declare a key size; EC selects its curve
    /// from the key size (P-256 when unspecified); Ed25519 ignores the size.
    pub fn generate(&self) -> Result<PKey<Private>, KeyError> {
        match self.key_algorithm.to_ascii_uppercase().as_str() {
            "RSA" => {
                let bits = self
                    .key_size
                    .ok_or_else(|| KeyError::MissingKeySize(self.key_algorithm.clone()))?;
                let rsa = Rsa::generate(bits).map_err(KeyError::Generation)?;
                PKey::from_rsa(rsa).map_err(KeyError::Generation)
            }
            "EC" | "ECDSA" => {
                let curve = match self.key_size {
                    None | Some(256) => Nid::X9_62_PRIME256V1,
                    Some(384) => Nid::SECP384R1,
                    Some(521) => Nid::SECP521R1,
                    Some(other) => {
                        return Err(KeyError::UnsupportedAlgorithm(format!(
                            "{}-{other}",
                            self.key_algorithm
                        )))
                    }
                };

                let group = EcGroup::from_curve_name(curve).map_err(KeyError::Generation)?;
                let ec = EcKey::generate(&group).map_err(KeyError::Generation)?;
                PKey::from_ec_key(ec).map_err(KeyError::Generation)
            }
            "ED25519" => PKey::generate_ed25519().map_err(KeyError::Generation),
            _ => Err(KeyError::UnsupportedAlgorithm(self.key_algorithm.clone())),
        }
    }

    /// Returns the consumer's key pair, generating and caching one if the
    /// consumer has none or its cached material is unusable.
    pub fn consumer_key_pair(&self, consumer: &mut Consumer) -> Result<PKey<Private>, KeyError> {
        if let Some(data) = consumer.key_pair_data() {
            match PKey::private_key_from_pkcs8(data.private_key_der()) {
                Ok(key) => return Ok(key),
                Err(error) => {
                    warn!(
                        consumer = consumer.uuid(),
                        %error,
                        "malformed key pair data found for consumer; generating a new key pair"
                    );
                }
            }
        }

        let key = self.generate()?;
        let data = KeyPairData::new(
            key.public_key_to_der().map_err(KeyError::Generation)?,
            key.private_key_to_pkcs8().map_err(KeyError::Generation)?,
        );
        consumer.set_key_pair_data(Some(data));

        Ok(key)
    }
}
