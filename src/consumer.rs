//! Consumer model object.
//!
//! The crypto core only needs a small slice of the consumer model: identity,
//! declared facts and capabilities (for scheme negotiation), and the cached
//! key-pair data managed by the key pair generator. Persistence of this
//! object is the caller's concern.

use std::collections::{BTreeMap, BTreeSet};

/// Consumer fact naming the crypto scheme the consumer wants to use.
pub const CRYPTO_SCHEME_FACT: &str = "crypto.scheme";

/// DER-encoded key pair material cached on a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairData {
    public_key_der: Vec<u8>,
    private_key_der: Vec<u8>,
}

impl KeyPairData {
    pub fn new(public_key_der: Vec<u8>, private_key_der: Vec<u8>) -> Self {
        Self {
            public_key_der,
            private_key_der,
        }
    }

    /// X.509 SubjectPublicKeyInfo encoding of the public key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// PKCS8 encoding of the private key.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }
}

/// A registered consumer of the entitlement service.
#[derive(Debug, Clone, Default)]
pub struct Consumer {
    uuid: String,
    name: String,
    facts: BTreeMap<String, String>,
    capabilities: BTreeSet<String>,
    key_pair_data: Option<KeyPairData>,
}

impl Consumer {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }

    pub fn set_fact(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn add_capability(&mut self, name: impl Into<String>) -> &mut Self {
        self.capabilities.insert(name.into());
        self
    }

    pub fn key_pair_data(&self) -> Option<&KeyPairData> {
        self.key_pair_data.as_ref()
    }

    pub fn set_key_pair_data(&mut self, data: Option<KeyPairData>) -> &mut Self {
        self.key_pair_data = data;
        self
    }
}
