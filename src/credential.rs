use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::CREDENTIAL_ID_LEN;
use crate::error::{Error, Result};
use crate::key::{KeyType, PrivateKey, PublicKey};

/// Standard alphabet, padding optional.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One key pair registered with an authenticator.
///
/// Equality compares the ID, key type and public key. The private key and
/// sign counter are not part of a credential's identity.
#[derive(Clone)]
pub struct Credential {
    id: Vec<u8>,
    key: Box<PrivateKey>,
    sign_count: u32,
}

impl Credential {
    /// Fresh key pair with a random 32-byte ID.
    pub fn generate(key_type: KeyType) -> Result<Self> {
        let key = PrivateKey::generate(key_type)?;
        Ok(Self::new(random_id()?, key))
    }

    /// Import a PKCS#8 DER private key under a random ID.
    pub fn import(key_type: KeyType, der: &[u8]) -> Result<Self> {
        let key = PrivateKey::from_pkcs8_der(key_type, der)?;
        Ok(Self::new(random_id()?, key))
    }

    /// Like [`Credential::import`], with the DER given as hex or base64
    /// text. Whitespace is ignored.
    pub fn import_encoded(key_type: KeyType, encoded: &str) -> Result<Self> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let der = hex::decode(&compact)
            .or_else(|_| BASE64_LENIENT.decode(&compact))
            .or_else(|_| crate::webauthn::types::decode_base64url(&compact))
            .map_err(|_| Error::KeyImport("key is neither hex nor base64".into()))?;
        Self::import(key_type, &der)
    }

    pub fn new(id: Vec<u8>, key: PrivateKey) -> Self {
        Self { id, key: Box::new(key), sign_count: 0 }
    }

    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_sign_count(mut self, sign_count: u32) -> Self {
        self.sign_count = sign_count;
        self
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn key_type(&self) -> KeyType {
        self.key.key_type()
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// COSE_Key encoding of the public key.
    pub fn cose_public_key(&self) -> Result<Vec<u8>> {
        self.key.public_key().to_cose()
    }

    /// Sign `message` with the algorithm implied by the key type. Does not
    /// touch the sign counter.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.key.sign(message)
    }

    pub(crate) fn increment_sign_count(&mut self) {
        self.sign_count = self.sign_count.saturating_add(1);
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.key_type() == other.key_type()
            && self.public_key() == other.public_key()
    }
}

impl Eq for Credential {}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &hex::encode(&self.id))
            .field("key_type", &self.key_type())
            .field("sign_count", &self.sign_count)
            .finish()
    }
}

fn random_id() -> Result<Vec<u8>> {
    let mut id = vec![0u8; CREDENTIAL_ID_LEN];
    OsRng
        .try_fill_bytes(&mut id)
        .map_err(|e| Error::KeyGeneration(format!("credential ID: {e}")))?;
    Ok(id)
}
