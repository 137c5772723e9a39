//! Credential key material: EC2 (P-256, ES256) and RSA (RS256) key pairs.
//!
//! Private keys only ever leave this module as signatures. Public keys are
//! exposed as [`PublicKey`] and encoded as COSE_Key by [`cose`].

pub mod cose;

use p256::ecdsa::signature::{Signer, Verifier};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ec2,
    Rsa,
}

impl KeyType {
    /// COSE algorithm identifier (ES256 = -7, RS256 = -257).
    pub fn cose_algorithm(self) -> i64 {
        match self {
            Self::Ec2 => cose::ALG_ES256,
            Self::Rsa => cose::ALG_RS256,
        }
    }

    /// COSE key type identifier (EC2 = 2, RSA = 3).
    pub fn cose_key_type(self) -> i64 {
        match self {
            Self::Ec2 => cose::KTY_EC2,
            Self::Rsa => cose::KTY_RSA,
        }
    }

    pub fn from_cose_algorithm(alg: i64) -> Option<Self> {
        match alg {
            cose::ALG_ES256 => Some(Self::Ec2),
            cose::ALG_RS256 => Some(Self::Rsa),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ec2 => f.write_str("EC2"),
            Self::Rsa => f.write_str("RSA"),
        }
    }
}

/// Opaque private key handle.
#[derive(Clone)]
pub struct PrivateKey {
    inner: KeyInner,
}

#[derive(Clone)]
enum KeyInner {
    Ec2(p256::ecdsa::SigningKey),
    Rsa(RsaPrivateKey),
}

/// Draw 32 bytes until they form a valid non-zero scalar below the P-256
/// group order.
fn random_p256_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<p256::ecdsa::SigningKey> {
    loop {
        let mut bytes = p256::FieldBytes::default();
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| Error::KeyGeneration(format!("randomness unavailable: {e}")))?;
        if let Ok(key) = p256::ecdsa::SigningKey::from_bytes(&bytes) {
            return Ok(key);
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_type", &self.key_type())
            .finish_non_exhaustive()
    }
}

impl PrivateKey {
    /// Generate a fresh key pair. RSA keys use `config::DEFAULT_RSA_BITS`.
    pub fn generate(key_type: KeyType) -> Result<Self> {
        Self::generate_with(key_type, &mut OsRng)
    }

    /// Failures of `rng` surface as `KeyGeneration` rather than a panic.
    pub(crate) fn generate_with<R: RngCore + CryptoRng>(
        key_type: KeyType,
        rng: &mut R,
    ) -> Result<Self> {
        let inner = match key_type {
            KeyType::Ec2 => KeyInner::Ec2(random_p256_scalar(rng)?),
            KeyType::Rsa => {
                // RsaPrivateKey::new panics if the RNG fails; probe it first.
                rng.try_fill_bytes(&mut [0u8; 32])
                    .map_err(|e| Error::KeyGeneration(format!("randomness unavailable: {e}")))?;
                let key = RsaPrivateKey::new(rng, crate::config::DEFAULT_RSA_BITS)
                    .map_err(|e| Error::KeyGeneration(e.to_string()))?;
                KeyInner::Rsa(key)
            }
        };
        tracing::debug!(%key_type, "Generated key pair");
        Ok(Self { inner })
    }

    /// Decode a PKCS#8 DER private key, checking that its algorithm matches
    /// `key_type`. EC2 keys must be on P-256.
    pub fn from_pkcs8_der(key_type: KeyType, der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| Error::KeyImport(format!("malformed PKCS#8: {e}")))?;
        let oid = info.algorithm.oid;

        let inner = match key_type {
            KeyType::Ec2 => {
                if oid != OID_EC_PUBLIC_KEY {
                    return Err(Error::KeyImport(format!(
                        "expected an EC key, found algorithm {oid}"
                    )));
                }
                let curve = info
                    .algorithm
                    .parameters_oid()
                    .map_err(|e| Error::KeyImport(format!("missing curve parameters: {e}")))?;
                if curve != OID_SECP256R1 {
                    return Err(Error::KeyImport(format!(
                        "unsupported curve {curve}, expected P-256"
                    )));
                }
                let key = p256::ecdsa::SigningKey::from_pkcs8_der(der)
                    .map_err(|e| Error::KeyImport(e.to_string()))?;
                KeyInner::Ec2(key)
            }
            KeyType::Rsa => {
                if oid != OID_RSA_ENCRYPTION {
                    return Err(Error::KeyImport(format!(
                        "expected an RSA key, found algorithm {oid}"
                    )));
                }
                let key = RsaPrivateKey::from_pkcs8_der(der)
                    .map_err(|e| Error::KeyImport(e.to_string()))?;
                KeyInner::Rsa(key)
            }
        };
        Ok(Self { inner })
    }

    pub fn key_type(&self) -> KeyType {
        match self.inner {
            KeyInner::Ec2(_) => KeyType::Ec2,
            KeyInner::Rsa(_) => KeyType::Rsa,
        }
    }

    /// Sign `message` with SHA-256. EC2 signatures are DER-encoded
    /// (r, s) pairs, RSA signatures are PKCS#1 v1.5.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.inner {
            KeyInner::Ec2(key) => {
                let sig: p256::ecdsa::Signature =
                    key.try_sign(message).map_err(|e| Error::Signing(e.to_string()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            KeyInner::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|e| Error::Signing(e.to_string()))
            }
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match &self.inner {
            KeyInner::Ec2(key) => PublicKey::Ec2(key.verifying_key().clone()),
            KeyInner::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ec2(p256::ecdsa::VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ec2(_) => KeyType::Ec2,
            Self::Rsa(_) => KeyType::Rsa,
        }
    }

    /// Check a signature produced by [`PrivateKey::sign`] over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Ec2(key) => p256::ecdsa::Signature::from_der(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature).is_ok()
            }
        }
    }
}
