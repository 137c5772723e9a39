use ciborium::value::Value;
use rsa::BigUint;
use rsa::traits::PublicKeyParts;

use super::{KeyType, PublicKey};
use crate::cbor;
use crate::error::{Error, Result};

pub const LABEL_KTY: i64 = 1;
pub const LABEL_ALG: i64 = 3;
pub const LABEL_EC2_CRV: i64 = -1;
pub const LABEL_EC2_X: i64 = -2;
pub const LABEL_EC2_Y: i64 = -3;
pub const LABEL_RSA_N: i64 = -1;
pub const LABEL_RSA_E: i64 = -2;

pub const KTY_EC2: i64 = 2;
pub const KTY_RSA: i64 = 3;
pub const ALG_ES256: i64 = -7;
pub const ALG_RS256: i64 = -257;
pub const CRV_P256: i64 = 1;

impl PublicKey {
    /// Encode as a COSE_Key CBOR map.
    ///
    /// EC2: {1: 2, 3: -7, -1: 1, -2: x, -3: y}
    /// RSA: {1: 3, 3: -257, -1: n, -2: e}
    ///
    /// Labels are written in that fixed order, so the same key always
    /// encodes to the same bytes.
    pub fn to_cose(&self) -> Result<Vec<u8>> {
        let map = match self {
            Self::Ec2(key) => {
                let point = key.to_encoded_point(false);
                let (Some(x), Some(y)) = (point.x(), point.y()) else {
                    return Err(Error::Encoding("P-256 point has no affine coordinates".into()));
                };
                Value::Map(vec![
                    (cbor::int(LABEL_KTY), cbor::int(KTY_EC2)),
                    (cbor::int(LABEL_ALG), cbor::int(ALG_ES256)),
                    (cbor::int(LABEL_EC2_CRV), cbor::int(CRV_P256)),
                    (cbor::int(LABEL_EC2_X), Value::Bytes(x.to_vec())),
                    (cbor::int(LABEL_EC2_Y), Value::Bytes(y.to_vec())),
                ])
            }
            Self::Rsa(key) => Value::Map(vec![
                (cbor::int(LABEL_KTY), cbor::int(KTY_RSA)),
                (cbor::int(LABEL_ALG), cbor::int(ALG_RS256)),
                (cbor::int(LABEL_RSA_N), Value::Bytes(key.n().to_bytes_be())),
                (cbor::int(LABEL_RSA_E), Value::Bytes(key.e().to_bytes_be())),
            ]),
        };
        cbor::to_vec(&map)
    }

    /// Decode a COSE_Key. Only EC2/P-256/ES256 and RSA/RS256 are accepted.
    pub fn from_cose(bytes: &[u8]) -> Result<Self> {
        let map = cbor::parse_map(bytes).map_err(|e| Error::KeyImport(format!("COSE key: {e}")))?;
        let field = |label: i64| {
            cbor::map_get(&map, label)
                .ok_or_else(|| Error::KeyImport(format!("COSE key: label {label} missing")))
        };
        let int_field = |label: i64| {
            field(label).and_then(|v| {
                cbor::as_int(v).ok_or_else(|| {
                    Error::KeyImport(format!("COSE key: label {label} is not an integer"))
                })
            })
        };
        let bytes_field = |label: i64| {
            field(label).and_then(|v| {
                cbor::as_bytes(v).ok_or_else(|| {
                    Error::KeyImport(format!("COSE key: label {label} is not a byte string"))
                })
            })
        };

        let kty = int_field(LABEL_KTY)?;
        let alg = int_field(LABEL_ALG)?;
        let key_type = KeyType::from_cose_algorithm(alg)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("COSE algorithm {alg}")))?;
        if key_type.cose_key_type() != kty {
            return Err(Error::UnsupportedAlgorithm(format!("key type {kty} with algorithm {alg}")));
        }

        match key_type {
            KeyType::Ec2 => {
                let crv = int_field(LABEL_EC2_CRV)?;
                if crv != CRV_P256 {
                    return Err(Error::UnsupportedAlgorithm(format!("curve {crv}")));
                }
                let x = bytes_field(LABEL_EC2_X)?;
                let y = bytes_field(LABEL_EC2_Y)?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(Error::KeyImport(
                        "COSE key: P-256 coordinates must be 32 bytes".into(),
                    ));
                }
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(x),
                    p256::FieldBytes::from_slice(y),
                    false,
                );
                let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map_err(|e| Error::KeyImport(format!("COSE key: {e}")))?;
                Ok(Self::Ec2(key))
            }
            KeyType::Rsa => {
                let n = BigUint::from_bytes_be(bytes_field(LABEL_RSA_N)?);
                let e = BigUint::from_bytes_be(bytes_field(LABEL_RSA_E)?);
                let key = rsa::RsaPublicKey::new(n, e)
                    .map_err(|e| Error::KeyImport(format!("COSE key: {e}")))?;
                Ok(Self::Rsa(key))
            }
        }
    }
}
