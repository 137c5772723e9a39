use ciborium::value::Value;

use crate::cbor;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttestationFormat {
    /// Empty attestation statement.
    None,
    /// Self-attestation: signed by the credential's own key, no x5c.
    #[default]
    Packed,
}

impl AttestationFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Packed => "packed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    None,
    Packed { alg: i64, sig: Vec<u8> },
}

impl AttestationStatement {
    pub fn format(&self) -> AttestationFormat {
        match self {
            Self::None => AttestationFormat::None,
            Self::Packed { .. } => AttestationFormat::Packed,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::None => Value::Map(vec![]),
            Self::Packed { alg, sig } => Value::Map(vec![
                (cbor::text("alg"), cbor::int(*alg)),
                (cbor::text("sig"), Value::Bytes(sig.clone())),
            ]),
        }
    }
}

/// Build the WebAuthn attestation object:
/// {"fmt": tstr, "attStmt": map, "authData": bstr}, keys in CTAP2
/// canonical order.
pub(crate) fn build_attestation_object(
    auth_data: &[u8],
    statement: &AttestationStatement,
) -> Result<Vec<u8>> {
    let map = Value::Map(vec![
        (cbor::text("fmt"), cbor::text(statement.format().as_str())),
        (cbor::text("attStmt"), statement.to_value()),
        (cbor::text("authData"), Value::Bytes(auth_data.to_vec())),
    ]);
    cbor::to_vec(&map)
}
