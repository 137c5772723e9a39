use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::encode_base64url;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientDataType {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

/// `CollectedClientData`. Fields serialize in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(rename = "type")]
    pub ty: ClientDataType,
    /// base64url (unpadded) of the challenge bytes.
    pub challenge: String,
    pub origin: String,
}

impl ClientData {
    pub fn new(ty: ClientDataType, challenge: &[u8], origin: &str) -> Self {
        Self {
            ty,
            challenge: encode_base64url(challenge),
            origin: origin.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn from_json(json: &[u8]) -> Result<Self> {
        serde_json::from_slice(json).map_err(|e| Error::Encoding(e.to_string()))
    }
}

pub(crate) fn client_data_hash(client_data_json: &[u8]) -> [u8; 32] {
    Sha256::digest(client_data_json).into()
}
