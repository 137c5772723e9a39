use serde::Serialize;

use super::authenticator_data::AuthenticatorData;
use super::client_data::ClientData;
use super::types::encode_base64url;
use crate::cbor;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Attachment {
    #[serde(rename = "platform")]
    Platform,
    #[default]
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

/// Registration result, as `navigator.credentials.create()` would return it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResponse {
    pub credential_id: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub attachment: Attachment,
}

/// Login result, as `navigator.credentials.get()` would return it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResponse {
    pub credential_id: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
    pub attachment: Attachment,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyCredentialJson<R> {
    id: String,
    raw_id: String,
    #[serde(rename = "type")]
    ty: &'static str,
    authenticator_attachment: Attachment,
    response: R,
    client_extension_results: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct AttestationResponseJson {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    #[serde(rename = "attestationObject")]
    attestation_object: String,
}

#[derive(Serialize)]
struct AssertionResponseJson {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    #[serde(rename = "authenticatorData")]
    authenticator_data: String,
    signature: String,
    #[serde(rename = "userHandle", skip_serializing_if = "Option::is_none")]
    user_handle: Option<String>,
}

fn credential_json<R: Serialize>(
    credential_id: &[u8],
    attachment: Attachment,
    response: R,
) -> Result<String> {
    let id = encode_base64url(credential_id);
    let json = PublicKeyCredentialJson {
        raw_id: id.clone(),
        id,
        ty: "public-key",
        authenticator_attachment: attachment,
        response,
        client_extension_results: serde_json::Map::new(),
    };
    serde_json::to_string(&json).map_err(|e| Error::Encoding(e.to_string()))
}

impl AttestationResponse {
    /// `PublicKeyCredential` JSON with base64url binary fields.
    pub fn to_json(&self) -> Result<String> {
        credential_json(
            &self.credential_id,
            self.attachment,
            AttestationResponseJson {
                client_data_json: encode_base64url(&self.client_data_json),
                attestation_object: encode_base64url(&self.attestation_object),
            },
        )
    }

    pub fn client_data(&self) -> Result<ClientData> {
        ClientData::from_json(&self.client_data_json)
    }

    /// Decode the `authData` embedded in the attestation object.
    pub fn authenticator_data(&self) -> Result<AuthenticatorData> {
        let map = cbor::parse_map(&self.attestation_object)
            .map_err(|e| Error::Encoding(format!("attestation object: {e}")))?;
        let auth_data = cbor::map_get_str(&map, "authData")
            .and_then(cbor::as_bytes)
            .ok_or_else(|| Error::Encoding("attestation object: authData missing".into()))?;
        AuthenticatorData::from_bytes(auth_data)
    }
}

impl AssertionResponse {
    pub fn to_json(&self) -> Result<String> {
        credential_json(
            &self.credential_id,
            self.attachment,
            AssertionResponseJson {
                client_data_json: encode_base64url(&self.client_data_json),
                authenticator_data: encode_base64url(&self.authenticator_data),
                signature: encode_base64url(&self.signature),
                user_handle: self.user_handle.as_deref().map(encode_base64url),
            },
        )
    }

    pub fn client_data(&self) -> Result<ClientData> {
        ClientData::from_json(&self.client_data_json)
    }

    pub fn parsed_authenticator_data(&self) -> Result<AuthenticatorData> {
        AuthenticatorData::from_bytes(&self.authenticator_data)
    }
}
