use super::authenticator_data::AuthenticatorData;
use super::client_data::{ClientData, ClientDataType, client_data_hash};
use super::response::AssertionResponse;
use super::types::{AssertionOptions, RelyingParty};
use crate::authenticator::AuthenticatorOptions;
use crate::credential::Credential;
use crate::error::Result;

/// Build a login response signed by `cred`, which must be the
/// authenticator's stored copy. Signature covers authData || SHA-256(clientDataJSON).
pub(crate) fn handle_get_assertion(
    rp: &RelyingParty,
    options: &AssertionOptions,
    cred: &mut Credential,
    auth_options: &AuthenticatorOptions,
) -> Result<AssertionResponse> {
    let cred_id_hex = hex::encode(cred.id());

    if !options.allow_credentials.is_empty()
        && !options.allow_credentials.iter().any(|id| id.as_slice() == cred.id())
    {
        tracing::warn!(cred_id = cred_id_hex, "Credential is not in allowCredentials");
    }

    let client_data_json =
        ClientData::new(ClientDataType::Get, &options.challenge, &rp.origin).to_json()?;
    let cdh = client_data_hash(&client_data_json);

    let auth_data =
        AuthenticatorData::new(&rp.id, auth_options.flags(), cred.sign_count(), None).to_bytes()?;

    let mut to_sign = auth_data.clone();
    to_sign.extend_from_slice(&cdh);
    let signature = cred.sign(&to_sign)?;

    cred.increment_sign_count();
    tracing::info!(
        cred_id = cred_id_hex,
        sign_count = cred.sign_count(),
        "Assertion response built"
    );

    let user_handle =
        (!auth_options.user_handle.is_empty()).then(|| auth_options.user_handle.clone());

    Ok(AssertionResponse {
        credential_id: cred.id().to_vec(),
        client_data_json,
        authenticator_data: auth_data,
        signature,
        user_handle,
        attachment: auth_options.attachment,
    })
}
