use super::attestation::{AttestationFormat, AttestationStatement, build_attestation_object};
use super::authenticator_data::{AttestedCredentialData, AuthenticatorData};
use super::client_data::{ClientData, ClientDataType, client_data_hash};
use super::response::AttestationResponse;
use super::types::{AttestationOptions, RelyingParty};
use crate::authenticator::AuthenticatorOptions;
use crate::credential::Credential;
use crate::error::{Error, Result};

/// Build a registration response for `cred`. The credential's sign counter
/// is reported as-is and bumped only once the response is complete.
pub(crate) fn handle_make_credential(
    rp: &RelyingParty,
    options: &AttestationOptions,
    cred: &mut Credential,
    auth_options: &AuthenticatorOptions,
) -> Result<AttestationResponse> {
    let cred_id_hex = hex::encode(cred.id());

    // 1. Algorithm must be one the relying party accepts
    let alg = cred.key_type().cose_algorithm();
    if !options.algorithms.is_empty() && !options.algorithms.contains(&alg) {
        tracing::warn!(alg, accepted = ?options.algorithms, "Credential algorithm not accepted");
        return Err(Error::UnsupportedAlgorithm(format!(
            "{} (COSE {alg}) not in pubKeyCredParams",
            cred.key_type()
        )));
    }

    // 2. excludeCredentials
    if options.exclude_credentials.iter().any(|id| id.as_slice() == cred.id()) {
        tracing::warn!(cred_id = cred_id_hex, "Credential is excluded");
        return Err(Error::CredentialExcluded(cred_id_hex));
    }

    if options.rp_id != rp.id {
        tracing::debug!(
            options_rp_id = %options.rp_id,
            rp_id = %rp.id,
            "Options name a different RP ID"
        );
    }

    // 3. Client data
    let client_data_json =
        ClientData::new(ClientDataType::Create, &options.challenge, &rp.origin).to_json()?;
    let cdh = client_data_hash(&client_data_json);

    // 4. Authenticator data with attested credential data
    let auth_data = AuthenticatorData::new(
        &rp.id,
        auth_options.flags(),
        cred.sign_count(),
        Some(AttestedCredentialData {
            aaguid: auth_options.aaguid,
            credential_id: cred.id().to_vec(),
            public_key: cred.cose_public_key()?,
        }),
    )
    .to_bytes()?;

    // 5. Attestation statement
    let statement = match auth_options.attestation_format {
        AttestationFormat::None => AttestationStatement::None,
        AttestationFormat::Packed => {
            let mut to_sign = auth_data.clone();
            to_sign.extend_from_slice(&cdh);
            AttestationStatement::Packed { alg, sig: cred.sign(&to_sign)? }
        }
    };
    let attestation_object = build_attestation_object(&auth_data, &statement)?;

    // 6. Commit
    cred.increment_sign_count();
    tracing::info!(
        cred_id = cred_id_hex,
        fmt = statement.format().as_str(),
        sign_count = cred.sign_count(),
        "Attestation response built"
    );

    Ok(AttestationResponse {
        credential_id: cred.id().to_vec(),
        client_data_json,
        attestation_object,
        attachment: auth_options.attachment,
    })
}
