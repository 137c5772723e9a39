use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Accepts base64url with or without `=` padding; always encodes without.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode_base64url(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

pub fn decode_base64url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64URL.decode(s)
}

/// The relying party a test drives. Supplied by the test, never derived
/// from options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub name: String,
    pub id: String,
    pub origin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEntity {
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

impl UserVerificationRequirement {
    // Unknown values are ignored, as browsers do.
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("required") => Self::Required,
            Some("discouraged") => Self::Discouraged,
            _ => Self::Preferred,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttestationConveyance {
    #[default]
    None,
    Indirect,
    Direct,
    Enterprise,
}

impl AttestationConveyance {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("indirect") => Self::Indirect,
            Some("direct") => Self::Direct,
            Some("enterprise") => Self::Enterprise,
            _ => Self::None,
        }
    }
}

/// Parsed `PublicKeyCredentialCreationOptions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOptions {
    pub challenge: Vec<u8>,
    pub rp_id: String,
    pub rp_name: String,
    pub user: UserEntity,
    /// COSE algorithm identifiers from `pubKeyCredParams`, in preference order.
    pub algorithms: Vec<i64>,
    pub exclude_credentials: Vec<Vec<u8>>,
    pub resident_key_required: bool,
    pub user_verification: UserVerificationRequirement,
    pub attestation: AttestationConveyance,
    pub timeout: Option<u64>,
}

/// Parsed `PublicKeyCredentialRequestOptions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOptions {
    pub challenge: Vec<u8>,
    pub rp_id: String,
    /// Allowed credential IDs in the relying party's order. Empty means any.
    pub allow_credentials: Vec<Vec<u8>>,
    pub user_verification: UserVerificationRequirement,
    pub timeout: Option<u64>,
}

// Wire schema. Everything is optional here so that missing fields produce
// a precise error from the validation below rather than a serde message.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreationOptionsJson {
    challenge: Option<String>,
    rp: Option<RpEntityJson>,
    user: Option<UserEntityJson>,
    pub_key_cred_params: Option<Vec<CredParamJson>>,
    exclude_credentials: Option<Vec<CredDescriptorJson>>,
    authenticator_selection: Option<AuthenticatorSelectionJson>,
    attestation: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestOptionsJson {
    challenge: Option<String>,
    rp_id: Option<String>,
    allow_credentials: Option<Vec<CredDescriptorJson>>,
    user_verification: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RpEntityJson {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEntityJson {
    id: Option<String>,
    name: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CredParamJson {
    #[serde(rename = "type")]
    ty: Option<String>,
    alg: i64,
}

#[derive(Debug, Deserialize)]
struct CredDescriptorJson {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorSelectionJson {
    resident_key: Option<String>,
    require_resident_key: Option<bool>,
    user_verification: Option<String>,
}

/// Unwrap `{"publicKey": {...}}` if the relying party sent the full
/// credential options object.
fn options_object(raw: &[u8]) -> Result<serde_json::Value> {
    let mut value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| Error::OptionsParse(format!("invalid JSON: {e}")))?;
    if let Some(inner) = value.get_mut("publicKey").map(serde_json::Value::take) {
        value = inner;
    }
    if !value.is_object() {
        return Err(Error::OptionsParse("options must be a JSON object".into()));
    }
    Ok(value)
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::OptionsParse(format!("missing {field}")))
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    decode_base64url(value)
        .map_err(|e| Error::OptionsParse(format!("{field} is not base64url: {e}")))
}

fn decode_challenge(challenge: Option<String>) -> Result<Vec<u8>> {
    let challenge = decode_field(&required(challenge, "challenge")?, "challenge")?;
    if challenge.is_empty() {
        return Err(Error::OptionsParse("challenge is empty".into()));
    }
    Ok(challenge)
}

fn decode_descriptors(list: Option<Vec<CredDescriptorJson>>, field: &str) -> Result<Vec<Vec<u8>>> {
    list.unwrap_or_default()
        .iter()
        .map(|d| decode_field(&d.id, field))
        .collect()
}

pub fn parse_attestation_options(raw: &[u8]) -> Result<AttestationOptions> {
    let json: CreationOptionsJson = serde_json::from_value(options_object(raw)?)
        .map_err(|e| Error::OptionsParse(e.to_string()))?;

    let challenge = decode_challenge(json.challenge)?;
    let rp = required(json.rp, "rp")?;
    let rp_id = required(rp.id.filter(|id| !id.is_empty()), "rp.id")?;

    let user = match json.user {
        Some(u) => UserEntity {
            id: match u.id {
                Some(id) => decode_field(&id, "user.id")?,
                None => Vec::new(),
            },
            name: u.name.unwrap_or_default(),
            display_name: u.display_name.unwrap_or_default(),
        },
        None => UserEntity::default(),
    };

    let algorithms = json
        .pub_key_cred_params
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.ty.as_deref().is_none_or(|t| t == "public-key"))
        .map(|p| p.alg)
        .collect();

    let exclude_credentials =
        decode_descriptors(json.exclude_credentials, "excludeCredentials.id")?;

    let (resident_key_required, user_verification) = match json.authenticator_selection {
        Some(sel) => (
            sel.resident_key.as_deref() == Some("required")
                || sel.require_resident_key == Some(true),
            UserVerificationRequirement::parse(sel.user_verification.as_deref()),
        ),
        None => (false, UserVerificationRequirement::default()),
    };

    tracing::debug!(
        rp_id = %rp_id,
        algorithms = ?algorithms,
        excluded = exclude_credentials.len(),
        "Parsed attestation options"
    );

    Ok(AttestationOptions {
        challenge,
        rp_id,
        rp_name: rp.name.unwrap_or_default(),
        user,
        algorithms,
        exclude_credentials,
        resident_key_required,
        user_verification,
        attestation: AttestationConveyance::parse(json.attestation.as_deref()),
        timeout: json.timeout,
    })
}

pub fn parse_assertion_options(raw: &[u8]) -> Result<AssertionOptions> {
    let json: RequestOptionsJson = serde_json::from_value(options_object(raw)?)
        .map_err(|e| Error::OptionsParse(e.to_string()))?;

    let challenge = decode_challenge(json.challenge)?;
    let rp_id = required(json.rp_id.filter(|id| !id.is_empty()), "rpId")?;
    let allow_credentials = decode_descriptors(json.allow_credentials, "allowCredentials.id")?;

    tracing::debug!(rp_id = %rp_id, allowed = allow_credentials.len(), "Parsed assertion options");

    Ok(AssertionOptions {
        challenge,
        rp_id,
        allow_credentials,
        user_verification: UserVerificationRequirement::parse(json.user_verification.as_deref()),
        timeout: json.timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(v: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    fn creation_minimal() -> serde_json::Value {
        json!({
            "challenge": "AAECAw",
            "rp": {"id": "example.com", "name": "Example"},
            "user": {"id": "dXNlcjE", "name": "alice", "displayName": "Alice"},
            "pubKeyCredParams": [{"type": "public-key", "alg": -7}],
        })
    }

    // ---- base64url ----

    #[test]
    fn test_base64url_accepts_padding() {
        assert_eq!(decode_base64url("AAECAw").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(decode_base64url("AAECAw==").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(encode_base64url(&[0xfb, 0xff]), "-_8");
        assert!(decode_base64url("+/8").is_err());
    }

    // ---- attestation options ----

    #[test]
    fn test_attestation_minimal_valid() {
        let opts = parse_attestation_options(&bytes(creation_minimal())).unwrap();
        assert_eq!(opts.challenge, vec![0, 1, 2, 3]);
        assert_eq!(opts.rp_id, "example.com");
        assert_eq!(opts.rp_name, "Example");
        assert_eq!(opts.user.id, b"user1");
        assert_eq!(opts.user.name, "alice");
        assert_eq!(opts.user.display_name, "Alice");
        assert_eq!(opts.algorithms, vec![-7]);
        assert!(opts.exclude_credentials.is_empty());
        assert!(!opts.resident_key_required);
        assert_eq!(opts.user_verification, UserVerificationRequirement::Preferred);
        assert_eq!(opts.attestation, AttestationConveyance::None);
    }

    #[test]
    fn test_attestation_public_key_wrapper() {
        let wrapped = json!({ "publicKey": creation_minimal() });
        let opts = parse_attestation_options(&bytes(wrapped)).unwrap();
        assert_eq!(opts.rp_id, "example.com");
    }

    #[test]
    fn test_attestation_missing_challenge() {
        let mut v = creation_minimal();
        v.as_object_mut().unwrap().remove("challenge");
        let err = parse_attestation_options(&bytes(v)).unwrap_err();
        assert!(matches!(err, Error::OptionsParse(ref m) if m.contains("challenge")));

        let mut v = creation_minimal();
        v["challenge"] = json!("");
        let err = parse_attestation_options(&bytes(v)).unwrap_err();
        assert!(
            matches!(err, Error::OptionsParse(ref m) if m.contains("challenge is empty")),
            "empty challenge must not parse: {err:?}"
        );
    }

    #[test]
    fn test_attestation_bad_challenge_encoding() {
        let mut v = creation_minimal();
        v["challenge"] = json!("not base64!");
        let err = parse_attestation_options(&bytes(v)).unwrap_err();
        assert!(matches!(err, Error::OptionsParse(_)));
    }

    #[test]
    fn test_attestation_missing_rp_id() {
        let mut v = creation_minimal();
        v["rp"] = json!({"name": "Example"});
        let err = parse_attestation_options(&bytes(v)).unwrap_err();
        assert!(matches!(err, Error::OptionsParse(ref m) if m.contains("rp.id")));
    }

    #[test]
    fn test_attestation_exclude_list_and_selection() {
        let mut v = creation_minimal();
        v["excludeCredentials"] = json!([{"type": "public-key", "id": "qqqq"}]);
        v["authenticatorSelection"] =
            json!({"residentKey": "required", "userVerification": "required"});
        v["attestation"] = json!("direct");
        v["timeout"] = json!(60000);
        v["pubKeyCredParams"] = json!([
            {"type": "public-key", "alg": -7},
            {"type": "public-key", "alg": -257},
        ]);
        let opts = parse_attestation_options(&bytes(v)).unwrap();
        assert_eq!(opts.exclude_credentials, vec![vec![0xaa, 0xaa, 0xaa]]);
        assert!(opts.resident_key_required);
        assert_eq!(opts.user_verification, UserVerificationRequirement::Required);
        assert_eq!(opts.attestation, AttestationConveyance::Direct);
        assert_eq!(opts.timeout, Some(60000));
        assert_eq!(opts.algorithms, vec![-7, -257]);
    }

    #[test]
    fn test_attestation_null_lists_are_empty() {
        let mut v = creation_minimal();
        v["excludeCredentials"] = serde_json::Value::Null;
        v["pubKeyCredParams"] = serde_json::Value::Null;
        let opts = parse_attestation_options(&bytes(v)).unwrap();
        assert!(opts.exclude_credentials.is_empty());
        assert!(opts.algorithms.is_empty());
    }

    #[test]
    fn test_attestation_not_json() {
        let err = parse_attestation_options(b"\xff{").unwrap_err();
        assert!(matches!(err, Error::OptionsParse(_)));
        let err = parse_attestation_options(b"[1, 2]").unwrap_err();
        assert!(matches!(err, Error::OptionsParse(_)));
    }

    // ---- assertion options ----

    #[test]
    fn test_assertion_minimal_valid() {
        let raw = bytes(json!({"challenge": "AAECAw", "rpId": "example.com"}));
        let opts = parse_assertion_options(&raw).unwrap();
        assert_eq!(opts.challenge, vec![0, 1, 2, 3]);
        assert_eq!(opts.rp_id, "example.com");
        assert!(opts.allow_credentials.is_empty());
        assert_eq!(opts.user_verification, UserVerificationRequirement::Preferred);
    }

    #[test]
    fn test_assertion_missing_challenge() {
        let raw = bytes(json!({"rpId": "example.com"}));
        let err = parse_assertion_options(&raw).unwrap_err();
        assert!(matches!(err, Error::OptionsParse(ref m) if m.contains("challenge")));

        let raw = bytes(json!({"challenge": "", "rpId": "example.com"}));
        let err = parse_assertion_options(&raw).unwrap_err();
        assert!(
            matches!(err, Error::OptionsParse(ref m) if m.contains("challenge is empty")),
            "empty challenge must not parse: {err:?}"
        );
    }

    #[test]
    fn test_assertion_missing_rp_id() {
        let raw = bytes(json!({"challenge": "AAECAw"}));
        let err = parse_assertion_options(&raw).unwrap_err();
        assert!(matches!(err, Error::OptionsParse(ref m) if m.contains("rpId")));
    }

    #[test]
    fn test_assertion_allow_list_keeps_order() {
        let raw = bytes(json!({"publicKey": {
            "challenge": "AAECAw",
            "rpId": "example.com",
            "allowCredentials": [
                {"type": "public-key", "id": "Ag"},
                {"type": "public-key", "id": "AQ"},
            ],
            "userVerification": "discouraged",
        }}));
        let opts = parse_assertion_options(&raw).unwrap();
        assert_eq!(opts.allow_credentials, vec![vec![2], vec![1]]);
        assert_eq!(opts.user_verification, UserVerificationRequirement::Discouraged);
    }

    #[test]
    fn test_assertion_bad_allow_id() {
        let raw = bytes(json!({
            "challenge": "AAECAw",
            "rpId": "example.com",
            "allowCredentials": [{"type": "public-key", "id": "%%"}],
        }));
        let err = parse_assertion_options(&raw).unwrap_err();
        assert!(matches!(err, Error::OptionsParse(_)));
    }
}
