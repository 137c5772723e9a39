//! A minimal relying party for integration tests.
//!
//! It issues options JSON and verifies responses using ciborium, p256 and
//! rsa directly, without going through the crate's own decoders.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ciborium::value::Value;
use p256::ecdsa::signature::Verifier;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use serde_json::json;
use sha2::{Digest, Sha256};
use virtual_webauthn::RelyingParty;

pub const RP_NAME: &str = "Virtual WebAuthn Test";
pub const RP_ID: &str = "example.test";
pub const RP_ORIGIN: &str = "https://example.test";
pub const USER_ID: &str = "user-1234";

pub fn relying_party() -> RelyingParty {
    RelyingParty {
        name: RP_NAME.to_string(),
        id: RP_ID.to_string(),
        origin: RP_ORIGIN.to_string(),
    }
}

pub fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn unb64(s: &str) -> Vec<u8> {
    URL_SAFE_NO_PAD.decode(s).expect("base64url field")
}

pub fn random_challenge() -> Vec<u8> {
    use rand::RngCore;
    let mut challenge = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut challenge);
    challenge
}

/// `navigator.credentials.create()` options as a relying party emits them.
pub fn creation_options(challenge: &[u8], exclude: &[&[u8]]) -> Vec<u8> {
    let exclude: Vec<_> = exclude
        .iter()
        .map(|id| json!({"type": "public-key", "id": b64(id)}))
        .collect();
    serde_json::to_vec(&json!({"publicKey": {
        "rp": {"name": RP_NAME, "id": RP_ID},
        "user": {"name": "alice", "displayName": "Alice", "id": b64(USER_ID.as_bytes())},
        "challenge": b64(challenge),
        "pubKeyCredParams": [
            {"type": "public-key", "alg": -7},
            {"type": "public-key", "alg": -257},
        ],
        "timeout": 300000,
        "excludeCredentials": exclude,
        "authenticatorSelection": {"userVerification": "preferred"},
        "attestation": "direct",
    }}))
    .unwrap()
}

/// `navigator.credentials.get()` options as a relying party emits them.
pub fn request_options(challenge: &[u8], allow: &[&[u8]]) -> Vec<u8> {
    let allow: Vec<_> = allow
        .iter()
        .map(|id| json!({"type": "public-key", "id": b64(id)}))
        .collect();
    serde_json::to_vec(&json!({"publicKey": {
        "challenge": b64(challenge),
        "timeout": 300000,
        "rpId": RP_ID,
        "allowCredentials": allow,
        "userVerification": "preferred",
    }}))
    .unwrap()
}

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: Vec<u8>,
    pub cose_key: Vec<u8>,
    pub sign_count: u32,
}

fn map_get<'a>(map: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    map.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn int(i: i64) -> Value {
    Value::Integer(i.into())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn bytes_at<'a>(map: &'a [(Value, Value)], key: &Value) -> &'a [u8] {
    match map_get(map, key) {
        Some(Value::Bytes(b)) => b,
        other => panic!("expected bytes at {key:?}, got {other:?}"),
    }
}

fn int_at(map: &[(Value, Value)], key: &Value) -> i64 {
    match map_get(map, key) {
        Some(Value::Integer(i)) => i64::try_from(*i).unwrap(),
        other => panic!("expected integer at {key:?}, got {other:?}"),
    }
}

/// Verify `signature` over `message` with a COSE_Key.
pub fn verify_with_cose(cose_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Value::Map(key) = ciborium::from_reader::<Value, _>(cose_key).unwrap() else {
        panic!("COSE key is not a map")
    };
    match (int_at(&key, &int(1)), int_at(&key, &int(3))) {
        (2, -7) => {
            assert_eq!(int_at(&key, &int(-1)), 1, "curve must be P-256");
            let point = p256::EncodedPoint::from_affine_coordinates(
                p256::FieldBytes::from_slice(bytes_at(&key, &int(-2))),
                p256::FieldBytes::from_slice(bytes_at(&key, &int(-3))),
                false,
            );
            let vk = p256::ecdsa::VerifyingKey::from_encoded_point(&point).unwrap();
            let Ok(sig) = p256::ecdsa::Signature::from_der(signature) else { return false };
            vk.verify(message, &sig).is_ok()
        }
        (3, -257) => {
            let n = BigUint::from_bytes_be(bytes_at(&key, &int(-1)));
            let e = BigUint::from_bytes_be(bytes_at(&key, &int(-2)));
            let pk = RsaPublicKey::new(n, e).unwrap();
            pk.verify(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(message), signature).is_ok()
        }
        other => panic!("unexpected COSE kty/alg {other:?}"),
    }
}

fn check_client_data(client_data_json: &[u8], ty: &str, challenge: &[u8]) -> serde_json::Value {
    let cd: serde_json::Value = serde_json::from_slice(client_data_json).unwrap();
    assert_eq!(cd["type"], ty);
    assert_eq!(cd["challenge"], b64(challenge));
    assert_eq!(cd["origin"], RP_ORIGIN);
    cd
}

/// Registration ceremony verification. Returns what the RP would store.
pub fn finish_registration(response_json: &str, challenge: &[u8]) -> StoredCredential {
    let resp: serde_json::Value = serde_json::from_str(response_json).unwrap();
    assert_eq!(resp["type"], "public-key");
    assert_eq!(resp["id"], resp["rawId"]);
    let id = unb64(resp["id"].as_str().unwrap());

    let client_data_json = unb64(resp["response"]["clientDataJSON"].as_str().unwrap());
    check_client_data(&client_data_json, "webauthn.create", challenge);

    let att_obj = unb64(resp["response"]["attestationObject"].as_str().unwrap());
    let Value::Map(att) = ciborium::from_reader::<Value, _>(att_obj.as_slice()).unwrap() else {
        panic!("attestation object is not a map")
    };
    let auth_data = bytes_at(&att, &text("authData")).to_vec();

    assert_eq!(&auth_data[..32], Sha256::digest(RP_ID.as_bytes()).as_slice(), "rpIdHash");
    let flags = auth_data[32];
    assert_ne!(flags & 0x01, 0, "UP must be set");
    assert_ne!(flags & 0x40, 0, "AT must be set");
    let sign_count = u32::from_be_bytes(auth_data[33..37].try_into().unwrap());
    let id_len = u16::from_be_bytes([auth_data[53], auth_data[54]]) as usize;
    assert_eq!(&auth_data[55..55 + id_len], id.as_slice(), "credential ID in authData");
    let cose_key = auth_data[55 + id_len..].to_vec();

    let mut to_sign = auth_data.clone();
    to_sign.extend_from_slice(&Sha256::digest(&client_data_json));
    match map_get(&att, &text("fmt")) {
        Some(Value::Text(fmt)) if fmt == "packed" => {
            let Some(Value::Map(stmt)) = map_get(&att, &text("attStmt")) else { panic!("attStmt") };
            let alg = int_at(stmt, &text("alg"));
            let key: Value = ciborium::from_reader(cose_key.as_slice()).unwrap();
            let Value::Map(key) = key else { panic!("COSE key") };
            assert_eq!(alg, int_at(&key, &int(3)), "attStmt alg must match credential alg");
            assert!(
                verify_with_cose(&cose_key, &to_sign, bytes_at(stmt, &text("sig"))),
                "packed self-attestation signature must verify"
            );
        }
        Some(Value::Text(fmt)) if fmt == "none" => {
            assert!(matches!(map_get(&att, &text("attStmt")), Some(Value::Map(m)) if m.is_empty()));
        }
        other => panic!("unexpected fmt {other:?}"),
    }

    StoredCredential { id, cose_key, sign_count }
}

/// Authentication ceremony verification, updating the stored counter.
pub fn finish_login(
    response_json: &str,
    challenge: &[u8],
    stored: &mut StoredCredential,
) -> serde_json::Value {
    let resp: serde_json::Value = serde_json::from_str(response_json).unwrap();
    assert_eq!(unb64(resp["id"].as_str().unwrap()), stored.id);

    let client_data_json = unb64(resp["response"]["clientDataJSON"].as_str().unwrap());
    check_client_data(&client_data_json, "webauthn.get", challenge);

    let auth_data = unb64(resp["response"]["authenticatorData"].as_str().unwrap());
    assert_eq!(auth_data.len(), 37, "no attested data in assertions");
    assert_eq!(&auth_data[..32], Sha256::digest(RP_ID.as_bytes()).as_slice(), "rpIdHash");
    assert_ne!(auth_data[32] & 0x01, 0, "UP must be set");
    assert_eq!(auth_data[32] & 0x40, 0, "AT must not be set");

    let signature = unb64(resp["response"]["signature"].as_str().unwrap());
    let mut to_sign = auth_data.clone();
    to_sign.extend_from_slice(&Sha256::digest(&client_data_json));
    assert!(
        verify_with_cose(&stored.cose_key, &to_sign, &signature),
        "assertion signature must verify"
    );

    let sign_count = u32::from_be_bytes(auth_data[33..37].try_into().unwrap());
    assert!(
        sign_count > stored.sign_count || (sign_count == 0 && stored.sign_count == 0),
        "sign counter went from {} to {sign_count}",
        stored.sign_count
    );
    stored.sign_count = sign_count;
    resp
}
