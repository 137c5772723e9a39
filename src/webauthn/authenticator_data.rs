use sha2::{Digest, Sha256};

use crate::cbor;
use crate::error::{Error, Result};

pub mod flags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKUP_STATE: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    /// COSE_Key encoded public key.
    pub public_key: Vec<u8>,
}

/// rpIdHash(32) | flags(1) | signCount(4, BE) | [attestedCredentialData]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    /// Raw CBOR extension map, present when the ED flag is set.
    pub extensions: Option<Vec<u8>>,
}

pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    Sha256::digest(rp_id.as_bytes()).into()
}

impl AuthenticatorData {
    /// The AT flag is derived from `attested_credential_data`; the other
    /// flag bits are taken from `flags` as given.
    pub fn new(
        rp_id: &str,
        flags: u8,
        sign_count: u32,
        attested: Option<AttestedCredentialData>,
    ) -> Self {
        let flags = match attested {
            Some(_) => flags | flags::ATTESTED_CREDENTIAL_DATA,
            None => flags & !flags::ATTESTED_CREDENTIAL_DATA,
        };
        Self {
            rp_id_hash: rp_id_hash(rp_id),
            flags,
            sign_count,
            attested_credential_data: attested,
            extensions: None,
        }
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.rp_id_hash);
        data.push(self.flags);
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            let cred_id_len = u16::try_from(acd.credential_id.len())
                .map_err(|_| Error::Encoding("credential ID longer than 65535 bytes".into()))?;
            data.extend_from_slice(&acd.aaguid);
            data.extend_from_slice(&cred_id_len.to_be_bytes());
            data.extend_from_slice(&acd.credential_id);
            data.extend_from_slice(&acd.public_key);
        }
        if let Some(ext) = &self.extensions {
            data.extend_from_slice(ext);
        }
        Ok(data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let malformed = |what: &str| Error::Encoding(format!("authenticator data: {what}"));
        if data.len() < 37 {
            return Err(malformed("shorter than 37 bytes"));
        }
        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&data[..32]);
        let flags = data[32];
        let sign_count = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);
        let mut rest = &data[37..];

        let attested_credential_data = if flags & flags::ATTESTED_CREDENTIAL_DATA != 0 {
            if rest.len() < 18 {
                return Err(malformed("attested credential data truncated"));
            }
            let mut aaguid = [0u8; 16];
            aaguid.copy_from_slice(&rest[..16]);
            let id_len = u16::from_be_bytes([rest[16], rest[17]]) as usize;
            rest = &rest[18..];
            if rest.len() < id_len {
                return Err(malformed("credential ID truncated"));
            }
            let credential_id = rest[..id_len].to_vec();
            rest = &rest[id_len..];
            let (_, key_len) = cbor::parse_map_prefix(rest)
                .map_err(|e| malformed(&format!("credential public key: {e}")))?;
            let public_key = rest[..key_len].to_vec();
            rest = &rest[key_len..];
            Some(AttestedCredentialData { aaguid, credential_id, public_key })
        } else {
            None
        };

        let extensions = if flags & flags::EXTENSION_DATA != 0 {
            let (_, ext_len) = cbor::parse_map_prefix(rest)
                .map_err(|e| malformed(&format!("extensions: {e}")))?;
            let ext = rest[..ext_len].to_vec();
            rest = &rest[ext_len..];
            Some(ext)
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(malformed("trailing bytes"));
        }

        Ok(Self { rp_id_hash, flags, sign_count, attested_credential_data, extensions })
    }
}
