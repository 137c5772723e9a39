use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::config::AAGUID;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::webauthn::attestation::AttestationFormat;
use crate::webauthn::authenticator_data::flags;
use crate::webauthn::response::{AssertionResponse, Attachment, AttestationResponse};
use crate::webauthn::types::{AssertionOptions, AttestationOptions, RelyingParty};
use crate::webauthn::{get_assertion, make_credential};

/// Test-controlled behaviour of the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorOptions {
    pub user_present: bool,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    /// Returned as `userHandle` in assertions when non-empty.
    pub user_handle: Vec<u8>,
    pub attachment: Attachment,
    pub attestation_format: AttestationFormat,
    pub aaguid: [u8; 16],
}

impl Default for AuthenticatorOptions {
    fn default() -> Self {
        Self {
            user_present: true,
            user_verified: true,
            backup_eligible: false,
            backup_state: false,
            user_handle: Vec::new(),
            attachment: Attachment::default(),
            attestation_format: AttestationFormat::default(),
            aaguid: AAGUID,
        }
    }
}

impl AuthenticatorOptions {
    /// Flags byte without AT/ED, which depend on the response being built.
    pub fn flags(&self) -> u8 {
        let mut f = 0;
        if self.user_present {
            f |= flags::USER_PRESENT;
        }
        if self.user_verified {
            f |= flags::USER_VERIFIED;
        }
        if self.backup_eligible {
            f |= flags::BACKUP_ELIGIBLE;
        }
        if self.backup_state {
            f |= flags::BACKUP_STATE;
        }
        f
    }
}

/// An authenticator shared between threads.
pub type SharedAuthenticator = Arc<Mutex<Authenticator>>;

/// Credential store plus options. Credentials are kept in insertion order;
/// re-adding an ID replaces the stored entry in place.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    pub options: AuthenticatorOptions,
    credentials: IndexMap<Vec<u8>, Credential>,
}

impl Authenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AuthenticatorOptions) -> Self {
        Self { options, credentials: IndexMap::new() }
    }

    pub fn into_shared(self) -> SharedAuthenticator {
        Arc::new(Mutex::new(self))
    }

    /// Register a credential. An existing entry with the same ID is replaced.
    pub fn add_credential(&mut self, cred: Credential) {
        let cred_id_hex = hex::encode(cred.id());
        let replaced = self.credentials.insert(cred.id().to_vec(), cred).is_some();
        tracing::info!(cred_id = cred_id_hex, replaced, "Credential added");
    }

    pub fn remove_credential(&mut self, id: &[u8]) -> Option<Credential> {
        self.credentials.shift_remove(id)
    }

    pub fn credential(&self, id: &[u8]) -> Option<&Credential> {
        self.credentials.get(id)
    }

    pub fn credentials(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.values()
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Pick the credential to answer `options` with.
    ///
    /// With a non-empty allow list, the first ID in the relying party's
    /// order that is registered wins. With an empty list, the earliest
    /// registered credential is returned.
    pub fn find_allowed_credential(&self, options: &AssertionOptions) -> Option<&Credential> {
        if options.allow_credentials.is_empty() {
            self.credentials.values().next()
        } else {
            options
                .allow_credentials
                .iter()
                .find_map(|id| self.credentials.get(id.as_slice()))
        }
    }

    /// Build a registration response. `cred` need not be registered; its
    /// sign counter is bumped on success.
    pub fn create_attestation_response(
        &self,
        rp: &RelyingParty,
        cred: &mut Credential,
        options: &AttestationOptions,
    ) -> Result<AttestationResponse> {
        make_credential::handle_make_credential(rp, options, cred, &self.options)
    }

    /// Build a login response with the stored copy of `cred`, bumping the
    /// stored sign counter on success.
    pub fn create_assertion_response(
        &mut self,
        rp: &RelyingParty,
        cred: &Credential,
        options: &AssertionOptions,
    ) -> Result<AssertionResponse> {
        let stored = match self.credentials.get_mut(cred.id()) {
            Some(stored) if *stored == *cred => stored,
            _ => {
                let cred_id_hex = hex::encode(cred.id());
                tracing::warn!(cred_id = cred_id_hex, "Credential is not registered");
                return Err(Error::UnknownCredential(cred_id_hex));
            }
        };
        get_assertion::handle_get_assertion(rp, options, stored, &self.options)
    }
}
