//! Virtual WebAuthn authenticator.
//!
//! Answers relying-party registration and login challenges the way a
//! security key would: it parses the options JSON, creates or imports
//! EC2 (ES256) and RSA (RS256) credentials, and returns attestation and
//! assertion responses that unmodified relying-party verification accepts.

pub mod authenticator;
pub(crate) mod cbor;
pub mod config;
pub mod credential;
pub mod error;
pub mod key;
pub mod webauthn;

use std::io::Read;
use std::path::Path;

pub use authenticator::{Authenticator, AuthenticatorOptions, SharedAuthenticator};
pub use credential::Credential;
pub use error::{Error, Result};
pub use key::{KeyType, PublicKey};
pub use webauthn::attestation::AttestationFormat;
pub use webauthn::response::{AssertionResponse, Attachment, AttestationResponse};
pub use webauthn::types::{
    AssertionOptions, AttestationOptions, RelyingParty, parse_assertion_options,
    parse_attestation_options,
};

pub fn run(cfg: config::Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    match cfg.command {
        config::Command::Register { rp, options, key_type, key, credential_id } => {
            let options = parse_attestation_options(&read_input(&options)?)?;
            let mut cred = match key {
                Some(key) => Credential::import_encoded(key_type, &key)?,
                None => Credential::generate(key_type)?,
            };
            if let Some(id) = credential_id {
                cred = cred.with_id(decode_id(&id)?);
            }

            let authenticator = Authenticator::new();
            let rp = RelyingParty::from(rp);
            let response = authenticator.create_attestation_response(&rp, &mut cred, &options)?;
            println!("{}", response.to_json()?);
        }
        config::Command::Login {
            rp,
            options,
            key_type,
            key,
            credential_id,
            user_handle,
            sign_count,
        } => {
            let options = parse_assertion_options(&read_input(&options)?)?;
            let cred = Credential::import_encoded(key_type, &key)?
                .with_id(decode_id(&credential_id)?)
                .with_sign_count(sign_count);

            let mut authenticator = Authenticator::new();
            if let Some(handle) = user_handle {
                authenticator.options.user_handle = decode_id(&handle)?;
            }
            authenticator.add_credential(cred);

            let cred = authenticator
                .find_allowed_credential(&options)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("credential is not in allowCredentials"))?;
            let rp = RelyingParty::from(rp);
            let response = authenticator.create_assertion_response(&rp, &cred, &options)?;
            println!("{}", response.to_json()?);
        }
    }
    Ok(())
}

impl From<config::RelyingPartyArgs> for RelyingParty {
    fn from(args: config::RelyingPartyArgs) -> Self {
        Self { name: args.rp_name, id: args.rp_id, origin: args.origin }
    }
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))
    }
}

fn decode_id(s: &str) -> anyhow::Result<Vec<u8>> {
    webauthn::types::decode_base64url(s)
        .map_err(|e| anyhow::anyhow!("invalid base64url {s:?}: {e}"))
}
