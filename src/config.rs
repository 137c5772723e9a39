use std::path::PathBuf;

use crate::key::KeyType;

pub const AAGUID: [u8; 16] = [
    0x76, 0x77, 0x65, 0x62, 0x61, 0x75, 0x74, 0x68, 0x6e, 0x2d, 0x73, 0x69, 0x6d, 0x00, 0x00, 0x01,
];
pub const CREDENTIAL_ID_LEN: usize = 32;
pub const DEFAULT_RSA_BITS: usize = 2048;

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "virtual-webauthn", version)]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Answer a registration challenge with an attestation response.
    Register {
        #[command(flatten)]
        rp: RelyingPartyArgs,
        /// Creation options JSON file, or `-` for stdin.
        #[arg(long)]
        options: PathBuf,
        #[arg(long, value_enum, default_value_t = KeyType::Ec2)]
        key_type: KeyType,
        /// PKCS#8 private key (hex or base64). A fresh key is generated when absent.
        #[arg(long)]
        key: Option<String>,
        /// Credential ID (base64url). Random when absent.
        #[arg(long)]
        credential_id: Option<String>,
    },
    /// Answer a login challenge with an assertion response.
    Login {
        #[command(flatten)]
        rp: RelyingPartyArgs,
        /// Request options JSON file, or `-` for stdin.
        #[arg(long)]
        options: PathBuf,
        #[arg(long, value_enum, default_value_t = KeyType::Ec2)]
        key_type: KeyType,
        /// PKCS#8 private key (hex or base64) of the registered credential.
        #[arg(long)]
        key: String,
        /// Credential ID (base64url) used at registration.
        #[arg(long)]
        credential_id: String,
        /// User handle (base64url) returned with the assertion.
        #[arg(long)]
        user_handle: Option<String>,
        /// Sign counter the credential has reached so far.
        #[arg(long, default_value_t = 0)]
        sign_count: u32,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RelyingPartyArgs {
    #[arg(long)]
    pub rp_id: String,
    #[arg(long, default_value = "")]
    pub rp_name: String,
    #[arg(long)]
    pub origin: String,
}
