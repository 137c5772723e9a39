#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key generation: {0}")]
    KeyGeneration(String),
    #[error("key import: {0}")]
    KeyImport(String),
    #[error("options: {0}")]
    OptionsParse(String),
    #[error("unknown credential {0}")]
    UnknownCredential(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("credential {0} is excluded by the relying party")]
    CredentialExcluded(String),
    #[error("signing: {0}")]
    Signing(String),
    #[error("encoding: {0}")]
    Encoding(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
