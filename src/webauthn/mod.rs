pub mod attestation;
pub mod authenticator_data;
pub mod client_data;
pub(crate) mod get_assertion;
pub(crate) mod make_credential;
pub mod response;
pub mod types;
