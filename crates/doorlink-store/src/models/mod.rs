//! Data models for the credential store.

mod credential;

pub use credential::CredentialRecord;
