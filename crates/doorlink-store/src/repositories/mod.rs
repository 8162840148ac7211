//! Repository traits and SQLite implementations.

mod credential;

pub use credential::{CredentialRepository, SqliteCredentialRepository};
