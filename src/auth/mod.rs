// Auth module - Credentials consumed by the connection client
mod credentials;
mod token;

pub use credentials::{Credential, CredentialStore, InMemoryCredentials};
pub use token::Claims;
