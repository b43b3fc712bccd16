//! Authentication validator
//!
//! Checks a USER/PASS pair against the credential store.

use super::credentials::{Credential, CredentialStore};
use crate::error::AuthError;

/// Performs basic input sanitation to check for malformed usernames/passwords.
fn is_valid_input(input: &str) -> bool {
    !input.contains(['\r', '\n', '\0'])
}

/// Returns the matching credential when `password` is correct for `username`.
pub fn validate_password<'a>(
    store: &'a CredentialStore,
    username: &str,
    password: &str,
) -> Result<&'a Credential, AuthError> {
    if !is_valid_input(username) || !is_valid_input(password) {
        return Err(AuthError::LoginIncorrect(username.to_string()));
    }

    match store.get(username) {
        Some(credential) if credential.password == password => Ok(credential),
        _ => Err(AuthError::LoginIncorrect(username.to_string())),
    }
}
