//! Authentication system
//!
//! Handles the credential store and USER/PASS validation.

pub mod credentials;
pub mod validator;

pub use credentials::{Credential, CredentialStore};
pub use validator::validate_password;
