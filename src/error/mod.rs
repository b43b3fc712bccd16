//! Error handling
//!
//! Defines error types and their mapping onto FTP reply codes.

pub mod handlers;
pub mod types;

pub use handlers::{error_to_ftp_code, error_to_reply, handle_error};
pub use types::*;
