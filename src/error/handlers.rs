//! Error handlers
//!
//! Maps session errors onto the control-channel reply the peer receives.

use log::{error, warn};

use crate::error::types::{AuthError, ProtocolError, ResourceError, SessionError, TransportError};
use crate::protocol::Reply;
use crate::protocol::responses::*;

/// Log a session error at a level matching its severity
pub fn handle_error(peer: &std::net::SocketAddr, err: &SessionError) {
    match err {
        SessionError::Control(_) | SessionError::Transport(TransportError::Aborted { .. }) => {
            error!("Client {}: {}", peer, err)
        }
        _ => warn!("Client {}: {}", peer, err),
    }
}

/// Convert error to FTP response code
pub fn error_to_ftp_code(err: &SessionError) -> u16 {
    match err {
        SessionError::Protocol(ProtocolError::MissingArgument(_)) => ARGUMENT_ERROR,
        SessionError::Protocol(_) => SYNTAX_ERROR,
        SessionError::Auth(AuthError::NoPendingUser) => BAD_SEQUENCE,
        SessionError::Auth(_) => NOT_LOGGED_IN,
        SessionError::Resource(_) => FILE_UNAVAILABLE,
        SessionError::Transport(TransportError::Aborted { .. }) => TRANSFER_ABORTED,
        SessionError::Transport(_) => CANT_OPEN_DATA,
        SessionError::Control(_) => SERVICE_UNAVAILABLE,
    }
}

/// Builds the reply sent for a non-fatal error. Returns `None` when the
/// control channel itself failed and nothing can be written.
pub fn error_to_reply(err: &SessionError) -> Option<Reply> {
    let code = error_to_ftp_code(err);
    let text = match err {
        SessionError::Control(_) => return None,
        SessionError::Protocol(ProtocolError::MissingArgument(_)) => {
            "Syntax error in parameters or arguments."
        }
        SessionError::Protocol(ProtocolError::LineTooLong(_)) => "Command too long.",
        SessionError::Protocol(_) => "Unknown command.",
        SessionError::Auth(AuthError::NotLoggedIn) => "Not logged in.",
        SessionError::Auth(AuthError::LoginIncorrect(_)) => "Login incorrect.",
        SessionError::Auth(AuthError::NoPendingUser) => "Login with USER first.",
        SessionError::Auth(AuthError::HomeUnavailable { .. }) => {
            "Login failed. Cannot access home directory."
        }
        SessionError::Resource(ResourceError::FileNotFound(_)) => "File not found.",
        SessionError::Resource(ResourceError::CannotCreate(_)) => "Cannot create file.",
        SessionError::Resource(ResourceError::DirectoryNotFound(_)) => {
            "Directory not found or access denied."
        }
        SessionError::Resource(ResourceError::AbsolutePath(_)) => "Absolute paths not supported.",
        SessionError::Resource(ResourceError::InvalidName(_)) => "Invalid file name.",
        SessionError::Resource(ResourceError::ListingFailed(_)) => "Failed to list directory.",
        SessionError::Transport(TransportError::NoPassiveEndpoint) => "Use PASV first.",
        SessionError::Transport(TransportError::PassiveSetup(_)) => {
            "Cannot open passive connection."
        }
        SessionError::Transport(TransportError::Aborted { .. }) => {
            "Connection closed; transfer aborted."
        }
        SessionError::Transport(_) => "Cannot open data connection.",
    };
    Some(Reply::new(code, text))
}
