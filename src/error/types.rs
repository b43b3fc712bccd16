//! Error types
//!
//! Defines domain-specific error types for each layer of the FTP engine.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::Reply;

/// Malformed or unknown protocol lines, on either side of the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty command line")]
    EmptyLine,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("command line too long ({0} bytes)")]
    LineTooLong(usize),
    #[error("malformed reply line: {0:?}")]
    MalformedReply(String),
    #[error("malformed passive address: {0:?}")]
    MalformedPassiveAddress(String),
}

/// Authentication module errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not logged in")]
    NotLoggedIn,
    #[error("login incorrect for user {0}")]
    LoginIncorrect(String),
    #[error("PASS received without a pending USER")]
    NoPendingUser,
    #[error("home directory {path} unavailable for {username}: {source}")]
    HomeUnavailable {
        username: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Filesystem-side failures. Any passive endpoint held for the failing
/// command is dropped before the reply goes out.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("cannot create file: {0}")]
    CannotCreate(String),
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("absolute path rejected: {0}")]
    AbsolutePath(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("failed to list directory: {0}")]
    ListingFailed(#[source] io::Error),
}

/// Data channel errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no passive endpoint open")]
    NoPassiveEndpoint,
    #[error("failed to open passive endpoint: {0}")]
    PassiveSetup(#[source] io::Error),
    #[error("failed to accept data connection: {0}")]
    Accept(#[source] io::Error),
    #[error("failed to connect data channel to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("transfer aborted after {bytes} bytes: {source}")]
    Aborted {
        bytes: u64,
        #[source]
        source: io::Error,
    },
}

/// Everything a command handler can fail with.
///
/// Only `Control` is fatal: the control connection itself is gone and the
/// session loop ends. All other variants are answered with a reply code and
/// the session continues.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("control channel failure: {0}")]
    Control(#[from] io::Error),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Control(_))
    }
}

/// Credential store loading errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credential store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to seed credential store {path}: {source}")]
    Seed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Server startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("failed to open audit log {path}: {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind control socket {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Client driver errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("server closed the control connection")]
    ConnectionClosed,
    #[error("expected reply {expected}, got {reply}")]
    UnexpectedReply { expected: u16, reply: Reply },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("transfer of {0} moved zero bytes")]
    EmptyTransfer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_control_failures_are_fatal() {
        let control = SessionError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(control.is_fatal());

        let auth = SessionError::from(AuthError::NotLoggedIn);
        assert!(!auth.is_fatal());

        let transport = SessionError::from(TransportError::NoPassiveEndpoint);
        assert!(!transport.is_fatal());
    }

    #[test]
    fn unexpected_reply_mentions_both_codes() {
        let err = ClientError::UnexpectedReply {
            expected: 226,
            reply: Reply::new(550, "File not found."),
        };
        assert_eq!(err.to_string(), "expected reply 226, got 550 File not found.");
    }
}
