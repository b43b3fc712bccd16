//! Shared, read-only collaborators handed to every session.

use std::net::Ipv4Addr;

use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::middleware::AuditLog;

#[derive(Debug)]
pub struct SessionContext {
    pub credentials: CredentialStore,
    pub audit: AuditLog,
    pub buffer_size: usize,
    pub max_command_length: usize,
    /// Overrides the address advertised in 227 replies.
    pub passive_address: Option<Ipv4Addr>,
}

impl SessionContext {
    pub fn new(config: &ServerConfig, credentials: CredentialStore, audit: AuditLog) -> Self {
        Self {
            credentials,
            audit,
            buffer_size: config.buffer_size,
            max_command_length: config.max_command_length,
            passive_address: config.passive_ip(),
        }
    }
}
