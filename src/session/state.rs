//! Module `state`
//!
//! Per-connection session state: where the peer is in the login sequence,
//! its virtual working directory once authenticated, and the single passive
//! endpoint it may hold.

use log::debug;
use std::net::{Ipv4Addr, SocketAddr};

use crate::navigate::VirtualPath;
use crate::transfer::PassiveEndpoint;

/// Login progress of one control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    AwaitingPassword { username: String },
    Authenticated { username: String, cwd: VirtualPath },
    Closed,
}

/// State owned by one control connection for its whole lifetime.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    advertised_ip: Ipv4Addr,
    login: LoginState,
    passive: Option<PassiveEndpoint>,
}

impl Session {
    pub fn new(peer: SocketAddr, advertised_ip: Ipv4Addr) -> Self {
        Self {
            peer,
            advertised_ip,
            login: LoginState::Unauthenticated,
            passive: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Address placed in 227 replies.
    pub fn advertised_ip(&self) -> Ipv4Addr {
        self.advertised_ip
    }

    pub fn login_state(&self) -> &LoginState {
        &self.login
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.login, LoginState::Authenticated { .. })
    }

    pub fn is_closed(&self) -> bool {
        self.login == LoginState::Closed
    }

    /// Authenticated username, if any.
    pub fn username(&self) -> Option<&str> {
        match &self.login {
            LoginState::Authenticated { username, .. } => Some(username),
            _ => None,
        }
    }

    /// Username given by USER and still waiting for PASS.
    pub fn pending_user(&self) -> Option<&str> {
        match &self.login {
            LoginState::AwaitingPassword { username } => Some(username),
            _ => None,
        }
    }

    pub fn cwd(&self) -> Option<&VirtualPath> {
        match &self.login {
            LoginState::Authenticated { cwd, .. } => Some(cwd),
            _ => None,
        }
    }

    /// Replaces the working directory. Ignored unless authenticated.
    pub fn set_cwd(&mut self, next: VirtualPath) {
        if let LoginState::Authenticated { cwd, .. } = &mut self.login {
            *cwd = next;
        }
    }

    /// USER restarts the login sequence from any open state.
    pub fn begin_login(&mut self, username: &str) {
        if self.is_closed() {
            return;
        }
        self.discard_passive();
        self.login = LoginState::AwaitingPassword {
            username: username.to_string(),
        };
    }

    /// Moves a pending login to `Authenticated`. Returns false when no USER
    /// was pending.
    pub fn complete_login(&mut self, cwd: VirtualPath) -> bool {
        match std::mem::replace(&mut self.login, LoginState::Unauthenticated) {
            LoginState::AwaitingPassword { username } => {
                self.login = LoginState::Authenticated { username, cwd };
                true
            }
            other => {
                self.login = other;
                false
            }
        }
    }

    pub fn reset_login(&mut self) {
        if !self.is_closed() {
            self.login = LoginState::Unauthenticated;
        }
    }

    pub fn close(&mut self) {
        self.discard_passive();
        self.login = LoginState::Closed;
    }

    // --------------------
    // Passive endpoint slot
    // --------------------

    pub fn has_passive(&self) -> bool {
        self.passive.is_some()
    }

    pub fn passive_port(&self) -> Option<u16> {
        self.passive.as_ref().map(PassiveEndpoint::port)
    }

    /// Stores a freshly opened endpoint, closing any unconsumed one first.
    pub fn install_passive(&mut self, endpoint: PassiveEndpoint) {
        self.discard_passive();
        self.passive = Some(endpoint);
    }

    /// Hands the endpoint to the transfer command that consumes it.
    pub fn take_passive(&mut self) -> Option<PassiveEndpoint> {
        self.passive.take()
    }

    /// Closes the held endpoint, if any. Returns whether one was open.
    pub fn discard_passive(&mut self) -> bool {
        match self.passive.take() {
            Some(endpoint) => {
                debug!(
                    "Client {}: closing unused passive endpoint on port {}",
                    self.peer,
                    endpoint.port()
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("127.0.0.1:50000".parse().unwrap(), Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn login_sequence() {
        let mut session = session();
        assert_eq!(session.login_state(), &LoginState::Unauthenticated);

        session.begin_login("test");
        assert_eq!(session.pending_user(), Some("test"));
        assert!(!session.is_logged_in());

        assert!(session.complete_login(VirtualPath::new("test", "/srv/ftp/test")));
        assert!(session.is_logged_in());
        assert_eq!(session.username(), Some("test"));
        assert_eq!(session.cwd().unwrap().to_string(), "/test");
    }

    #[test]
    fn complete_login_requires_pending_user() {
        let mut session = session();
        assert!(!session.complete_login(VirtualPath::new("test", "/srv")));
        assert_eq!(session.login_state(), &LoginState::Unauthenticated);
    }

    #[test]
    fn user_restarts_login_from_authenticated() {
        let mut session = session();
        session.begin_login("test");
        session.complete_login(VirtualPath::new("test", "/srv"));
        session.begin_login("admin");
        assert!(!session.is_logged_in());
        assert_eq!(session.pending_user(), Some("admin"));
    }

    #[test]
    fn closed_is_terminal() {
        let mut session = session();
        session.close();
        session.begin_login("test");
        session.reset_login();
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn at_most_one_passive_endpoint() {
        let mut session = session();
        let first = PassiveEndpoint::open(Ipv4Addr::LOCALHOST).unwrap();
        let first_port = first.port();
        session.install_passive(first);

        let second = PassiveEndpoint::open(Ipv4Addr::LOCALHOST).unwrap();
        let second_port = second.port();
        session.install_passive(second);

        assert_ne!(first_port, second_port);
        assert!(
            tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, first_port))
                .await
                .is_err()
        );
        assert_eq!(session.take_passive().unwrap().port(), second_port);
        assert!(!session.has_passive());
        assert!(!session.discard_passive());
    }
}
