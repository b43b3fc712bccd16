//! ftp-engine
//!
//! Control/data-channel engine for a small FTP service: the server-side
//! session state machine, passive-mode data channels, the streaming transfer
//! engine, and a client driver speaking the same protocol.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod navigate;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transfer;

pub use client::FtpClient;
pub use self::config::ServerConfig;
pub use server::Server;
