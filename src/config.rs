//! Configuration management for the FTP engine
//!
//! Built-in defaults are layered under an optional TOML file and `FTP_ENGINE`
//! environment variables (`FTP_ENGINE__CONTROL_PORT=2121`). Everything is
//! read once at startup.

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Config file looked up when no path is given; it may be absent.
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the control listener binds to
    pub bind_address: String,

    /// Port for the control connection; 0 picks an ephemeral port
    pub control_port: u16,

    /// IPv4 address advertised in 227 replies. Unset means the local
    /// address of each control connection.
    pub passive_address: Option<String>,

    /// Base directory for relative home directories
    pub server_root: String,

    /// `username:password[:home_dir]` records, created if missing
    pub users_file: String,

    /// Append-only audit trail; empty disables the file sink
    pub audit_log: String,

    /// Chunk size for file transfers
    pub buffer_size: usize,

    /// Maximum concurrent control connections
    pub max_clients: usize,

    /// Maximum FTP command length
    pub max_command_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            control_port: 2121,
            passive_address: None,
            server_root: ".".into(),
            users_file: "config/users.txt".into(),
            audit_log: "logs/ftp_server.log".into(),
            buffer_size: 8192,
            max_clients: 64,
            max_command_length: 512,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `path` (or the optional default file) with
    /// environment overrides, then validates it.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("control_port", i64::from(defaults.control_port))?
            .set_default("server_root", defaults.server_root)?
            .set_default("users_file", defaults.users_file)?
            .set_default("audit_log", defaults.audit_log)?
            .set_default("buffer_size", defaults.buffer_size as i64)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("FTP_ENGINE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::Message(format!(
                "bind_address {:?} is not an IP address",
                self.bind_address
            )));
        }

        if let Some(addr) = &self.passive_address {
            if addr.parse::<Ipv4Addr>().is_err() {
                return Err(ConfigError::Message(format!(
                    "passive_address {:?} is not an IPv4 address",
                    addr
                )));
            }
        }

        if self.server_root.is_empty() {
            return Err(ConfigError::Message("server_root cannot be empty".into()));
        }

        if self.users_file.is_empty() {
            return Err(ConfigError::Message("users_file cannot be empty".into()));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// Parsed passive address override, if configured.
    pub fn passive_ip(&self) -> Option<Ipv4Addr> {
        self.passive_address.as_deref().and_then(|addr| addr.parse().ok())
    }

    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    /// Users file, relative paths resolved against the working directory.
    pub fn users_file_path(&self) -> &Path {
        Path::new(&self.users_file)
    }

    pub fn audit_log_path(&self) -> Option<&Path> {
        (!self.audit_log.is_empty()).then(|| Path::new(&self.audit_log))
    }
}
