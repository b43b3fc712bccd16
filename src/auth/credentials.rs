//! Credential storage and management
//!
//! Loads `username:password[:home_dir]` records from the users file once at
//! startup. The resulting store is read-only and shared by every session.

use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::CredentialError;

/// Records written when the users file does not exist yet.
pub const DEFAULT_USERS: &str = "admin:admin123:ftp/admin\nuser:password:ftp/user\ntest:test123:ftp/test\n";

/// One user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub home_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    records: HashMap<String, Credential>,
}

impl CredentialStore {
    pub fn from_records(records: impl IntoIterator<Item = Credential>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.username.clone(), record))
                .collect(),
        }
    }

    /// Parses the users file format. Relative home directories are resolved
    /// against `base`; a missing home defaults to `ftp/<username>`. Blank
    /// lines and `#` comments are skipped, as are lines without a password
    /// field.
    pub fn parse(contents: &str, base: &Path) -> Self {
        let mut records = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(3, ':');
            let username = fields.next().unwrap_or("").trim();
            let password = fields.next();
            let home = fields.next().map(str::trim).filter(|home| !home.is_empty());

            let Some(password) = password.filter(|_| !username.is_empty()) else {
                warn!("Skipping malformed credential record on line {}", index + 1);
                continue;
            };

            let home_dir = match home {
                Some(home) => PathBuf::from(home.replace('\\', "/")),
                None => Path::new("ftp").join(username),
            };

            records.push(Credential {
                username: username.to_string(),
                password: password.to_string(),
                home_dir: base.join(home_dir),
            });
        }

        Self::from_records(records)
    }

    /// Reads and parses the users file at `path`.
    pub fn load(path: &Path, base: &Path) -> Result<Self, CredentialError> {
        let contents = fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(&contents, base);
        info!("Loaded {} users from {}", store.len(), path.display());
        Ok(store)
    }

    /// Like `load`, but writes `DEFAULT_USERS` first if the file is missing.
    pub fn load_or_seed(path: &Path, base: &Path) -> Result<Self, CredentialError> {
        match fs::metadata(path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let seed_err = |source| CredentialError::Seed {
                    path: path.to_path_buf(),
                    source,
                };
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(seed_err)?;
                }
                fs::write(path, DEFAULT_USERS).map_err(seed_err)?;
                info!("Created default users file {}", path.display());
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        Self::load(path, base)
    }

    pub fn get(&self, username: &str) -> Option<&Credential> {
        self.records.get(username)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
