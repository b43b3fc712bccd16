use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::middleware::{Admission, AuditLog};
use crate::protocol::Reply;
use crate::protocol::responses::SERVICE_UNAVAILABLE;
use crate::session::{SessionContext, handle_connection};

pub struct Server {
    listener: TcpListener,
    context: Arc<SessionContext>,
    admission: Admission,
}

impl Server {
    /// Loads the credential store, opens the audit log and binds the control
    /// listener.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let server_root = config.server_root_path();
        if let Err(e) = std::fs::create_dir_all(&server_root) {
            warn!("Failed to create server root directory: {}", e);
        } else {
            info!("Server root directory: {}", server_root.display());
        }

        let credentials = CredentialStore::load_or_seed(config.users_file_path(), &server_root)?;
        if credentials.is_empty() {
            warn!("No users configured; every login will fail");
        }

        let audit = match config.audit_log_path() {
            Some(path) => AuditLog::open(path).map_err(|source| ServerError::AuditLog {
                path: path.to_path_buf(),
                source,
            })?,
            None => AuditLog::disabled(),
        };

        let addr = config.control_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server bound to {}", addr);

        Ok(Self {
            listener,
            context: Arc::new(SessionContext::new(config, credentials, audit)),
            admission: Admission::new(config.max_clients),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts control connections until the listener fails. Each admitted
    /// connection runs in its own task.
    pub async fn run(self) -> io::Result<()> {
        info!(
            "Starting FTP server on {} (max {} clients)",
            self.local_addr()?,
            self.admission.limit()
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    continue;
                }
            };

            let Some(permit) = self.admission.try_admit() else {
                warn!("Rejecting {}: {} clients connected", peer, self.admission.active());
                tokio::spawn(reject_connection(stream, peer));
                continue;
            };

            info!("New client connected: {}", peer);
            let context = Arc::clone(&self.context);
            tokio::spawn(async move {
                handle_connection(stream, peer, context).await;
                drop(permit);
            });
        }
    }
}

/// Tells an over-capacity client to come back later and hangs up.
async fn reject_connection(mut stream: TcpStream, peer: SocketAddr) {
    let reply = Reply::new(SERVICE_UNAVAILABLE, "Too many connections. Try again later.");
    if let Err(e) = stream.write_all(reply.to_line().as_bytes()).await {
        warn!("Failed to notify rejected client {}: {}", peer, e);
    }
    let _ = stream.shutdown().await;
}
