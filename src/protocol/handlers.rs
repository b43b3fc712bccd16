//! Command handlers
//!
//! One `handle_cmd_*` function per supported verb. Each handler writes its
//! own replies on the control channel and returns what it did; failures come
//! back as `SessionError` and are answered by the session loop.
//!
//! Transfer-bearing commands follow a fixed order: login, argument, passive
//! endpoint, local resource, `150`, single accept, stream, `226`. The
//! endpoint is taken out of the session before the resource check, so any
//! failure from that point on drops it without a client ever connecting.

use log::info;
use tokio::fs::File;
use tokio::io::AsyncWrite;

use crate::auth::validate_password;
use crate::error::{AuthError, ProtocolError, ResourceError, SessionError, TransportError};
use crate::middleware::Direction;
use crate::navigate::{VirtualPath, change_directory, resolve_file};
use crate::protocol::responses::*;
use crate::protocol::{Command, CommandResult};
use crate::session::Connection;
use crate::transfer::{
    PassiveEndpoint, read_listing, receive_file, send_file, send_listing,
};

type HandlerResult = Result<CommandResult, SessionError>;

/// Dispatches a parsed command to its handler.
pub async fn handle_command<W>(conn: &mut Connection<W>, command: Command) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    if command.requires_login() && !conn.session.is_logged_in() {
        return Err(AuthError::NotLoggedIn.into());
    }

    match command {
        Command::USER(username) => handle_cmd_user(conn, &username).await,
        Command::PASS(password) => handle_cmd_pass(conn, &password).await,
        Command::PWD => handle_cmd_pwd(conn).await,
        Command::CWD(path) => handle_cmd_cwd(conn, &path).await,
        Command::PASV => handle_cmd_pasv(conn).await,
        Command::LIST => handle_cmd_list(conn).await,
        Command::RETR(filename) => handle_cmd_retr(conn, &filename).await,
        Command::STOR(filename) => handle_cmd_stor(conn, &filename).await,
        Command::SYST => reply(conn, SYSTEM_TYPE, "UNIX Type: L8").await,
        Command::TYPE(_) => reply(conn, OK, "Type set to I").await,
        Command::NOOP => reply(conn, OK, "OK").await,
        Command::QUIT => handle_cmd_quit(conn).await,
        Command::UNKNOWN(verb) if verb.is_empty() => Err(ProtocolError::EmptyLine.into()),
        Command::UNKNOWN(verb) => Err(ProtocolError::UnknownCommand(verb).into()),
    }
}

async fn reply<W>(conn: &mut Connection<W>, code: u16, text: &str) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    conn.control.reply(code, text).await?;
    Ok(CommandResult::replied(code))
}

fn require_argument<'a>(arg: &'a str, verb: &'static str) -> Result<&'a str, SessionError> {
    if arg.is_empty() {
        Err(ProtocolError::MissingArgument(verb).into())
    } else {
        Ok(arg)
    }
}

fn current_dir<W>(conn: &Connection<W>) -> Result<VirtualPath, SessionError> {
    conn.session
        .cwd()
        .cloned()
        .ok_or_else(|| AuthError::NotLoggedIn.into())
}

fn take_endpoint<W>(conn: &mut Connection<W>) -> Result<PassiveEndpoint, SessionError> {
    conn.session
        .take_passive()
        .ok_or_else(|| TransportError::NoPassiveEndpoint.into())
}

/// Handles the QUIT command: closes the session after the goodbye.
async fn handle_cmd_quit<W>(conn: &mut Connection<W>) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    conn.control.reply(GOODBYE, "Goodbye.").await?;
    conn.session.close();
    Ok(CommandResult::close(GOODBYE))
}

/// Handles the USER command: (re)starts login with a pending username.
///
/// Any username is accepted here; it is only checked together with PASS.
async fn handle_cmd_user<W>(conn: &mut Connection<W>, username: &str) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let username = require_argument(username, "USER")?;
    conn.session.begin_login(username);
    reply(conn, PASSWORD_REQUIRED, "Username OK, need password.").await
}

/// Handles the PASS command: validates the pending username's password and
/// binds the session to the user's home directory.
async fn handle_cmd_pass<W>(conn: &mut Connection<W>, password: &str) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let username = conn
        .session
        .pending_user()
        .map(str::to_string)
        .ok_or(AuthError::NoPendingUser)?;

    let home = match validate_password(&conn.context.credentials, &username, password) {
        Ok(credential) => credential.home_dir.clone(),
        Err(e) => {
            conn.session.reset_login();
            return Err(e.into());
        }
    };

    if let Err(source) = tokio::fs::create_dir_all(&home).await {
        conn.session.reset_login();
        return Err(AuthError::HomeUnavailable {
            username,
            path: home,
            source,
        }
        .into());
    }

    conn.session.complete_login(VirtualPath::new(&username, home));
    info!("User {} logged in from {}", username, conn.session.peer());
    reply(conn, LOGIN_SUCCESS, "User logged in.").await
}

/// Handles the PWD command: replies with the quoted virtual path.
async fn handle_cmd_pwd<W>(conn: &mut Connection<W>) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let cwd = current_dir(conn)?;
    let text = format!("\"{}\" is current directory.", cwd);
    reply(conn, PATHNAME, &text).await
}

/// Handles the CWD command: `..` climbs one level (never above home), any
/// other relative path descends into an existing directory.
async fn handle_cmd_cwd<W>(conn: &mut Connection<W>, path: &str) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let path = require_argument(path, "CWD")?;
    let next = change_directory(&current_dir(conn)?, path).await?;
    info!("Client {} changed directory to {}", conn.session.peer(), next);
    conn.session.set_cwd(next);
    reply(conn, FILE_ACTION_OK, "Directory changed.").await
}

/// Handles the PASV command: replaces any pending endpoint with a fresh
/// listener and advertises it.
async fn handle_cmd_pasv<W>(conn: &mut Connection<W>) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    conn.session.discard_passive();

    let endpoint =
        PassiveEndpoint::open(conn.session.advertised_ip()).map_err(TransportError::PassiveSetup)?;
    let text = endpoint.reply_text();
    info!(
        "Client {} passive endpoint on port {}",
        conn.session.peer(),
        endpoint.port()
    );
    conn.session.install_passive(endpoint);
    reply(conn, ENTERING_PASSIVE, &text).await
}

/// Handles the LIST command: sends one line per entry of the current
/// directory over the data channel.
async fn handle_cmd_list<W>(conn: &mut Connection<W>) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let endpoint = take_endpoint(conn)?;
    let dir = current_dir(conn)?.real_path();
    let lines = read_listing(&dir)
        .await
        .map_err(ResourceError::ListingFailed)?;

    conn.control
        .reply(OPENING_DATA, "Opening ASCII mode data connection for file list")
        .await?;
    let (mut data_stream, _) = endpoint.accept().await.map_err(TransportError::Accept)?;
    let result = send_listing(&mut data_stream, &lines).await?;
    drop(data_stream);

    conn.context.audit.record_transfer(Direction::Sent, result.bytes);
    conn.control.reply(TRANSFER_COMPLETE, "Directory send OK.").await?;
    Ok(CommandResult::transferred(TRANSFER_COMPLETE, result))
}

/// Handles the RETR command: the file is opened before the data connection
/// is accepted, so a missing file never costs the client a dial.
async fn handle_cmd_retr<W>(conn: &mut Connection<W>, filename: &str) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let filename = require_argument(filename, "RETR")?;
    let endpoint = take_endpoint(conn)?;

    let path = resolve_file(&current_dir(conn)?, filename).await?;
    let not_found = || ResourceError::FileNotFound(filename.to_string());
    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => return Err(not_found().into()),
    }
    let mut file = File::open(&path).await.map_err(|_| not_found())?;

    conn.control
        .reply(OPENING_DATA, "Opening BINARY mode data connection")
        .await?;
    let (mut data_stream, peer) = endpoint.accept().await.map_err(TransportError::Accept)?;
    info!("Sending {} to {}", path.display(), peer);
    let result = send_file(&mut file, &mut data_stream, conn.context.buffer_size).await?;
    drop(data_stream);

    conn.context.audit.record_transfer(Direction::Sent, result.bytes);
    conn.control.reply(TRANSFER_COMPLETE, "Transfer complete.").await?;
    Ok(CommandResult::transferred(TRANSFER_COMPLETE, result))
}

/// Handles the STOR command: the destination is created before the data
/// connection is accepted, then everything the client sends until it closes
/// is written to it.
async fn handle_cmd_stor<W>(conn: &mut Connection<W>, filename: &str) -> HandlerResult
where
    W: AsyncWrite + Unpin,
{
    let filename = require_argument(filename, "STOR")?;
    let endpoint = take_endpoint(conn)?;

    let path = resolve_file(&current_dir(conn)?, filename).await?;
    let mut file = File::create(&path)
        .await
        .map_err(|_| ResourceError::CannotCreate(filename.to_string()))?;

    conn.control
        .reply(OPENING_DATA, "Opening BINARY mode data connection")
        .await?;
    let (mut data_stream, peer) = endpoint.accept().await.map_err(TransportError::Accept)?;
    info!("Receiving {} from {}", path.display(), peer);
    let result = receive_file(&mut data_stream, &mut file, conn.context.buffer_size).await?;
    drop(data_stream);

    conn.context
        .audit
        .record_transfer(Direction::Received, result.bytes);
    conn.control.reply(TRANSFER_COMPLETE, "Transfer complete.").await?;
    Ok(CommandResult::transferred(TRANSFER_COMPLETE, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialStore};
    use crate::middleware::AuditLog;
    use crate::session::{ControlChannel, Session, SessionContext};
    use std::net::Ipv4Addr;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn connection(home: &Path) -> Connection<Vec<u8>> {
        let context = SessionContext {
            credentials: CredentialStore::from_records([Credential {
                username: "test".into(),
                password: "test123".into(),
                home_dir: home.to_path_buf(),
            }]),
            audit: AuditLog::disabled(),
            buffer_size: 4,
            max_command_length: 512,
            passive_address: Some(Ipv4Addr::LOCALHOST),
        };
        let peer = "127.0.0.1:41000".parse().unwrap();
        Connection {
            session: Session::new(peer, Ipv4Addr::LOCALHOST),
            control: ControlChannel::new(Vec::new(), peer),
            context: Arc::new(context),
        }
    }

    async fn logged_in(home: &Path) -> Connection<Vec<u8>> {
        let mut conn = connection(home);
        handle_command(&mut conn, Command::USER("test".into())).await.unwrap();
        handle_command(&mut conn, Command::PASS("test123".into())).await.unwrap();
        conn
    }

    async fn pasv_port(conn: &mut Connection<Vec<u8>>) -> u16 {
        handle_command(conn, Command::PASV).await.unwrap();
        conn.session.passive_port().unwrap()
    }

    #[tokio::test]
    async fn transfer_commands_require_login() {
        let tmp = tempfile::tempdir().unwrap();
        let mut conn = connection(tmp.path());
        for command in [
            Command::PWD,
            Command::CWD("x".into()),
            Command::PASV,
            Command::LIST,
            Command::RETR("a".into()),
            Command::STOR("a".into()),
        ] {
            let err = handle_command(&mut conn, command).await.unwrap_err();
            assert!(matches!(err, SessionError::Auth(AuthError::NotLoggedIn)));
        }
        assert!(!conn.session.has_passive());
        assert!(conn.control_output().is_empty());
    }

    #[tokio::test]
    async fn pass_creates_missing_home() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("ftp").join("test");
        let conn = logged_in(&home).await;
        assert!(home.is_dir());
        assert_eq!(conn.session.cwd().unwrap().to_string(), "/test");
    }

    #[tokio::test]
    async fn missing_file_discards_endpoint_before_any_dial() {
        let tmp = tempfile::tempdir().unwrap();
        let mut conn = logged_in(tmp.path()).await;
        let port = pasv_port(&mut conn).await;

        let err = handle_command(&mut conn, Command::RETR("missing.txt".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Resource(ResourceError::FileNotFound(_))));
        assert!(!conn.session.has_passive());
        assert!(TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_err());
        assert!(!conn.control_output().contains("150"));
    }

    #[tokio::test]
    async fn retr_of_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let mut conn = logged_in(tmp.path()).await;
        pasv_port(&mut conn).await;

        let err = handle_command(&mut conn, Command::RETR("sub".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Resource(ResourceError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn stor_rejects_names_escaping_home() {
        let tmp = tempfile::tempdir().unwrap();
        let mut conn = logged_in(tmp.path()).await;
        pasv_port(&mut conn).await;

        let err = handle_command(&mut conn, Command::STOR("../evil.txt".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Resource(ResourceError::InvalidName(_))));
        assert!(!conn.session.has_passive());
    }

    #[tokio::test]
    async fn stor_then_retr_over_loopback() {
        let tmp = tempfile::tempdir().unwrap();
        let mut conn = logged_in(tmp.path()).await;

        let port = pasv_port(&mut conn).await;
        let client = tokio::spawn(async move {
            let mut data = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
            data.write_all(b"hello world").await.unwrap();
        });
        let result = handle_command(&mut conn, Command::STOR("a.txt".into()))
            .await
            .unwrap();
        client.await.unwrap();
        assert_eq!(result.transfer.unwrap().bytes, 11);
        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"hello world");

        let port = pasv_port(&mut conn).await;
        let client = tokio::spawn(async move {
            let mut data = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
            let mut received = Vec::new();
            data.read_to_end(&mut received).await.unwrap();
            received
        });
        let result = handle_command(&mut conn, Command::RETR("a.txt".into()))
            .await
            .unwrap();
        assert_eq!(client.await.unwrap(), b"hello world");
        assert_eq!(result.code, TRANSFER_COMPLETE);

        let output = conn.control_output();
        assert!(output.contains("150 Opening BINARY mode data connection\r\n226 Transfer complete.\r\n"));
        assert_eq!(conn.context.audit.stats().bytes_received, 11);
        assert_eq!(conn.context.audit.stats().bytes_sent, 11);
    }

    #[tokio::test]
    async fn list_sends_directory_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"abc").unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        let mut conn = logged_in(tmp.path()).await;

        let port = pasv_port(&mut conn).await;
        let client = tokio::spawn(async move {
            let mut data = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
            let mut listing = String::new();
            data.read_to_string(&mut listing).await.unwrap();
            listing
        });
        handle_command(&mut conn, Command::LIST).await.unwrap();

        let listing = client.await.unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('d') && lines[0].ends_with(" docs"));
        assert!(lines[1].starts_with('-') && lines[1].ends_with(" notes.txt"));
        assert!(conn.control_output().ends_with("226 Directory send OK.\r\n"));
    }

    impl Connection<Vec<u8>> {
        fn control_output(&self) -> String {
            String::from_utf8(self.control.get_ref().clone()).unwrap()
        }
    }
}
