use log::{debug, error, info};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{ProtocolError, SessionError, error_to_ftp_code, error_to_reply, handle_error};
use crate::middleware::AuditEntry;
use crate::protocol::responses::READY;
use crate::protocol::{CommandStatus, Reply, handle_command, parse_command};
use crate::session::{Session, SessionContext};

/// Write side of the control connection.
#[derive(Debug)]
pub struct ControlChannel<W> {
    writer: W,
    peer: SocketAddr,
}

impl<W: AsyncWrite + Unpin> ControlChannel<W> {
    pub fn new(writer: W, peer: SocketAddr) -> Self {
        Self { writer, peer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Writes one reply line and flushes it.
    pub async fn send(&mut self, reply: &Reply) -> io::Result<()> {
        debug!("Sending response to client {}: {}", self.peer, reply);
        self.writer.write_all(reply.to_line().as_bytes()).await?;
        self.writer.flush().await
    }

    pub async fn reply(&mut self, code: u16, text: impl Into<String>) -> io::Result<()> {
        self.send(&Reply::new(code, text)).await
    }
}

/// Everything a command handler works on.
pub struct Connection<W> {
    pub session: Session,
    pub control: ControlChannel<W>,
    pub context: Arc<SessionContext>,
}

enum CommandLine {
    Line(String),
    TooLong(usize),
    Eof,
}

/// Reads one command line of at most `limit` bytes. Longer lines are drained
/// up to their terminator and reported as `TooLong`.
async fn read_command_line<R>(reader: &mut R, limit: usize) -> io::Result<CommandLine>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit as u64).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(CommandLine::Eof);
    }
    if buf.ends_with(b"\n") || n < limit {
        return Ok(CommandLine::Line(String::from_utf8_lossy(&buf).into_owned()));
    }

    let mut total = n;
    loop {
        buf.clear();
        let n = (&mut *reader).take(limit as u64).read_until(b'\n', &mut buf).await?;
        total += n;
        if n == 0 || buf.ends_with(b"\n") {
            return Ok(CommandLine::TooLong(total));
        }
    }
}

/// Drives one control connection from greeting to close.
///
/// Commands are handled strictly one after another. Handler errors are
/// answered with their reply code and the loop keeps going; only loss of the
/// control channel or QUIT ends it. Any passive endpoint still held is closed
/// on the way out.
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    peer: SocketAddr,
    advertised_ip: Ipv4Addr,
    context: Arc<SessionContext>,
) -> Session
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    // Terminator counts towards the read limit
    let limit = context.max_command_length + 2;
    let mut conn = Connection {
        session: Session::new(peer, advertised_ip),
        control: ControlChannel::new(writer, peer),
        context,
    };

    if let Err(e) = conn.control.reply(READY, "FTP Server Ready.").await {
        error!("Failed to greet {}: {}", peer, e);
        conn.session.close();
        return conn.session;
    }

    loop {
        let line = match read_command_line(&mut reader, limit).await {
            Ok(CommandLine::Line(line)) => line,
            Ok(CommandLine::TooLong(len)) => {
                let err = SessionError::from(ProtocolError::LineTooLong(len));
                if !answer_error(&mut conn, "UNKNOWN", &err, Instant::now()).await {
                    break;
                }
                continue;
            }
            Ok(CommandLine::Eof) => {
                info!("Connection closed by client {}", peer);
                break;
            }
            Err(e) => {
                error!("Failed to read from {}: {}", peer, e);
                break;
            }
        };

        let started = Instant::now();
        let command = parse_command(&line);
        let verb = command.verb().to_string();
        info!("Received from {}: {}", peer, verb);

        match handle_command(&mut conn, command).await {
            Ok(result) => {
                conn.context.audit.record(&AuditEntry {
                    peer,
                    command: &verb,
                    code: result.code,
                    duration: started.elapsed(),
                    size: result.transfer.map_or(0, |t| t.bytes),
                });
                if result.status == CommandStatus::CloseConnection {
                    info!("Client {} requested to quit", peer);
                    break;
                }
            }
            Err(err) => {
                if !answer_error(&mut conn, &verb, &err, started).await {
                    break;
                }
            }
        }
    }

    conn.session.close();
    info!("Client {} disconnected", peer);
    conn.session
}

/// Logs, replies to and audits a failed command. Returns false when the
/// session cannot continue.
async fn answer_error<W>(
    conn: &mut Connection<W>,
    verb: &str,
    err: &SessionError,
    started: Instant,
) -> bool
where
    W: AsyncWrite + Unpin,
{
    let peer = conn.session.peer();
    handle_error(&peer, err);

    let mut alive = !err.is_fatal();
    if let Some(reply) = error_to_reply(err) {
        if let Err(e) = conn.control.send(&reply).await {
            error!("Failed to reply to {}: {}", peer, e);
            alive = false;
        }
    }

    conn.context.audit.record(&AuditEntry {
        peer,
        command: verb,
        code: error_to_ftp_code(err),
        duration: started.elapsed(),
        size: 0,
    });
    alive
}

/// The address advertised in 227 replies: the configured override, else the
/// local IPv4 address the client reached us on, else loopback.
fn advertised_ip(context: &SessionContext, stream: &TcpStream) -> Ipv4Addr {
    if let Some(ip) = context.passive_address {
        return ip;
    }
    match stream.local_addr() {
        Ok(SocketAddr::V4(addr)) if !addr.ip().is_unspecified() => *addr.ip(),
        Ok(SocketAddr::V6(addr)) => match addr.ip().to_ipv4_mapped() {
            Some(ip) if !ip.is_unspecified() => ip,
            _ => Ipv4Addr::LOCALHOST,
        },
        _ => Ipv4Addr::LOCALHOST,
    }
}

/// Serves one accepted control connection.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, context: Arc<SessionContext>) {
    let advertised = advertised_ip(&context, &stream);
    debug!("Client {} gets passive address {}", peer, IpAddr::V4(advertised));

    let (read_half, write_half) = stream.into_split();
    run_session(read_half, write_half, peer, advertised, context).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialStore};
    use crate::middleware::AuditLog;
    use crate::session::LoginState;
    use std::path::Path;

    fn context(home: &Path) -> Arc<SessionContext> {
        Arc::new(SessionContext {
            credentials: CredentialStore::from_records([Credential {
                username: "test".into(),
                password: "test123".into(),
                home_dir: home.to_path_buf(),
            }]),
            audit: AuditLog::disabled(),
            buffer_size: 1024,
            max_command_length: 64,
            passive_address: Some(Ipv4Addr::LOCALHOST),
        })
    }

    async fn run_script(script: &str, home: &Path) -> (Vec<String>, Session) {
        let mut output = Vec::new();
        let session = run_session(
            script.as_bytes(),
            &mut output,
            "127.0.0.1:45000".parse().unwrap(),
            Ipv4Addr::LOCALHOST,
            context(home),
        )
        .await;
        let text = String::from_utf8(output).unwrap();
        (text.lines().map(str::to_string).collect(), session)
    }

    fn codes(lines: &[String]) -> Vec<&str> {
        lines.iter().map(|line| &line[..3]).collect()
    }

    #[tokio::test]
    async fn bad_password_keeps_session_unauthenticated() {
        let tmp = tempfile::tempdir().unwrap();
        let (lines, session) = run_script(
            "USER test\r\nPASS wrong\r\nPWD\r\nFOO\r\nQUIT\r\n",
            tmp.path(),
        )
        .await;

        assert_eq!(codes(&lines), ["220", "331", "530", "530", "500", "221"]);
        assert_eq!(lines[0], "220 FTP Server Ready.");
        assert_eq!(lines[2], "530 Login incorrect.");
        assert_eq!(lines[3], "530 Not logged in.");
        assert_eq!(session.login_state(), &LoginState::Closed);
    }

    #[tokio::test]
    async fn login_then_navigate() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("test");
        std::fs::create_dir_all(home.join("docs")).unwrap();

        let script = "user test\r\npass test123\r\nxpwd\r\nCWD docs\r\nPWD\r\nCWD ..\r\nCWD ..\r\nPWD\r\nCWD /etc\r\nSYST\r\nTYPE I\r\nNOOP\r\n";
        let (lines, _) = run_script(script, &home).await;

        assert_eq!(
            lines,
            [
                "220 FTP Server Ready.",
                "331 Username OK, need password.",
                "230 User logged in.",
                "257 \"/test\" is current directory.",
                "250 Directory changed.",
                "257 \"/test/docs\" is current directory.",
                "250 Directory changed.",
                "250 Directory changed.",
                "257 \"/test\" is current directory.",
                "550 Absolute paths not supported.",
                "215 UNIX Type: L8",
                "200 Type set to I",
                "200 OK",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_verbs_rejected_in_every_state() {
        let tmp = tempfile::tempdir().unwrap();
        let (lines, _) = run_script(
            "HELO\r\nUSER test\r\nHELO\r\nPASS test123\r\nHELO\r\n\r\n",
            tmp.path(),
        )
        .await;
        assert_eq!(codes(&lines), ["220", "500", "331", "500", "230", "500", "500"]);
    }

    #[tokio::test]
    async fn pass_without_user_is_out_of_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let (lines, _) = run_script("PASS test123\r\nUSER\r\n", tmp.path()).await;
        assert_eq!(lines[1], "503 Login with USER first.");
        assert_eq!(lines[2], "501 Syntax error in parameters or arguments.");
    }

    #[tokio::test]
    async fn overlong_line_is_rejected_and_session_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let script = format!("USER {}\r\nNOOP\r\n", "x".repeat(200));
        let (lines, _) = run_script(&script, tmp.path()).await;
        assert_eq!(lines, ["220 FTP Server Ready.", "500 Command too long.", "200 OK"]);
    }

    #[tokio::test]
    async fn transfer_without_passive_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let (lines, _) = run_script(
            "USER test\r\nPASS test123\r\nRETR missing.txt\r\nLIST\r\n",
            tmp.path(),
        )
        .await;
        assert_eq!(lines[3], "425 Use PASV first.");
        assert_eq!(lines[4], "425 Use PASV first.");
    }

    #[tokio::test]
    async fn eof_closes_session_and_passive_endpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let (lines, session) =
            run_script("USER test\r\nPASS test123\r\nPASV\r\n", tmp.path()).await;

        assert!(lines[3].starts_with("227 Entering Passive Mode (127,0,0,1,"));
        assert!(session.is_closed());
        assert!(!session.has_passive());
    }
}
