//! Module `driver`
//!
//! `FtpClient` drives the server from the initiating side: one command in
//! flight at a time, replies read with multi-line continuation support, and
//! every data transfer preceded by its own PASV negotiation.

use log::{debug, info};
use std::net::{SocketAddr, SocketAddrV4};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{ClientError, ProtocolError, TransportError};
use crate::protocol::responses::*;
use crate::protocol::{Reply, ReplyLine, parse_reply_line};
use crate::transfer::{DEFAULT_BUFFER_SIZE, TransferResult, decode_pasv_tuple, receive_file, send_file};

type ClientResult<T> = Result<T, ClientError>;

fn expect_code(reply: Reply, expected: u16) -> ClientResult<Reply> {
    if reply.code == expected {
        Ok(reply)
    } else {
        Err(ClientError::UnexpectedReply { expected, reply })
    }
}

/// Control connection to an FTP server.
#[derive(Debug)]
pub struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    server: SocketAddr,
    greeting: Reply,
    last_passive: Option<SocketAddrV4>,
    buffer_size: usize,
}

impl FtpClient {
    /// Connects and waits for the 220 greeting.
    pub async fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        let server = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            server,
            greeting: Reply::new(0, ""),
            last_passive: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        };
        client.greeting = expect_code(client.read_reply().await?, READY)?;
        info!("Connected to {}: {}", server, client.greeting);
        Ok(client)
    }

    pub fn greeting(&self) -> &Reply {
        &self.greeting
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Address from the most recent 227 reply.
    pub fn last_passive(&self) -> Option<SocketAddrV4> {
        self.last_passive
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size.max(1);
    }

    /// Writes one command line.
    pub async fn send_command(&mut self, line: &str) -> ClientResult<()> {
        if line.get(..4).is_some_and(|verb| verb.eq_ignore_ascii_case("PASS")) {
            debug!("-> PASS ****");
        } else {
            debug!("-> {}", line);
        }
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> ClientResult<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(line)
    }

    /// Reads one complete reply. A `ddd-` line opens a multi-line reply that
    /// runs until a `ddd ` line with the same code; the texts are joined with
    /// newlines.
    pub async fn read_reply(&mut self) -> ClientResult<Reply> {
        let line = self.read_line().await?;
        let (code, mut text) = match parse_reply_line(&line)? {
            ReplyLine::Final(reply) => {
                debug!("<- {}", reply);
                return Ok(reply);
            }
            ReplyLine::Continuation { code, text } => (code, text),
            ReplyLine::Text(text) => return Err(ProtocolError::MalformedReply(text).into()),
        };

        loop {
            let line = self.read_line().await?;
            match parse_reply_line(&line)? {
                ReplyLine::Final(reply) if reply.code == code => {
                    text.push('\n');
                    text.push_str(&reply.text);
                    let reply = Reply::new(code, text);
                    debug!("<- {}", reply);
                    return Ok(reply);
                }
                ReplyLine::Final(reply) => {
                    text.push('\n');
                    text.push_str(&reply.to_string());
                }
                ReplyLine::Continuation { text: more, .. } | ReplyLine::Text(more) => {
                    text.push('\n');
                    text.push_str(&more);
                }
            }
        }
    }

    /// Sends a command and returns its reply, whatever the code.
    pub async fn command(&mut self, line: &str) -> ClientResult<Reply> {
        self.send_command(line).await?;
        self.read_reply().await
    }

    /// USER then PASS. A server that accepts the user outright (230) is
    /// not asked for a password.
    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<()> {
        let reply = self.command(&format!("USER {}", username)).await?;
        if reply.code == LOGIN_SUCCESS {
            return Ok(());
        }
        expect_code(reply, PASSWORD_REQUIRED)?;
        expect_code(self.command(&format!("PASS {}", password)).await?, LOGIN_SUCCESS)?;
        info!("Logged in as {}", username);
        Ok(())
    }

    /// Current virtual directory, taken from the quoted part of the 257 reply.
    pub async fn pwd(&mut self) -> ClientResult<String> {
        let reply = expect_code(self.command("PWD").await?, PATHNAME)?;
        let path = reply
            .text
            .split('"')
            .nth(1)
            .ok_or_else(|| ProtocolError::MalformedReply(reply.to_string()))?;
        Ok(path.to_string())
    }

    pub async fn cwd(&mut self, path: &str) -> ClientResult<()> {
        expect_code(self.command(&format!("CWD {}", path)).await?, FILE_ACTION_OK)?;
        Ok(())
    }

    /// Text of the 215 reply.
    pub async fn system(&mut self) -> ClientResult<String> {
        Ok(expect_code(self.command("SYST").await?, SYSTEM_TYPE)?.text)
    }

    pub async fn noop(&mut self) -> ClientResult<()> {
        expect_code(self.command("NOOP").await?, OK)?;
        Ok(())
    }

    /// Requests a passive endpoint and returns the address to dial.
    pub async fn passive(&mut self) -> ClientResult<SocketAddrV4> {
        let reply = expect_code(self.command("PASV").await?, ENTERING_PASSIVE)?;
        let mut addr = decode_pasv_tuple(&reply.text)?;
        // A server behind a wildcard bind may advertise 0.0.0.0
        if addr.ip().is_unspecified() {
            if let SocketAddr::V4(server) = self.server {
                addr.set_ip(*server.ip());
            }
        }
        self.last_passive = Some(addr);
        Ok(addr)
    }

    /// PASV followed by a dial to the advertised address.
    pub async fn open_data_channel(&mut self) -> ClientResult<TcpStream> {
        let addr = self.passive().await?;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: SocketAddr::V4(addr),
                source,
            })?;
        debug!("Data channel connected to {}", addr);
        Ok(stream)
    }

    /// Negotiates and dials the data channel, then issues `line` and waits
    /// for its 150.
    async fn start_transfer(&mut self, line: &str) -> ClientResult<TcpStream> {
        let data_stream = self.open_data_channel().await?;
        let reply = self.command(line).await?;
        if !reply.is_preliminary() {
            return Err(ClientError::UnexpectedReply {
                expected: OPENING_DATA,
                reply,
            });
        }
        Ok(data_stream)
    }

    async fn finish_transfer(&mut self) -> ClientResult<Reply> {
        expect_code(self.read_reply().await?, TRANSFER_COMPLETE)
    }

    /// Directory listing of the current directory, one entry per line.
    pub async fn list(&mut self) -> ClientResult<(Vec<String>, TransferResult)> {
        let mut data_stream = self.start_transfer("LIST").await?;
        let mut raw = Vec::new();
        let result = receive_file(&mut data_stream, &mut raw, self.buffer_size).await?;
        drop(data_stream);
        self.finish_transfer().await?;

        let lines = String::from_utf8_lossy(&raw)
            .lines()
            .map(str::to_string)
            .collect();
        Ok((lines, result))
    }

    /// RETR into any writer. A zero-byte file is a successful transfer here.
    pub async fn retrieve<W>(&mut self, name: &str, sink: &mut W) -> ClientResult<TransferResult>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut data_stream = self.start_transfer(&format!("RETR {}", name)).await?;
        let result = receive_file(&mut data_stream, sink, self.buffer_size).await?;
        drop(data_stream);
        self.finish_transfer().await?;
        Ok(result)
    }

    /// STOR from any reader. The data channel is shut down after the last
    /// byte so the server sees end-of-file.
    pub async fn store<R>(&mut self, name: &str, source: &mut R) -> ClientResult<TransferResult>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut data_stream = self.start_transfer(&format!("STOR {}", name)).await?;
        let result = send_file(source, &mut data_stream, self.buffer_size).await?;
        drop(data_stream);
        self.finish_transfer().await?;
        Ok(result)
    }

    /// Downloads `remote` into the local file `local`. The local file is only
    /// created once the server has accepted the RETR. Zero bytes count as a
    /// failed download.
    pub async fn download_file(&mut self, remote: &str, local: &Path) -> ClientResult<TransferResult> {
        let mut data_stream = self.start_transfer(&format!("RETR {}", remote)).await?;
        let mut file = File::create(local).await?;
        let result = receive_file(&mut data_stream, &mut file, self.buffer_size).await?;
        drop(data_stream);
        self.finish_transfer().await?;

        if result.bytes == 0 {
            return Err(ClientError::EmptyTransfer(remote.to_string()));
        }
        info!(
            "Downloaded {} ({} bytes in {} ms, {:.2} KB/s)",
            remote,
            result.bytes,
            result.duration_ms(),
            result.kib_per_sec()
        );
        Ok(result)
    }

    /// Uploads the local file `local` as `remote`. The local file is opened
    /// before anything is sent; zero bytes count as a failed upload.
    pub async fn upload_file(&mut self, local: &Path, remote: &str) -> ClientResult<TransferResult> {
        let mut file = File::open(local).await?;
        let result = self.store(remote, &mut file).await?;

        if result.bytes == 0 {
            return Err(ClientError::EmptyTransfer(remote.to_string()));
        }
        info!(
            "Uploaded {} ({} bytes in {} ms, {:.2} KB/s)",
            remote,
            result.bytes,
            result.duration_ms(),
            result.kib_per_sec()
        );
        Ok(result)
    }

    /// Sends QUIT and closes the control connection.
    pub async fn quit(mut self) -> ClientResult<()> {
        expect_code(self.command("QUIT").await?, GOODBYE)?;
        let _ = self.writer.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Plays back `replies` on a loopback control connection: the first chunk
    /// as the greeting, then one chunk per command received. Resolves to the
    /// command lines the fake server saw.
    async fn scripted(replies: &'static [&'static str]) -> (FtpClient, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut received = Vec::new();

            write_half.write_all(replies[0].as_bytes()).await.unwrap();
            for reply in &replies[1..] {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                received.push(line.trim_end().to_string());
                write_half.write_all(reply.as_bytes()).await.unwrap();
            }
            drop(write_half);
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest).await;
            received
        });

        let client = FtpClient::connect(addr).await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn reads_multi_line_replies() {
        let (mut client, server) = scripted(&[
            "220-Welcome\r\n  to the server\r\n220 FTP Server Ready.\r\n",
            "215 UNIX Type: L8\r\n",
        ])
        .await;

        assert_eq!(client.greeting().code, 220);
        assert_eq!(
            client.greeting().text,
            "Welcome\n  to the server\nFTP Server Ready."
        );
        assert_eq!(client.system().await.unwrap(), "UNIX Type: L8");
        drop(client);
        assert_eq!(server.await.unwrap(), ["SYST"]);
    }

    #[tokio::test]
    async fn login_expects_331_then_230() {
        let (mut client, server) = scripted(&[
            "220 FTP Server Ready.\r\n",
            "331 Username OK, need password.\r\n",
            "530 Login incorrect.\r\n",
        ])
        .await;

        match client.login("test", "wrong").await {
            Err(ClientError::UnexpectedReply { expected, reply }) => {
                assert_eq!(expected, 230);
                assert_eq!(reply.code, 530);
            }
            other => panic!("expected UnexpectedReply, got {other:?}"),
        }
        drop(client);
        assert_eq!(server.await.unwrap(), ["USER test", "PASS wrong"]);
    }

    #[tokio::test]
    async fn pwd_extracts_quoted_path() {
        let (mut client, _server) = scripted(&[
            "220 FTP Server Ready.\r\n",
            "257 \"/test/docs\" is current directory.\r\n",
        ])
        .await;
        assert_eq!(client.pwd().await.unwrap(), "/test/docs");
    }

    #[tokio::test]
    async fn passive_reply_is_decoded_and_remembered() {
        let (mut client, _server) = scripted(&[
            "220 FTP Server Ready.\r\n",
            "227 Entering Passive Mode (127,0,0,1,195,80).\r\n",
        ])
        .await;
        let addr = client.passive().await.unwrap();
        assert_eq!(addr, "127.0.0.1:50000".parse().unwrap());
        assert_eq!(client.last_passive(), Some(addr));
    }

    #[tokio::test]
    async fn sends_lines_with_multibyte_characters() {
        let (mut client, server) = scripted(&[
            "220 FTP Server Ready.\r\n",
            "550 Failed to change directory.\r\n",
            "257 \"/test\" is current directory.\r\n",
        ])
        .await;

        let reply = client.command("CWDé x").await.unwrap();
        assert_eq!(reply.code, 550);
        let reply = client.command("pässword").await.unwrap();
        assert_eq!(reply.code, 257);
        drop(client);
        assert_eq!(server.await.unwrap(), ["CWDé x", "pässword"]);
    }

    #[tokio::test]
    async fn closed_connection_is_reported() {
        let (mut client, _server) = scripted(&["220 FTP Server Ready.\r\n"]).await;
        assert!(matches!(
            client.noop().await,
            Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_))
        ));
    }
}
