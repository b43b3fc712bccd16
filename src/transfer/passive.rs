//! Module `passive`
//!
//! Passive-mode data endpoints. PASV binds a fresh listener on an ephemeral
//! port of the wildcard address with a backlog of one; the next
//! transfer-bearing command accepts exactly one connection from it, and the
//! listener is closed as soon as that accept returns.

use log::debug;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::error::ProtocolError;

/// A listening data endpoint waiting for its single connection.
#[derive(Debug)]
pub struct PassiveEndpoint {
    listener: TcpListener,
    advertised: SocketAddrV4,
}

impl PassiveEndpoint {
    /// Binds `0.0.0.0:0` and advertises the assigned port on `advertised_ip`.
    pub fn open(advertised_ip: Ipv4Addr) -> io::Result<Self> {
        let socket = TcpSocket::new_v4()?;
        socket.bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
        let listener = socket.listen(1)?;
        let port = listener.local_addr()?.port();

        debug!("Passive endpoint listening on port {}", port);

        Ok(Self {
            listener,
            advertised: SocketAddrV4::new(advertised_ip, port),
        })
    }

    pub fn port(&self) -> u16 {
        self.advertised.port()
    }

    pub fn advertised_addr(&self) -> SocketAddrV4 {
        self.advertised
    }

    /// Text of the 227 reply.
    pub fn reply_text(&self) -> String {
        format!(
            "Entering Passive Mode ({}).",
            encode_pasv_tuple(self.advertised)
        )
    }

    /// Accepts one data connection. The endpoint is consumed, so the listener
    /// is closed whether or not the accept succeeded.
    pub async fn accept(self) -> io::Result<(TcpStream, SocketAddr)> {
        let accepted = self.listener.accept().await;
        drop(self.listener);
        accepted
    }
}

/// Encodes an address as `h1,h2,h3,h4,p1,p2` with `port = p1 * 256 + p2`.
pub fn encode_pasv_tuple(addr: SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port / 256, port % 256)
}

/// Decodes the address advertised in a 227 reply.
///
/// Accepts either the full reply text (the tuple is taken from inside the
/// parentheses) or a bare tuple.
pub fn decode_pasv_tuple(text: &str) -> Result<SocketAddrV4, ProtocolError> {
    let malformed = || ProtocolError::MalformedPassiveAddress(text.to_string());

    let tuple = match text.find('(') {
        Some(open) => {
            let rest = &text[open + 1..];
            let close = rest.find(')').ok_or_else(malformed)?;
            &rest[..close]
        }
        None => text.trim().trim_end_matches('.'),
    };

    let values = tuple
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| malformed())?;

    match values.as_slice() {
        [h1, h2, h3, h4, p1, p2] => Ok(SocketAddrV4::new(
            Ipv4Addr::new(*h1, *h2, *h3, *h4),
            u16::from(*p1) * 256 + u16::from(*p2),
        )),
        _ => Err(malformed()),
    }
}
