//! FTP Response handling
//!
//! Defines FTP response codes, the structured `Reply` value, and the line
//! grammar used to read replies back on the client side.

use std::fmt;

use crate::error::ProtocolError;

/// Standard FTP response codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const ENTERING_PASSIVE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATHNAME: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const SYNTAX_ERROR: u16 = 500;
pub const ARGUMENT_ERROR: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;

/// One status reply: a three-digit code plus free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Wire form, terminated with CRLF.
    pub fn to_line(&self) -> String {
        format_response(self.code, &self.text)
    }

    /// 1xx: the server will send another reply once the action finishes.
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Parses a complete single-line reply such as `226 Transfer complete.`
    pub fn parse(line: &str) -> Result<Reply, ProtocolError> {
        match parse_reply_line(line)? {
            ReplyLine::Final(reply) => Ok(reply),
            _ => Err(ProtocolError::MalformedReply(line.to_string())),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.text)
        }
    }
}

/// A single line read from the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyLine {
    /// `ddd text` or a bare `ddd`; ends a reply.
    Final(Reply),
    /// `ddd-text`; opens (or continues) a multi-line reply.
    Continuation { code: u16, text: String },
    /// Any other line; only legal inside a multi-line reply.
    Text(String),
}

/// Classifies one reply line.
///
/// Grammar: three ASCII digits whose first digit is 1-5, then either the end
/// of the line, a space followed by text, or `-` followed by text.
pub fn parse_reply_line(line: &str) -> Result<ReplyLine, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();

    let has_code = bytes.len() >= 3 && bytes[..3].iter().all(u8::is_ascii_digit);
    if !has_code {
        return Ok(ReplyLine::Text(line.to_string()));
    }
    if !(b'1'..=b'5').contains(&bytes[0]) {
        return Err(ProtocolError::MalformedReply(line.to_string()));
    }

    let code: u16 = line[..3]
        .parse()
        .map_err(|_| ProtocolError::MalformedReply(line.to_string()))?;
    let rest = &line[3..];

    match rest.as_bytes().first() {
        None => Ok(ReplyLine::Final(Reply::new(code, ""))),
        Some(b' ') => Ok(ReplyLine::Final(Reply::new(code, &rest[1..]))),
        Some(b'-') => Ok(ReplyLine::Continuation {
            code,
            text: rest[1..].to_string(),
        }),
        Some(_) => Err(ProtocolError::MalformedReply(line.to_string())),
    }
}

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}
