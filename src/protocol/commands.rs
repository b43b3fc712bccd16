//! Module `commands`
//!
//! Defines the FTP command set understood by the server, the parser that
//! turns one control line into a `Command`, and the result type handlers
//! report back to the session loop.

use crate::transfer::TransferResult;

/// Represents an FTP command parsed from the client input.
///
/// Commands that take an argument carry the raw argument text, which may be
/// empty; handlers decide whether an empty argument is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    USER(String), // Username for login
    PASS(String), // Password for login
    PWD,          // Also accepted as XPWD
    CWD(String),  // Change working directory
    PASV,         // Enter passive mode
    LIST,         // Also accepted as NLST
    RETR(String), // Retrieve/download file
    STOR(String), // Store/upload file
    SYST,
    TYPE(String),
    NOOP,
    QUIT,
    UNKNOWN(String), // Verb outside the supported set, upper-cased
}

impl Command {
    /// Canonical verb, used in logs and the audit trail.
    pub fn verb(&self) -> &str {
        match self {
            Command::USER(_) => "USER",
            Command::PASS(_) => "PASS",
            Command::PWD => "PWD",
            Command::CWD(_) => "CWD",
            Command::PASV => "PASV",
            Command::LIST => "LIST",
            Command::RETR(_) => "RETR",
            Command::STOR(_) => "STOR",
            Command::SYST => "SYST",
            Command::TYPE(_) => "TYPE",
            Command::NOOP => "NOOP",
            Command::QUIT => "QUIT",
            Command::UNKNOWN(verb) if verb.is_empty() => "UNKNOWN",
            Command::UNKNOWN(verb) => verb,
        }
    }

    /// Whether the command needs an authenticated session.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Command::PWD
                | Command::CWD(_)
                | Command::PASV
                | Command::LIST
                | Command::RETR(_)
                | Command::STOR(_)
        )
    }
}

/// Whether the session loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Continue,
    CloseConnection,
}

/// What a handler did: the final reply code it wrote and, for
/// transfer-bearing commands, the transfer accounting.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub code: u16,
    pub transfer: Option<TransferResult>,
}

impl CommandResult {
    pub fn replied(code: u16) -> Self {
        Self {
            status: CommandStatus::Continue,
            code,
            transfer: None,
        }
    }

    pub fn transferred(code: u16, transfer: TransferResult) -> Self {
        Self {
            status: CommandStatus::Continue,
            code,
            transfer: Some(transfer),
        }
    }

    pub fn close(code: u16) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            code,
            transfer: None,
        }
    }
}

/// Parses a raw command line received from a client into the `Command` enum.
///
/// The line terminator is stripped and the verb is case-folded. Everything
/// after the single separator following the verb is the argument, kept
/// verbatim so file names may start or end with spaces. An argument made up
/// only of whitespace counts as missing.
pub fn parse_command(raw: &str) -> Command {
    let line = raw.trim_end_matches(['\r', '\n']).trim_start();
    let (cmd, arg) = line.split_once([' ', '\t']).unwrap_or((line, ""));
    let cmd = cmd.to_ascii_uppercase();
    let arg = if arg.trim().is_empty() {
        String::new()
    } else {
        arg.to_string()
    };

    match cmd.as_str() {
        "USER" => Command::USER(arg),
        "PASS" => Command::PASS(arg),
        "PWD" | "XPWD" => Command::PWD,
        "CWD" => Command::CWD(arg),
        "PASV" => Command::PASV,
        "LIST" | "NLST" => Command::LIST,
        "RETR" => Command::RETR(arg),
        "STOR" => Command::STOR(arg),
        "SYST" => Command::SYST,
        "TYPE" => Command::TYPE(arg),
        "NOOP" => Command::NOOP,
        "QUIT" => Command::QUIT,
        _ => Command::UNKNOWN(cmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(parse_command("user test\r\n"), Command::USER("test".into()));
        assert_eq!(parse_command("QuIt\r\n"), Command::QUIT);
        assert_eq!(parse_command("xpwd"), Command::PWD);
        assert_eq!(parse_command("nlst"), Command::LIST);
    }

    #[test]
    fn argument_keeps_inner_spaces() {
        assert_eq!(
            parse_command("STOR my report.txt\r\n"),
            Command::STOR("my report.txt".into())
        );
    }

    #[test]
    fn file_names_keep_surrounding_spaces() {
        assert_eq!(
            parse_command("RETR  padded.txt \r\n"),
            Command::RETR(" padded.txt ".into())
        );
        assert_eq!(
            parse_command("stor trailing.txt  \n"),
            Command::STOR("trailing.txt  ".into())
        );
    }

    #[test]
    fn missing_argument_is_empty_not_unknown() {
        assert_eq!(parse_command("RETR"), Command::RETR(String::new()));
        assert_eq!(parse_command("CWD   \r\n"), Command::CWD(String::new()));
    }

    #[test]
    fn unknown_and_empty_lines() {
        assert_eq!(parse_command("DELE x"), Command::UNKNOWN("DELE".into()));
        assert_eq!(parse_command("\r\n"), Command::UNKNOWN(String::new()));
        assert_eq!(parse_command("\r\n").verb(), "UNKNOWN");
    }

    #[test]
    fn login_gate_covers_directory_and_transfer_commands() {
        for cmd in ["PWD", "CWD a", "PASV", "LIST", "RETR a", "STOR a"] {
            assert!(parse_command(cmd).requires_login(), "{cmd}");
        }
        for cmd in ["USER a", "PASS a", "SYST", "TYPE I", "NOOP", "QUIT", "HELP"] {
            assert!(!parse_command(cmd).requires_login(), "{cmd}");
        }
    }
}
