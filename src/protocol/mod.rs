//! FTP Protocol implementation
//!
//! Handles FTP command parsing, reply formatting/parsing, and the command
//! handlers that drive a server-side session.

pub mod commands;
pub mod handlers;
pub mod responses;

pub use commands::{Command, CommandResult, CommandStatus, parse_command};
pub use handlers::handle_command;
pub use responses::{Reply, ReplyLine, parse_reply_line};
