//! Control sessions
//!
//! One `Session` per accepted control connection, plus the loop that reads
//! command lines and dispatches them.

pub mod context;
pub mod handler;
pub mod state;

pub use context::SessionContext;
pub use handler::{Connection, ControlChannel, handle_connection, run_session};
pub use state::{LoginState, Session};
