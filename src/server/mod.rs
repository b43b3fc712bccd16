//! Server core functionality
//!
//! The control listener and its accept loop.

pub mod core;

pub use core::Server;
