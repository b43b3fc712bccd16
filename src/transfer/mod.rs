//! Transfer module
//!
//! Passive data-channel endpoints and the streaming engine that moves file
//! and listing bytes across them.

pub mod file_ops;
pub mod listing;
pub mod passive;
pub mod results;

pub use file_ops::{DEFAULT_BUFFER_SIZE, receive_file, send_file, send_listing};
pub use listing::read_listing;
pub use passive::{PassiveEndpoint, decode_pasv_tuple, encode_pasv_tuple};
pub use results::TransferResult;
