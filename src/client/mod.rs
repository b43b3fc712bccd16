//! FTP client driver
//!
//! The initiating side of the protocol, used by the `ftp-client` binary and
//! the integration tests.

pub mod driver;

pub use driver::FtpClient;
