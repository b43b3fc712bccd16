//! Navigate module
//!
//! Virtual working directories and the home-directory jail: changing
//! directories and mapping client file names onto real paths.

mod operations;

pub use operations::{VirtualPath, change_directory, resolve_file};
