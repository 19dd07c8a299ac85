//! Infrastructure layer
//!
//! Handles I/O operations: filesystem, platform directories, and the
//! compiler child process.

pub mod dirs;
pub mod filesystem;
pub mod toolchain;
