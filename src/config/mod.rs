//! Configuration constants
//!
//! - [`defaults`] - Default file names, directories and toolchain names

pub mod defaults;
