//! CLI command implementations.

pub mod hex_utils;
pub mod hexdump;
pub mod offsets;
pub mod read;
pub mod resolve;
pub mod scan;
pub mod value;
pub mod watch;
pub mod write;
