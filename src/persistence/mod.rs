//! Durable file helpers shared by the file-backed queue and table backends.

pub mod atomic;

pub use atomic::{fsync_dir, read_if_exists, write_atomic};
