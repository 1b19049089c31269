//! Filesystem utilities for mswarm.
//!
//! Instance config files are written atomically so an agent that starts
//! early never reads a half-written document.

pub mod atomic;

pub use atomic::atomic_write_file;
