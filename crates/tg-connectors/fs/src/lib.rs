//! # tg-connector-fs
//!
//! Filesystem operations for Tool Gate, confined to a sandbox directory.
//!
//! The operations implement [`tg_gate::Operation`], so they run only when
//! the gate kernel invokes them after an `allowed` verdict.

pub mod connector;
pub mod error;

pub use connector::{DeleteFile, FsSandbox, ReadFile, WriteFile, DELETE_FILE, READ_FILE, WRITE_FILE};
pub use error::FsConnectorError;
