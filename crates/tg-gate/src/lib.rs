//! # tg-gate
//!
//! The Tool Gate kernel: the single path from an agent's tool call to a
//! side effect.
//!
//! Every request is checked against the startup integrity manifest, run
//! through the rule evaluators, and then refused, held for confirmation, or
//! executed. Operations are bound to a [`Capability`] that only the kernel
//! holds, so holding an operation does not let anyone run it. Every outcome
//! is recorded in the hash-chained receipt ledger.
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tg_gate::{GateConfig, GateKernel};
//!
//! let config = GateConfig::load(".").unwrap();
//! let kernel = GateKernel::from_config(&config).unwrap().build().unwrap();
//! let outcome = kernel.submit_json(json!({
//!     "tool": "filesystem.writeFile",
//!     "action": "write",
//!     "domain": "general",
//!     "args": { "path": "notes.txt", "content": "hi" }
//! }));
//! # let _ = outcome;
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod kernel;
pub mod operation;
pub mod request;

pub use capability::Capability;
pub use config::{GateConfig, GateOptions};
pub use error::GateError;
pub use kernel::{GateKernel, GateKernelBuilder};
pub use operation::{Operation, OperationError};
pub use request::{Outcome, PendingConfirmation, ToolRequest};
