//! # tg-audit
//!
//! Hash-chained receipt ledger and artifact hashing for Tool Gate.
//!
//! Every decision the gate makes is recorded as a [`Receipt`] in a JSONL
//! log. Each receipt carries the hash of its predecessor, so editing,
//! inserting, or deleting any record breaks the chain and is caught by
//! [`ReceiptLedger::verify_chain`].
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use tg_audit::{FileReceiptStore, ReceiptDraft, ReceiptLedger, ReceiptOutcome};
//! use tg_policy::Action;
//!
//! let store = FileReceiptStore::new("/tmp/receipts").unwrap();
//! let ledger = ReceiptLedger::open(store).unwrap();
//! let draft = ReceiptDraft::new("v2", Action::Refused, "refuse_domain", ReceiptOutcome::Blocked)
//!     .with_domain("fraud");
//! let receipt = ledger.append(draft).unwrap();
//! assert!(ledger.verify_chain().unwrap().ok);
//! # let _ = receipt;
//! ```

pub mod canonical;
pub mod error;
pub mod hasher;
pub mod ledger;
pub mod receipt;
pub mod store;

pub use canonical::canonical_json;
pub use error::LedgerError;
pub use ledger::{verify_lines, ChainFailure, ChainFailureKind, ChainReport, ReceiptLedger};
pub use receipt::{body_hash, Receipt, ReceiptDraft, ReceiptOutcome, GENESIS};
pub use store::{FileReceiptStore, LatestPointer, MemoryReceiptStore, ReceiptStore};
