//! # tg-integrity
//!
//! Startup self-integrity check for Tool Gate.
//!
//! The gate refuses to decide anything until the artifacts it trusts (rule
//! table, configuration, binaries) hash to the values recorded in an
//! [`IntegrityManifest`]. Optionally the manifest itself carries a detached
//! Ed25519 signature, checked with `ring` before any digest comparison.

pub mod error;
pub mod manifest;
pub mod signed;
pub mod verify;

pub use error::IntegrityError;
pub use manifest::IntegrityManifest;
pub use signed::{
    generate_keypair, sign_manifest, sign_manifest_file, Ed25519Verifier, GeneratedKeyPair,
    SignatureVerifier, SignedManifestVerifier,
};
pub use verify::{ArtifactFailure, FailureReason, IntegrityCheck, IntegrityReport, ManifestVerifier};
