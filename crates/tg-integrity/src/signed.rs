// signed.rs — Detached Ed25519 signatures over the manifest.
//
// The signature covers the exact bytes of manifest.json. It is checked
// before any digest comparison; a bad signature is fatal on its own.
//
// Key and signature files hold standard base64 text:
//   integrity/public.key   — raw 32-byte Ed25519 public key
//   integrity/manifest.sig — 64-byte signature
// Signing keys are PKCS#8 documents (also base64), as produced by
// `generate_keypair`.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};

use crate::error::IntegrityError;
use crate::manifest::IntegrityManifest;
use crate::verify::{IntegrityCheck, IntegrityReport, ManifestVerifier};

/// Verifies a detached signature. Implemented with `ring` by default;
/// swap in another primitive for tests or a different algorithm.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 via `ring`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &[u8], message: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(&signature::ED25519, public_key)
            .verify(message, sig)
            .is_ok()
    }
}

/// Manifest verification that first checks the manifest's signature.
pub struct SignedManifestVerifier<V: SignatureVerifier = Ed25519Verifier> {
    inner: ManifestVerifier,
    signature_path: PathBuf,
    public_key_path: PathBuf,
    verifier: V,
}

impl SignedManifestVerifier<Ed25519Verifier> {
    pub fn new(
        inner: ManifestVerifier,
        signature_path: impl Into<PathBuf>,
        public_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self::with_verifier(inner, signature_path, public_key_path, Ed25519Verifier)
    }
}

impl<V: SignatureVerifier> SignedManifestVerifier<V> {
    pub fn with_verifier(
        inner: ManifestVerifier,
        signature_path: impl Into<PathBuf>,
        public_key_path: impl Into<PathBuf>,
        verifier: V,
    ) -> Self {
        Self {
            inner,
            signature_path: signature_path.into(),
            public_key_path: public_key_path.into(),
            verifier,
        }
    }
}

impl<V: SignatureVerifier> IntegrityCheck for SignedManifestVerifier<V> {
    fn verify(&self) -> Result<IntegrityReport, IntegrityError> {
        let manifest_path = self.inner.manifest_path();
        let message = IntegrityManifest::read_bytes(manifest_path)?;
        let public_key = read_base64(&self.public_key_path)?;
        let sig = read_base64(&self.signature_path)?;

        if !self.verifier.verify(&public_key, &message, &sig) {
            tracing::warn!(
                "signature on {} did not verify",
                manifest_path.display()
            );
            return Err(IntegrityError::SignatureInvalid);
        }

        let manifest = IntegrityManifest::from_bytes(&message, manifest_path)?;
        self.inner.verify_manifest(&manifest)
    }
}

fn read_base64(path: &Path) -> Result<Vec<u8>, IntegrityError> {
    let raw = fs::read_to_string(path).map_err(|source| IntegrityError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(raw.trim(), path)
}

fn decode(text: &str, path: &Path) -> Result<Vec<u8>, IntegrityError> {
    BASE64
        .decode(text)
        .map_err(|e| IntegrityError::KeyInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// A freshly generated Ed25519 key pair, base64-encoded.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    /// PKCS#8 signing key. Keep secret.
    pub pkcs8: String,
    /// Raw public key for `public.key`.
    pub public_key: String,
}

pub fn generate_keypair() -> Result<GeneratedKeyPair, IntegrityError> {
    let rng = SystemRandom::new();
    let doc = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| IntegrityError::KeyInvalid {
        path: PathBuf::from("<generated>"),
        reason: "key generation failed".to_string(),
    })?;
    let pair = parse_pkcs8(doc.as_ref(), Path::new("<generated>"))?;
    Ok(GeneratedKeyPair {
        pkcs8: BASE64.encode(doc.as_ref()),
        public_key: BASE64.encode(pair.public_key().as_ref()),
    })
}

fn parse_pkcs8(pkcs8: &[u8], path: &Path) -> Result<Ed25519KeyPair, IntegrityError> {
    Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|e| IntegrityError::KeyInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Sign manifest bytes with a base64 PKCS#8 key; returns the base64 signature.
pub fn sign_manifest(pkcs8_base64: &str, manifest: &[u8]) -> Result<String, IntegrityError> {
    let key_path = Path::new("<signing key>");
    let pkcs8 = decode(pkcs8_base64.trim(), key_path)?;
    let pair = parse_pkcs8(&pkcs8, key_path)?;
    Ok(BASE64.encode(pair.sign(manifest).as_ref()))
}

/// Sign the manifest file at `manifest_path` and write `signature_path`.
pub fn sign_manifest_file(
    pkcs8_base64: &str,
    manifest_path: &Path,
    signature_path: &Path,
) -> Result<(), IntegrityError> {
    let message = IntegrityManifest::read_bytes(manifest_path)?;
    let sig = sign_manifest(pkcs8_base64, &message)?;
    fs::write(signature_path, format!("{}\n", sig)).map_err(|source| IntegrityError::Io {
        path: signature_path.to_path_buf(),
        source,
    })
}
