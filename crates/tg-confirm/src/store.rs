// store.rs — ConfirmationStore trait and its file and in-memory backends.
//
// A degraded verdict is only turned into an execution after the caller
// presents a one-time token issued for that exact call. Tokens are bearer
// secrets bound to a scope key (fingerprint of tool + arguments).
//
// Every consume runs as one read-check-delete under a mutex, so a token can
// never be redeemed twice, even by concurrent callers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfirmError;

/// Prefix on every issued token.
pub const TOKEN_PREFIX: &str = "c_";

/// One outstanding confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationRecord {
    pub scope_key: String,
    pub issued_at: DateTime<Utc>,
}

/// On-disk shape: `{"tokens": {"c_...": {scope_key, issued_at}}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenTable {
    #[serde(default)]
    pub tokens: BTreeMap<String, ConfirmationRecord>,
}

impl TokenTable {
    fn insert(&mut self, scope_key: &str, now: DateTime<Utc>) -> String {
        let token = generate_token();
        self.tokens.insert(
            token.clone(),
            ConfirmationRecord {
                scope_key: scope_key.to_string(),
                issued_at: now,
            },
        );
        token
    }

    /// Remove the token if it matches and is still live. Returns true only
    /// when it was removed. Expired tokens are removed and rejected.
    fn redeem(
        &mut self,
        token: &str,
        scope_key: &str,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Redeem {
        let Some(record) = self.tokens.get(token) else {
            return Redeem::Unknown;
        };
        if is_expired(record, now, ttl) {
            self.tokens.remove(token);
            return Redeem::Expired;
        }
        if record.scope_key != scope_key {
            return Redeem::ScopeMismatch;
        }
        self.tokens.remove(token);
        Redeem::Redeemed
    }

    /// Drop every expired token. Returns how many were dropped.
    fn purge_expired(&mut self, now: DateTime<Utc>, ttl: Option<Duration>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| !is_expired(record, now, ttl));
        before - self.tokens.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redeem {
    Redeemed,
    Unknown,
    ScopeMismatch,
    Expired,
}

fn is_expired(record: &ConfirmationRecord, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
    ttl.map(|ttl| now - record.issued_at > ttl).unwrap_or(false)
}

/// 32 random bytes, hex-encoded, prefixed with `c_`.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", TOKEN_PREFIX, hex)
}

/// Issues and redeems one-time confirmation tokens.
pub trait ConfirmationStore: Send + Sync {
    /// Issue a fresh token bound to `scope_key`.
    fn issue(&self, scope_key: &str) -> Result<String, ConfirmError>;

    /// Redeem a token. True exactly once per issued token, and only for the
    /// scope it was issued for.
    fn consume(&self, token: &str, scope_key: &str) -> Result<bool, ConfirmError>;
}

impl<S: ConfirmationStore + ?Sized> ConfirmationStore for Box<S> {
    fn issue(&self, scope_key: &str) -> Result<String, ConfirmError> {
        (**self).issue(scope_key)
    }
    fn consume(&self, token: &str, scope_key: &str) -> Result<bool, ConfirmError> {
        (**self).consume(token, scope_key)
    }
}

fn log_rejection(outcome: Redeem) {
    match outcome {
        Redeem::Redeemed => {}
        Redeem::Unknown => tracing::debug!("confirmation token unknown or already used"),
        Redeem::ScopeMismatch => tracing::warn!("confirmation token presented for a different call"),
        Redeem::Expired => tracing::debug!("confirmation token expired"),
    }
}

// ── File backend ────────────────────────────────────────────────

/// Token table persisted as a single JSON file.
pub struct JsonFileConfirmationStore {
    path: PathBuf,
    ttl: Option<Duration>,
    lock: Mutex<()>,
}

impl JsonFileConfirmationStore {
    /// Create a store backed by `path`. The file is created on first issue.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ttl: None,
            lock: Mutex::new(()),
        }
    }

    /// Expire tokens older than `ttl` (builder pattern).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, ConfirmError> {
        self.lock.lock().map_err(|_| ConfirmError::LockPoisoned)
    }

    /// Load the table. A missing, unreadable, or corrupted file reads as
    /// empty, so no token can be redeemed from it.
    fn load(&self) -> TokenTable {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return TokenTable::default(),
            Err(e) => {
                tracing::warn!("cannot read {}: {}; treating as empty", self.path.display(), e);
                return TokenTable::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(
                    "corrupted confirmation store {}: {}; treating as empty",
                    self.path.display(),
                    e
                );
                TokenTable::default()
            }
        }
    }

    fn save(&self, table: &TokenTable) -> Result<(), ConfirmError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfirmError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, format!("{}\n", json)).map_err(|source| ConfirmError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| ConfirmError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ConfirmationStore for JsonFileConfirmationStore {
    fn issue(&self, scope_key: &str) -> Result<String, ConfirmError> {
        if scope_key.is_empty() {
            return Err(ConfirmError::EmptyScope);
        }
        let _guard = self.guard()?;
        let now = Utc::now();
        let mut table = self.load();
        table.purge_expired(now, self.ttl);
        let token = table.insert(scope_key, now);
        self.save(&table)?;
        tracing::debug!("issued confirmation token ({} outstanding)", table.tokens.len());
        Ok(token)
    }

    fn consume(&self, token: &str, scope_key: &str) -> Result<bool, ConfirmError> {
        if token.is_empty() || scope_key.is_empty() {
            return Ok(false);
        }
        let _guard = self.guard()?;
        let mut table = self.load();
        let outcome = table.redeem(token, scope_key, Utc::now(), self.ttl);
        match outcome {
            Redeem::Redeemed => {
                // Persist the deletion before reporting success.
                self.save(&table)?;
                Ok(true)
            }
            Redeem::Expired => {
                self.save(&table)?;
                log_rejection(outcome);
                Ok(false)
            }
            Redeem::Unknown | Redeem::ScopeMismatch => {
                log_rejection(outcome);
                Ok(false)
            }
        }
    }
}

// ── In-memory backend ───────────────────────────────────────────

/// In-memory token table for tests and ephemeral gates.
#[derive(Debug, Default)]
pub struct MemoryConfirmationStore {
    table: Mutex<TokenTable>,
    ttl: Option<Duration>,
}

impl MemoryConfirmationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of tokens not yet redeemed.
    pub fn outstanding(&self) -> Result<usize, ConfirmError> {
        Ok(self
            .table
            .lock()
            .map_err(|_| ConfirmError::LockPoisoned)?
            .tokens
            .len())
    }
}

impl ConfirmationStore for MemoryConfirmationStore {
    fn issue(&self, scope_key: &str) -> Result<String, ConfirmError> {
        if scope_key.is_empty() {
            return Err(ConfirmError::EmptyScope);
        }
        let mut table = self.table.lock().map_err(|_| ConfirmError::LockPoisoned)?;
        let now = Utc::now();
        table.purge_expired(now, self.ttl);
        Ok(table.insert(scope_key, now))
    }

    fn consume(&self, token: &str, scope_key: &str) -> Result<bool, ConfirmError> {
        if token.is_empty() || scope_key.is_empty() {
            return Ok(false);
        }
        let mut table = self.table.lock().map_err(|_| ConfirmError::LockPoisoned)?;
        let outcome = table.redeem(token, scope_key, Utc::now(), self.ttl);
        log_rejection(outcome);
        Ok(outcome == Redeem::Redeemed)
    }
}
