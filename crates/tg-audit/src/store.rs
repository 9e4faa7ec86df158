// store.rs — ReceiptStore trait and its file and in-memory backends.
//
// The ledger never touches the filesystem directly: everything it persists
// goes through this trait, so tests can swap in MemoryReceiptStore and the
// single-writer discipline can be exercised without disk I/O.
//
// File layout (one directory):
//   receipts.jsonl       — append-only log, one canonical receipt per line
//   chain-state.json     — {"last_hash": "..."}, the head pointer
//   latest.json          — {"hash": "...", "file": "..."} pointer to the newest snapshot
//   <prefix>_<hash>.json — pretty-printed per-receipt snapshot
//   parked.jsonl         — executed-receipt drafts waiting to be appended

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::receipt::{Receipt, ReceiptDraft};

/// Pointer to the most recently written receipt snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatestPointer {
    pub hash: String,
    pub file: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChainState {
    last_hash: String,
}

/// Persistence backend for the receipt ledger.
///
/// Implementations do not need their own locking: the ledger serializes
/// every call behind one mutex.
pub trait ReceiptStore: Send {
    /// Read the head pointer. `None` means nothing has been written yet.
    fn head(&self) -> Result<Option<String>, LedgerError>;

    /// Move the head pointer to `new_head` if it currently equals `expected`.
    /// Returns false (and changes nothing) if it does not.
    fn compare_and_set_head(
        &mut self,
        expected: Option<&str>,
        new_head: &str,
    ) -> Result<bool, LedgerError>;

    /// Append one canonical record line to the log.
    fn append_line(&mut self, line: &str) -> Result<(), LedgerError>;

    /// Read every non-blank line of the log, oldest first. An absent log is empty.
    fn read_lines(&self) -> Result<Vec<String>, LedgerError>;

    /// Persist a standalone copy of a receipt and point `latest` at it.
    fn write_snapshot(&mut self, receipt: &Receipt) -> Result<(), LedgerError>;

    /// Read the `latest` pointer, if one has been written.
    fn latest(&self) -> Result<Option<LatestPointer>, LedgerError>;

    /// Read a snapshot by file name. `None` if it does not exist.
    fn read_snapshot(&self, file: &str) -> Result<Option<String>, LedgerError>;

    /// Keep a draft whose append failed so it can be appended later.
    fn park(&mut self, draft: &ReceiptDraft) -> Result<(), LedgerError>;

    /// Drafts parked so far, oldest first.
    fn parked(&self) -> Result<Vec<ReceiptDraft>, LedgerError>;

    /// Forget the `count` oldest parked drafts.
    fn drop_parked(&mut self, count: usize) -> Result<(), LedgerError>;
}

impl<S: ReceiptStore + ?Sized> ReceiptStore for Box<S> {
    fn head(&self) -> Result<Option<String>, LedgerError> {
        (**self).head()
    }
    fn compare_and_set_head(
        &mut self,
        expected: Option<&str>,
        new_head: &str,
    ) -> Result<bool, LedgerError> {
        (**self).compare_and_set_head(expected, new_head)
    }
    fn append_line(&mut self, line: &str) -> Result<(), LedgerError> {
        (**self).append_line(line)
    }
    fn read_lines(&self) -> Result<Vec<String>, LedgerError> {
        (**self).read_lines()
    }
    fn write_snapshot(&mut self, receipt: &Receipt) -> Result<(), LedgerError> {
        (**self).write_snapshot(receipt)
    }
    fn latest(&self) -> Result<Option<LatestPointer>, LedgerError> {
        (**self).latest()
    }
    fn read_snapshot(&self, file: &str) -> Result<Option<String>, LedgerError> {
        (**self).read_snapshot(file)
    }
    fn park(&mut self, draft: &ReceiptDraft) -> Result<(), LedgerError> {
        (**self).park(draft)
    }
    fn parked(&self) -> Result<Vec<ReceiptDraft>, LedgerError> {
        (**self).parked()
    }
    fn drop_parked(&mut self, count: usize) -> Result<(), LedgerError> {
        (**self).drop_parked(count)
    }
}

/// File name for a receipt snapshot: `<prefix>_<hash>.json`, where the
/// prefix is the tool (or action, or domain) with unsafe characters replaced.
pub fn snapshot_file_name(receipt: &Receipt) -> String {
    let prefix = receipt
        .tool
        .as_deref()
        .or(receipt.action.as_deref())
        .or(receipt.domain.as_deref())
        .unwrap_or("receipt");
    let prefix: String = prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.json", prefix, receipt.hash)
}

// ── File backend ────────────────────────────────────────────────

/// Directory-backed receipt store.
pub struct FileReceiptStore {
    dir: PathBuf,
}

impl FileReceiptStore {
    /// Create a store in the given directory, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| LedgerError::OpenFailed {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("receipts.jsonl")
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join("chain-state.json")
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join("latest.json")
    }

    fn parked_path(&self) -> PathBuf {
        self.dir.join("parked.jsonl")
    }

    fn read_optional(path: &Path) -> Result<Option<String>, LedgerError> {
        match fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LedgerError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn append_to(path: &Path, line: &str) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        writeln!(file, "{}", line).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;
        Ok(())
    }
}

/// Write a file by writing a sibling temp file and renaming it into place,
/// so readers never observe a half-written pointer.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), LedgerError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|source| LedgerError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl ReceiptStore for FileReceiptStore {
    fn head(&self) -> Result<Option<String>, LedgerError> {
        let Some(raw) = Self::read_optional(&self.state_path())? else {
            return Ok(None);
        };
        let state: ChainState =
            serde_json::from_str(&raw).map_err(|e| LedgerError::CorruptHead {
                reason: format!("unreadable chain-state.json: {}", e),
            })?;
        Ok(Some(state.last_hash))
    }

    fn compare_and_set_head(
        &mut self,
        expected: Option<&str>,
        new_head: &str,
    ) -> Result<bool, LedgerError> {
        if self.head()?.as_deref() != expected {
            return Ok(false);
        }
        let json = serde_json::to_string(&ChainState {
            last_hash: new_head.to_string(),
        })?;
        write_atomic(&self.state_path(), &format!("{}\n", json))?;
        Ok(true)
    }

    fn append_line(&mut self, line: &str) -> Result<(), LedgerError> {
        Self::append_to(&self.log_path(), line)
    }

    fn read_lines(&self) -> Result<Vec<String>, LedgerError> {
        Ok(Self::read_optional(&self.log_path())?
            .map(|raw| {
                raw.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn write_snapshot(&mut self, receipt: &Receipt) -> Result<(), LedgerError> {
        let file = snapshot_file_name(receipt);
        let path = self.dir.join(&file);
        let json = serde_json::to_string_pretty(receipt)?;
        fs::write(&path, json).map_err(|source| LedgerError::Io { path, source })?;

        let pointer = LatestPointer {
            hash: receipt.hash.clone(),
            file,
        };
        write_atomic(&self.latest_path(), &serde_json::to_string_pretty(&pointer)?)
    }

    fn latest(&self) -> Result<Option<LatestPointer>, LedgerError> {
        match Self::read_optional(&self.latest_path())? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn read_snapshot(&self, file: &str) -> Result<Option<String>, LedgerError> {
        // Snapshot names never contain separators; refuse anything that would
        // escape the receipts directory.
        if file.contains('/') || file.contains('\\') || file.contains("..") {
            return Ok(None);
        }
        Self::read_optional(&self.dir.join(file))
    }

    fn park(&mut self, draft: &ReceiptDraft) -> Result<(), LedgerError> {
        Self::append_to(&self.parked_path(), &serde_json::to_string(draft)?)
    }

    fn parked(&self) -> Result<Vec<ReceiptDraft>, LedgerError> {
        let Some(raw) = Self::read_optional(&self.parked_path())? else {
            return Ok(Vec::new());
        };
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(LedgerError::from))
            .collect()
    }

    fn drop_parked(&mut self, count: usize) -> Result<(), LedgerError> {
        let path = self.parked_path();
        let remaining: Vec<ReceiptDraft> = self.parked()?.into_iter().skip(count).collect();
        if !remaining.is_empty() {
            let mut body = String::new();
            for draft in &remaining {
                body.push_str(&serde_json::to_string(draft)?);
                body.push('\n');
            }
            return write_atomic(&path, &body);
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LedgerError::Io { path, source }),
        }
    }
}

// ── In-memory backend ───────────────────────────────────────────

/// In-memory receipt store for tests and ephemeral gates.
#[derive(Debug, Default, Clone)]
pub struct MemoryReceiptStore {
    pub lines: Vec<String>,
    pub head: Option<String>,
    pub snapshots: HashMap<String, String>,
    pub latest: Option<LatestPointer>,
    pub parked: Vec<ReceiptDraft>,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReceiptStore for MemoryReceiptStore {
    fn head(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.head.clone())
    }

    fn compare_and_set_head(
        &mut self,
        expected: Option<&str>,
        new_head: &str,
    ) -> Result<bool, LedgerError> {
        if self.head.as_deref() != expected {
            return Ok(false);
        }
        self.head = Some(new_head.to_string());
        Ok(true)
    }

    fn append_line(&mut self, line: &str) -> Result<(), LedgerError> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.lines.clone())
    }

    fn write_snapshot(&mut self, receipt: &Receipt) -> Result<(), LedgerError> {
        let file = snapshot_file_name(receipt);
        self.snapshots
            .insert(file.clone(), serde_json::to_string_pretty(receipt)?);
        self.latest = Some(LatestPointer {
            hash: receipt.hash.clone(),
            file,
        });
        Ok(())
    }

    fn latest(&self) -> Result<Option<LatestPointer>, LedgerError> {
        Ok(self.latest.clone())
    }

    fn read_snapshot(&self, file: &str) -> Result<Option<String>, LedgerError> {
        Ok(self.snapshots.get(file).cloned())
    }

    fn park(&mut self, draft: &ReceiptDraft) -> Result<(), LedgerError> {
        self.parked.push(draft.clone());
        Ok(())
    }

    fn parked(&self) -> Result<Vec<ReceiptDraft>, LedgerError> {
        Ok(self.parked.clone())
    }

    fn drop_parked(&mut self, count: usize) -> Result<(), LedgerError> {
        self.parked.drain(..count.min(self.parked.len()));
        Ok(())
    }
}
