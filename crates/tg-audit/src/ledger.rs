// ledger.rs — The hash-chained receipt ledger.
//
// Appends are globally serialized behind one mutex: read head → build the
// chained record → append the line → compare-and-set the head → write the
// snapshot. Without that ordering two concurrent appends could both link to
// the same predecessor and fork the chain.
//
// Verification replays the log from GENESIS, recomputing every hash from the
// raw record and checking each link. The first malformed record, broken
// link, or hash mismatch stops the replay and is reported by index.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;
use crate::receipt::{body_hash, Receipt, ReceiptDraft, GENESIS};
use crate::store::ReceiptStore;

/// Why verification stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainFailureKind {
    /// A record (or the snapshot a pointer names) does not exist.
    MissingFile,
    /// A record's stored hash does not match its recomputed hash.
    HashMismatch,
    /// A record's `prev_hash` does not equal its predecessor's hash.
    BrokenLink,
    /// A record is not valid JSON or does not have the receipt shape.
    MalformedRecord,
}

impl std::fmt::Display for ChainFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChainFailureKind::MissingFile => "missing_file",
            ChainFailureKind::HashMismatch => "hash_mismatch",
            ChainFailureKind::BrokenLink => "broken_link",
            ChainFailureKind::MalformedRecord => "malformed_record",
        };
        f.write_str(s)
    }
}

/// The first problem verification found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainFailure {
    /// Zero-based index of the offending record.
    pub index: usize,
    pub kind: ChainFailureKind,
    pub detail: String,
}

/// Result of replaying the chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainReport {
    pub ok: bool,
    /// Number of records that verified (all of them when `ok`).
    pub count: usize,
    /// Hash of the last verified record, or GENESIS.
    pub last_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ChainFailure>,
}

impl ChainReport {
    fn fail(count: usize, last_hash: String, kind: ChainFailureKind, detail: String) -> Self {
        Self {
            ok: false,
            count,
            last_hash,
            failure: Some(ChainFailure {
                index: count,
                kind,
                detail,
            }),
        }
    }
}

/// Replay a sequence of log lines from GENESIS.
pub fn verify_lines(lines: &[String]) -> ChainReport {
    let mut prev = GENESIS.to_string();

    for (index, line) in lines.iter().enumerate() {
        let (value, receipt) = match parse_record(line) {
            Ok(parsed) => parsed,
            Err(detail) => {
                return ChainReport::fail(index, prev, ChainFailureKind::MalformedRecord, detail)
            }
        };

        if receipt.prev_hash != prev {
            return ChainReport::fail(
                index,
                prev.clone(),
                ChainFailureKind::BrokenLink,
                format!("prev_hash {} does not match {}", receipt.prev_hash, prev),
            );
        }

        let expected = body_hash(&value).unwrap_or_default();
        if receipt.hash != expected {
            return ChainReport::fail(
                index,
                prev,
                ChainFailureKind::HashMismatch,
                format!("stored {} but recomputed {}", receipt.hash, expected),
            );
        }

        prev = receipt.hash;
    }

    ChainReport {
        ok: true,
        count: lines.len(),
        last_hash: prev,
        failure: None,
    }
}

fn parse_record(line: &str) -> Result<(Value, Receipt), String> {
    let value: Value = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {}", e))?;
    if !value.is_object() {
        return Err("record is not a JSON object".to_string());
    }
    let receipt: Receipt = serde_json::from_value(value.clone())
        .map_err(|e| format!("not a receipt: {}", e))?;
    Ok((value, receipt))
}

/// An append-only, hash-chained receipt ledger over any [`ReceiptStore`].
///
/// `ReceiptLedger` is `Sync` (the store sits behind a mutex), so one ledger
/// can be shared by every thread that submits requests.
pub struct ReceiptLedger<S: ReceiptStore> {
    store: Mutex<S>,
}

impl<S: ReceiptStore> ReceiptLedger<S> {
    /// Open a ledger over a store.
    ///
    /// Reconciles the head pointer with the log (an append interrupted after
    /// writing its line but before moving the head is completed) and then
    /// appends any parked drafts. Does not replay the whole chain; use
    /// [`ReceiptLedger::open_verified`] for that.
    pub fn open(store: S) -> Result<Self, LedgerError> {
        let ledger = Self {
            store: Mutex::new(store),
        };
        {
            let mut store = ledger.lock()?;
            reconcile_head(&mut *store)?;
        }
        ledger.flush_parked()?;
        Ok(ledger)
    }

    /// Open a ledger and refuse it if the chain does not verify.
    pub fn open_verified(store: S) -> Result<Self, LedgerError> {
        let report = verify_lines(&store.read_lines()?);
        if let Some(failure) = report.failure {
            tracing::warn!(
                "receipt chain corrupted at index {}: {} ({})",
                failure.index,
                failure.kind,
                failure.detail
            );
            return Err(LedgerError::ChainCorrupted {
                index: failure.index,
                kind: failure.kind.to_string(),
            });
        }
        Self::open(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, LedgerError> {
        self.store.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    /// Append a receipt to the chain and return the chained record.
    /// Parked drafts, if any, are appended ahead of it.
    pub fn append(&self, draft: ReceiptDraft) -> Result<Receipt, LedgerError> {
        let mut store = self.lock()?;
        flush_parked_locked(&mut *store)?;
        append_locked(&mut *store, draft)
    }

    /// Park a draft whose append failed; it is appended by the next `open`
    /// or `append`.
    pub fn park(&self, draft: &ReceiptDraft) -> Result<(), LedgerError> {
        let mut store = self.lock()?;
        store.park(draft)?;
        tracing::warn!(
            "parked {} receipt for tool {:?}",
            draft.decision,
            draft.tool
        );
        Ok(())
    }

    /// Append every parked draft, oldest first.
    pub fn flush_parked(&self) -> Result<usize, LedgerError> {
        let mut store = self.lock()?;
        flush_parked_locked(&mut *store)
    }

    /// Current head of the chain (GENESIS when empty).
    pub fn head(&self) -> Result<String, LedgerError> {
        Ok(self.lock()?.head()?.unwrap_or_else(|| GENESIS.to_string()))
    }

    /// Replay the whole chain from GENESIS.
    pub fn verify_chain(&self) -> Result<ChainReport, LedgerError> {
        let lines = self.lock()?.read_lines()?;
        Ok(verify_lines(&lines))
    }

    /// Follow the `latest` pointer to its snapshot and check that it is
    /// intact and is the current head of the chain.
    pub fn verify_latest(&self) -> Result<ChainReport, LedgerError> {
        let store = self.lock()?;
        let head = store.head()?.unwrap_or_else(|| GENESIS.to_string());

        let Some(pointer) = store.latest()? else {
            return Ok(if head == GENESIS {
                ChainReport {
                    ok: true,
                    count: 0,
                    last_hash: head,
                    failure: None,
                }
            } else {
                ChainReport::fail(
                    0,
                    head,
                    ChainFailureKind::MissingFile,
                    "latest pointer is missing".to_string(),
                )
            });
        };

        let Some(raw) = store.read_snapshot(&pointer.file)? else {
            return Ok(ChainReport::fail(
                0,
                head,
                ChainFailureKind::MissingFile,
                format!("snapshot {} not found", pointer.file),
            ));
        };

        let (value, receipt) = match parse_record(&raw) {
            Ok(parsed) => parsed,
            Err(detail) => {
                return Ok(ChainReport::fail(
                    0,
                    head,
                    ChainFailureKind::MalformedRecord,
                    detail,
                ))
            }
        };

        let recomputed = body_hash(&value).unwrap_or_default();
        if receipt.hash != recomputed || receipt.hash != pointer.hash {
            return Ok(ChainReport::fail(
                0,
                head,
                ChainFailureKind::HashMismatch,
                format!(
                    "snapshot hash {} recomputed {} pointer {}",
                    receipt.hash, recomputed, pointer.hash
                ),
            ));
        }
        if receipt.hash != head {
            return Ok(ChainReport::fail(
                0,
                head.clone(),
                ChainFailureKind::BrokenLink,
                format!("latest {} is not the chain head {}", receipt.hash, head),
            ));
        }

        Ok(ChainReport {
            ok: true,
            count: 1,
            last_hash: receipt.hash,
            failure: None,
        })
    }

    /// Read every receipt in the log, oldest first.
    pub fn read_all(&self) -> Result<Vec<Receipt>, LedgerError> {
        self.lock()?
            .read_lines()?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(LedgerError::from))
            .collect()
    }
}

fn append_locked<S: ReceiptStore + ?Sized>(
    store: &mut S,
    draft: ReceiptDraft,
) -> Result<Receipt, LedgerError> {
    let head = store.head()?;
    let prev_hash = head.clone().unwrap_or_else(|| GENESIS.to_string());

    let receipt = Receipt::chain(draft, prev_hash)?;
    store.append_line(&receipt.to_canonical_line()?)?;

    // From here on the line is in the log; failures must not look like
    // "nothing was written" or the draft would be appended twice.
    if !store.compare_and_set_head(head.as_deref(), &receipt.hash)? {
        let actual = store.head()?.unwrap_or_else(|| GENESIS.to_string());
        tracing::error!("receipt {} written but head moved to {}", receipt.hash, actual);
        return Err(LedgerError::Unlinked {
            hash: receipt.hash,
            expected: head.unwrap_or_else(|| GENESIS.to_string()),
            actual,
        });
    }

    if let Err(source) = store.write_snapshot(&receipt) {
        tracing::warn!("receipt {} chained without a snapshot: {}", receipt.hash, source);
        return Err(LedgerError::SnapshotFailed {
            receipt: Box::new(receipt),
            source: Box::new(source),
        });
    }

    tracing::debug!(
        "appended receipt {} ({} / {})",
        receipt.hash,
        receipt.decision,
        receipt.reason
    );
    Ok(receipt)
}

/// Append parked drafts oldest first. Each draft leaves the parked list as
/// soon as it is on the chain, so a failure partway never replays the ones
/// before it.
fn flush_parked_locked<S: ReceiptStore + ?Sized>(store: &mut S) -> Result<usize, LedgerError> {
    let parked = store.parked()?;
    if parked.is_empty() {
        return Ok(0);
    }
    let mut flushed = 0;
    for draft in parked {
        match append_locked(store, draft) {
            Ok(_) | Err(LedgerError::SnapshotFailed { .. }) => store.drop_parked(1)?,
            Err(e) if e.reached_log() => {
                store.drop_parked(1)?;
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        flushed += 1;
    }
    tracing::info!("appended {} parked receipt(s)", flushed);
    Ok(flushed)
}

/// Bring the head pointer in line with the last record of the log.
fn reconcile_head<S: ReceiptStore + ?Sized>(store: &mut S) -> Result<(), LedgerError> {
    let lines = store.read_lines()?;
    let head = store.head()?;

    let Some(last_line) = lines.last() else {
        return match head {
            None => Ok(()),
            Some(h) => Err(LedgerError::CorruptHead {
                reason: format!("head points at {} but the log is empty", h),
            }),
        };
    };

    let last: Receipt = serde_json::from_str(last_line).map_err(|e| LedgerError::CorruptHead {
        reason: format!("last record is unreadable: {}", e),
    })?;

    let lagging_by_one = match head.as_deref() {
        Some(h) if h == last.hash => {
            let stale = store.latest()?.map_or(true, |p| p.hash != last.hash);
            if stale {
                store.write_snapshot(&last)?;
                tracing::info!("rewrote missing snapshot for chain head {}", last.hash);
            }
            return Ok(());
        }
        Some(h) => last.prev_hash == h,
        None => lines.len() == 1 && last.prev_hash == GENESIS,
    };

    if !lagging_by_one {
        return Err(LedgerError::CorruptHead {
            reason: format!(
                "head {:?} does not match last record {}",
                head, last.hash
            ),
        });
    }

    if store.compare_and_set_head(head.as_deref(), &last.hash)? {
        store.write_snapshot(&last)?;
        tracing::info!("advanced chain head to {} after interrupted append", last.hash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::ReceiptOutcome;
    use crate::store::{FileReceiptStore, MemoryReceiptStore};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tg_policy::Action;

    fn draft(n: usize) -> ReceiptDraft {
        ReceiptDraft::new("v2", Action::Allowed, "domain_ok", ReceiptOutcome::Executed)
            .with_tool("filesystem.writeFile")
            .with_action("write")
            .with_domain("general")
            .with_args(&json!({ "n": n }))
    }

    #[test]
    fn empty_ledger_verifies_trivially() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        let report = ledger.verify_chain().unwrap();
        assert!(report.ok);
        assert_eq!(report.count, 0);
        assert_eq!(report.last_hash, GENESIS);
        assert_eq!(ledger.head().unwrap(), GENESIS);
    }

    #[test]
    fn first_receipt_links_to_genesis_and_second_to_first() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        let r1 = ledger.append(draft(1)).unwrap();
        let r2 = ledger.append(draft(2)).unwrap();
        assert_eq!(r1.prev_hash, GENESIS);
        assert_eq!(r2.prev_hash, r1.hash);
        assert_eq!(ledger.head().unwrap(), r2.hash);
    }

    #[test]
    fn chain_of_appends_verifies_with_count() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        for i in 0..5 {
            ledger.append(draft(i)).unwrap();
        }
        let report = ledger.verify_chain().unwrap();
        assert!(report.ok);
        assert_eq!(report.count, 5);
        assert_eq!(report.last_hash, ledger.head().unwrap());
    }

    #[test]
    fn every_single_field_edit_is_detected() {
        // Flip one character inside each non-hash field of the middle record.
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        for i in 0..3 {
            ledger.append(draft(i)).unwrap();
        }
        let lines = ledger.lock().unwrap().read_lines().unwrap();

        for field in ["policy_version", "reason", "tool", "domain", "action", "args_digest", "prev_hash", "timestamp"] {
            let mut value: Value = serde_json::from_str(&lines[1]).unwrap();
            let original = value[field].as_str().unwrap().to_string();
            let mut chars: Vec<char> = original.chars().collect();
            let last = chars.len() - 1;
            chars[last] = if chars[last] == '0' { '1' } else { '0' };
            value[field] = Value::String(chars.into_iter().collect());

            let mut tampered = lines.clone();
            tampered[1] = serde_json::to_string(&value).unwrap();
            let report = verify_lines(&tampered);
            assert!(!report.ok, "edit to {} went unnoticed", field);
            let failure = report.failure.unwrap();
            assert!(failure.index >= 1, "{} failed at {}", field, failure.index);
        }
    }

    #[test]
    fn hash_mismatch_is_reported_at_the_edited_index() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        for i in 0..3 {
            ledger.append(draft(i)).unwrap();
        }
        let mut lines = ledger.lock().unwrap().read_lines().unwrap();
        lines[1] = lines[1].replace("domain_ok", "domain_ko");

        let report = verify_lines(&lines);
        let failure = report.failure.unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.kind, ChainFailureKind::HashMismatch);
        assert_eq!(report.count, 1);
    }

    #[test]
    fn deleted_record_breaks_the_link() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        for i in 0..3 {
            ledger.append(draft(i)).unwrap();
        }
        let mut lines = ledger.lock().unwrap().read_lines().unwrap();
        lines.remove(1);

        let failure = verify_lines(&lines).failure.unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.kind, ChainFailureKind::BrokenLink);
    }

    #[test]
    fn garbage_line_is_malformed() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        ledger.append(draft(0)).unwrap();
        let mut lines = ledger.lock().unwrap().read_lines().unwrap();
        lines.push("{not json".to_string());

        let failure = verify_lines(&lines).failure.unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.kind, ChainFailureKind::MalformedRecord);
    }

    #[test]
    fn added_field_is_detected() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        ledger.append(draft(0)).unwrap();
        let lines = ledger.lock().unwrap().read_lines().unwrap();
        let mut value: Value = serde_json::from_str(&lines[0]).unwrap();
        value["approved_by"] = json!("admin");

        let failure = verify_lines(&[value.to_string()]).failure.unwrap();
        assert_eq!(failure.kind, ChainFailureKind::HashMismatch);
    }

    #[test]
    fn concurrent_appends_do_not_fork_the_chain() {
        let ledger = Arc::new(ReceiptLedger::open(MemoryReceiptStore::new()).unwrap());
        std::thread::scope(|s| {
            for t in 0..8 {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || {
                    for i in 0..10 {
                        ledger.append(draft(t * 100 + i)).unwrap();
                    }
                });
            }
        });
        let report = ledger.verify_chain().unwrap();
        assert!(report.ok);
        assert_eq!(report.count, 80);
    }

    #[test]
    fn file_ledger_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = ReceiptLedger::open(FileReceiptStore::new(dir.path()).unwrap()).unwrap();
            ledger.append(draft(1)).unwrap();
        }
        {
            let ledger =
                ReceiptLedger::open_verified(FileReceiptStore::new(dir.path()).unwrap()).unwrap();
            ledger.append(draft(2)).unwrap();
            let report = ledger.verify_chain().unwrap();
            assert!(report.ok);
            assert_eq!(report.count, 2);
            assert_eq!(ledger.read_all().unwrap().len(), 2);
        }
    }

    #[test]
    fn open_verified_refuses_tampered_log() {
        let dir = tempdir().unwrap();
        let store = FileReceiptStore::new(dir.path()).unwrap();
        let log = store.log_path();
        {
            let ledger = ReceiptLedger::open(store).unwrap();
            ledger.append(draft(1)).unwrap();
            ledger.append(draft(2)).unwrap();
        }
        let raw = std::fs::read_to_string(&log).unwrap();
        std::fs::write(&log, raw.replacen("domain_ok", "domain_OK", 1)).unwrap();

        let err = ReceiptLedger::open_verified(FileReceiptStore::new(dir.path()).unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::ChainCorrupted { index: 0, .. }));
    }

    #[test]
    fn interrupted_append_is_completed_on_open() {
        // Simulate a crash between writing the line and moving the head.
        let mut store = MemoryReceiptStore::new();
        let r1 = Receipt::chain(draft(1), GENESIS).unwrap();
        store.append_line(&r1.to_canonical_line().unwrap()).unwrap();

        let ledger = ReceiptLedger::open(store).unwrap();
        assert_eq!(ledger.head().unwrap(), r1.hash);
        let r2 = ledger.append(draft(2)).unwrap();
        assert_eq!(r2.prev_hash, r1.hash);
    }

    #[test]
    fn head_pointing_nowhere_is_corrupt() {
        let mut store = MemoryReceiptStore::new();
        store.head = Some("deadbeef".to_string());
        assert!(matches!(
            ReceiptLedger::open(store).err().unwrap(),
            LedgerError::CorruptHead { .. }
        ));
    }

    #[test]
    fn parked_drafts_are_appended_on_open() {
        let mut store = MemoryReceiptStore::new();
        store.park(&draft(1)).unwrap();
        let ledger = ReceiptLedger::open(store).unwrap();
        let all = ledger.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].outcome, ReceiptOutcome::Executed);
        assert!(ledger.lock().unwrap().parked().unwrap().is_empty());
    }

    #[test]
    fn parked_drafts_go_ahead_of_the_next_append() {
        let ledger = ReceiptLedger::open(MemoryReceiptStore::new()).unwrap();
        ledger.park(&draft(1)).unwrap();
        let newest = ledger.append(draft(2)).unwrap();
        let all = ledger.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].hash, newest.hash);
        assert!(ledger.verify_chain().unwrap().ok);
    }

    #[test]
    fn latest_pointer_replays() {
        let dir = tempdir().unwrap();
        let ledger = ReceiptLedger::open(FileReceiptStore::new(dir.path()).unwrap()).unwrap();
        assert!(ledger.verify_latest().unwrap().ok);

        ledger.append(draft(1)).unwrap();
        let last = ledger.append(draft(2)).unwrap();
        let report = ledger.verify_latest().unwrap();
        assert!(report.ok);
        assert_eq!(report.last_hash, last.hash);
    }

    #[test]
    fn missing_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        let ledger = ReceiptLedger::open(FileReceiptStore::new(dir.path()).unwrap()).unwrap();
        let r = ledger.append(draft(1)).unwrap();
        let file = crate::store::snapshot_file_name(&r);
        std::fs::remove_file(dir.path().join(file)).unwrap();

        let report = ledger.verify_latest().unwrap();
        assert!(!report.ok);
        assert_eq!(report.failure.unwrap().kind, ChainFailureKind::MissingFile);
    }

    /// Memory store that fails its next snapshot, fails the append after
    /// `lines_before_failure` more successful lines, or lets another writer
    /// move the head just before it is linked.
    #[derive(Default)]
    struct Faulty {
        inner: MemoryReceiptStore,
        fail_next_snapshot: bool,
        lines_before_failure: Option<usize>,
        steal_head: bool,
    }

    fn disk_full() -> LedgerError {
        LedgerError::Io {
            path: "receipts".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        }
    }

    impl ReceiptStore for Faulty {
        fn head(&self) -> Result<Option<String>, LedgerError> {
            self.inner.head()
        }
        fn compare_and_set_head(&mut self, expected: Option<&str>, new_head: &str) -> Result<bool, LedgerError> {
            if self.steal_head {
                self.inner.head = Some("elsewhere".to_string());
            }
            self.inner.compare_and_set_head(expected, new_head)
        }
        fn append_line(&mut self, line: &str) -> Result<(), LedgerError> {
            match self.lines_before_failure {
                Some(0) => {
                    self.lines_before_failure = None;
                    Err(disk_full())
                }
                Some(n) => {
                    self.lines_before_failure = Some(n - 1);
                    self.inner.append_line(line)
                }
                None => self.inner.append_line(line),
            }
        }
        fn read_lines(&self) -> Result<Vec<String>, LedgerError> {
            self.inner.read_lines()
        }
        fn write_snapshot(&mut self, receipt: &Receipt) -> Result<(), LedgerError> {
            if std::mem::take(&mut self.fail_next_snapshot) {
                return Err(disk_full());
            }
            self.inner.write_snapshot(receipt)
        }
        fn latest(&self) -> Result<Option<crate::store::LatestPointer>, LedgerError> {
            self.inner.latest()
        }
        fn read_snapshot(&self, file: &str) -> Result<Option<String>, LedgerError> {
            self.inner.read_snapshot(file)
        }
        fn park(&mut self, draft: &ReceiptDraft) -> Result<(), LedgerError> {
            self.inner.park(draft)
        }
        fn parked(&self) -> Result<Vec<ReceiptDraft>, LedgerError> {
            self.inner.parked()
        }
        fn drop_parked(&mut self, count: usize) -> Result<(), LedgerError> {
            self.inner.drop_parked(count)
        }
    }

    #[test]
    fn snapshot_failure_is_reported_as_already_recorded() {
        let ledger = ReceiptLedger::open(Faulty {
            fail_next_snapshot: true,
            ..Faulty::default()
        })
        .unwrap();

        let err = ledger.append(draft(1)).unwrap_err();
        assert!(err.reached_log());
        let LedgerError::SnapshotFailed { receipt, .. } = err else {
            panic!("expected SnapshotFailed");
        };
        assert_eq!(ledger.head().unwrap(), receipt.hash);

        ledger.append(draft(2)).unwrap();
        let report = ledger.verify_chain().unwrap();
        assert!(report.ok);
        assert_eq!(report.count, 2);
        assert!(ledger.verify_latest().unwrap().ok);
    }

    #[test]
    fn reopen_rewrites_a_missing_head_snapshot() {
        let ledger = ReceiptLedger::open(Faulty {
            fail_next_snapshot: true,
            ..Faulty::default()
        })
        .unwrap();
        assert!(ledger.append(draft(1)).is_err());
        assert!(!ledger.verify_latest().unwrap().ok);

        let store = ledger.store.into_inner().unwrap();
        let reopened = ReceiptLedger::open(store).unwrap();
        assert!(reopened.verify_latest().unwrap().ok);
        assert_eq!(reopened.read_all().unwrap().len(), 1);
    }

    #[test]
    fn failed_flush_never_replays_chained_drafts() {
        let mut store = Faulty {
            lines_before_failure: Some(1),
            ..Faulty::default()
        };
        for n in 1..=3 {
            store.park(&draft(n)).unwrap();
        }
        let ledger = ReceiptLedger {
            store: Mutex::new(store),
        };

        // The first draft is chained, the second hits the full disk.
        assert!(ledger.flush_parked().is_err());
        assert_eq!(ledger.read_all().unwrap().len(), 1);
        assert_eq!(ledger.lock().unwrap().parked().unwrap().len(), 2);

        assert_eq!(ledger.flush_parked().unwrap(), 2);
        let all = ledger.read_all().unwrap();
        let digests: std::collections::BTreeSet<_> = all.iter().map(|r| r.args_digest.clone()).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(digests.len(), 3);
        assert!(ledger.verify_chain().unwrap().ok);
        assert!(ledger.lock().unwrap().parked().unwrap().is_empty());
    }

    #[test]
    fn moved_head_is_reported_as_already_written() {
        let ledger = ReceiptLedger::open(Faulty {
            steal_head: true,
            ..Faulty::default()
        })
        .unwrap();
        let err = ledger.append(draft(1)).unwrap_err();
        assert!(err.reached_log());
        assert!(matches!(err, LedgerError::Unlinked { .. }));
    }
}
