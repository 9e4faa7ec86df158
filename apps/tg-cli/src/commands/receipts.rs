// receipts.rs — Receipt subcommands: verify, latest, tail.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tg_audit::{verify_lines, ChainReport, FileReceiptStore, Receipt, ReceiptLedger, ReceiptStore};
use tg_gate::GateConfig;

#[derive(Subcommand)]
pub enum ReceiptsCommands {
    /// Replay the whole receipt chain from GENESIS.
    Verify {
        /// Receipts directory (defaults to .toolgate/receipts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Check that the latest snapshot is intact and is the chain head.
    Latest {
        /// Receipts directory (defaults to .toolgate/receipts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show recent receipts.
    Tail {
        /// Receipts directory (defaults to .toolgate/receipts).
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Number of receipts to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &ReceiptsCommands, config: &GateConfig) -> anyhow::Result<()> {
    match cmd {
        ReceiptsCommands::Verify { dir } => {
            let dir = receipts_dir(dir, config);
            let Some(report) = verify(&dir)? else {
                println!("No receipts found at {}", dir.display());
                return Ok(());
            };
            print_report(&report, "hash chain intact")
        }

        ReceiptsCommands::Latest { dir } => {
            let dir = receipts_dir(dir, config);
            let Some(report) = latest(&dir)? else {
                println!("No receipts found at {}", dir.display());
                return Ok(());
            };
            print_report(&report, "latest snapshot is the chain head")
        }

        ReceiptsCommands::Tail { dir, n } => {
            let dir = receipts_dir(dir, config);
            let receipts = tail(&dir, *n)?;
            if receipts.is_empty() {
                println!("No receipts.");
                return Ok(());
            }
            for r in &receipts {
                println!(
                    "{} {:<9} {:<8} {:<24} {}  {}",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.decision,
                    serde_json::to_value(r.outcome)?.as_str().unwrap_or("?"),
                    r.reason,
                    r.tool.as_deref().unwrap_or("-"),
                    &r.hash[..12.min(r.hash.len())],
                );
            }
            Ok(())
        }
    }
}

fn receipts_dir(dir: &Option<PathBuf>, config: &GateConfig) -> PathBuf {
    dir.clone().unwrap_or_else(|| config.receipts_dir.clone())
}

/// Replay the log. Read-only: parked drafts and a lagging head are left
/// for the gate to reconcile. None when there is no receipts directory.
fn verify(dir: &Path) -> anyhow::Result<Option<ChainReport>> {
    if !dir.exists() {
        return Ok(None);
    }
    let store = FileReceiptStore::new(dir)?;
    Ok(Some(verify_lines(&store.read_lines()?)))
}

fn latest(dir: &Path) -> anyhow::Result<Option<ChainReport>> {
    if !dir.exists() {
        return Ok(None);
    }
    let ledger = ReceiptLedger::open(FileReceiptStore::new(dir)?)?;
    Ok(Some(ledger.verify_latest()?))
}

fn tail(dir: &Path, n: usize) -> anyhow::Result<Vec<Receipt>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let lines = FileReceiptStore::new(dir)?.read_lines()?;
    let start = lines.len().saturating_sub(n);
    lines[start..]
        .iter()
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

fn print_report(report: &ChainReport, ok_message: &str) -> anyhow::Result<()> {
    if report.ok {
        println!(
            "Receipts verified: {} record(s), {}. Head: {}",
            report.count, ok_message, report.last_hash
        );
        return Ok(());
    }
    if let Some(failure) = &report.failure {
        println!("INTEGRITY VIOLATION at record {}:", failure.index);
        println!("  Kind:   {}", failure.kind);
        println!("  Detail: {}", failure.detail);
        println!();
        println!("The receipt ledger may have been tampered with.");
    }
    anyhow::bail!("Receipt ledger verification failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tg_audit::{ChainFailureKind, ReceiptDraft, ReceiptOutcome};
    use tg_policy::Action;

    fn ledger_with(n: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        let ledger = ReceiptLedger::open(FileReceiptStore::new(dir.path()).unwrap()).unwrap();
        for i in 0..n {
            ledger
                .append(
                    ReceiptDraft::new("v2", Action::Allowed, format!("r{}", i), ReceiptOutcome::Executed)
                        .with_tool("filesystem.readFile"),
                )
                .unwrap();
        }
        dir
    }

    #[test]
    fn missing_dir_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let absent = dir.path().join("receipts");
        assert!(verify(&absent).unwrap().is_none());
        assert!(latest(&absent).unwrap().is_none());
        assert!(tail(&absent, 5).unwrap().is_empty());
        assert!(!absent.exists());
    }

    #[test]
    fn intact_chain_verifies() {
        let dir = ledger_with(3);
        let report = verify(dir.path()).unwrap().unwrap();
        assert!(report.ok);
        assert_eq!(report.count, 3);
        assert!(latest(dir.path()).unwrap().unwrap().ok);
        assert!(print_report(&report, "ok").is_ok());
    }

    #[test]
    fn edited_record_is_reported_by_index() {
        let dir = ledger_with(3);
        let log = dir.path().join("receipts.jsonl");
        let edited = std::fs::read_to_string(&log).unwrap().replacen("\"r1\"", "\"rX\"", 1);
        std::fs::write(&log, edited).unwrap();

        let report = verify(dir.path()).unwrap().unwrap();
        let failure = report.failure.clone().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.kind, ChainFailureKind::HashMismatch);
        assert!(print_report(&report, "ok").is_err());
    }

    #[test]
    fn tail_returns_the_newest() {
        let dir = ledger_with(5);
        let recent = tail(dir.path(), 2).unwrap();
        assert_eq!(
            recent.iter().map(|r| r.reason.as_str()).collect::<Vec<_>>(),
            vec!["r3", "r4"]
        );
    }
}
