// gated_filesystem.rs — The filesystem connector behind a real gate kernel.
//
// Writes need confirmation, deletes are not on the allow-list, and nothing
// can escape the sandbox even when the gate allows the call.

use std::fs;

use serde_json::json;
use tempfile::tempdir;

use tg_connector_fs::{FsSandbox, DELETE_FILE, READ_FILE, WRITE_FILE};
use tg_gate::{GateKernel, Outcome};
use tg_integrity::{IntegrityManifest, ManifestVerifier};
use tg_policy::{PolicyEngine, RuleTable};

fn gate(root: &std::path::Path, sandbox: &FsSandbox) -> GateKernel {
    fs::write(root.join("trusted.txt"), "trusted").unwrap();
    let manifest = root.join("manifest.json");
    IntegrityManifest::generate(root, &["trusted.txt"])
        .unwrap()
        .write(&manifest)
        .unwrap();

    let rules = RuleTable::default()
        .with_allowed_tools([WRITE_FILE, READ_FILE])
        .with_confirm_required_actions(["write"]);
    let builder = GateKernel::builder(PolicyEngine::new(rules), ManifestVerifier::new(root, manifest));
    sandbox.bind(builder).build().unwrap()
}

#[test]
fn confirmed_write_then_read() {
    let root = tempdir().unwrap();
    let sandbox_dir = tempdir().unwrap();
    let sandbox = FsSandbox::new(sandbox_dir.path());
    let gate = gate(root.path(), &sandbox);

    let write = json!({
        "tool": WRITE_FILE,
        "action": "write",
        "domain": "filesystem",
        "args": { "path": "tmp/confirm_write.txt", "content": "written after confirm\n" }
    });

    let pending = gate.submit_json(write.clone()).unwrap();
    assert!(pending.is_pending());
    assert!(!sandbox_dir.path().join("tmp/confirm_write.txt").exists());

    let mut confirmed = write;
    confirmed["confirmToken"] = json!(pending.confirm_token().unwrap());
    let Outcome::Executed { result, .. } = gate.submit_json(confirmed).unwrap() else {
        panic!("confirmed write should execute");
    };
    assert_eq!(result["bytes"], 22);

    let Outcome::Executed { result, .. } = gate
        .submit_json(json!({
            "tool": READ_FILE,
            "action": "read",
            "domain": "filesystem",
            "args": { "path": "tmp/confirm_write.txt" }
        }))
        .unwrap()
    else {
        panic!("read should execute");
    };
    assert_eq!(result["content"], "written after confirm\n");
}

#[test]
fn delete_is_bound_but_not_allowed() {
    let root = tempdir().unwrap();
    let sandbox_dir = tempdir().unwrap();
    fs::write(sandbox_dir.path().join("keep.txt"), "keep").unwrap();
    let sandbox = FsSandbox::new(sandbox_dir.path());
    let gate = gate(root.path(), &sandbox);

    let err = gate
        .submit_json(json!({
            "tool": DELETE_FILE,
            "action": "read",
            "domain": "filesystem",
            "args": { "path": "keep.txt" },
            "intent": "please, only trying to help"
        }))
        .unwrap_err();
    assert_eq!(err.code(), "unauthorized_tool");
    assert!(sandbox_dir.path().join("keep.txt").exists());
}

#[test]
fn allowed_read_still_cannot_escape_the_sandbox() {
    let root = tempdir().unwrap();
    let sandbox_dir = tempdir().unwrap();
    let sandbox = FsSandbox::new(sandbox_dir.path());
    let gate = gate(root.path(), &sandbox);

    let err = gate
        .submit_json(json!({
            "tool": READ_FILE,
            "action": "read",
            "domain": "filesystem",
            "args": { "path": "../trusted.txt" }
        }))
        .unwrap_err();
    assert_eq!(err.code(), "operation_failed");
    // A failed operation leaves no executed receipt.
    assert!(gate
        .ledger()
        .read_all()
        .unwrap()
        .iter()
        .all(|r| r.outcome != tg_audit::ReceiptOutcome::Executed));
}
