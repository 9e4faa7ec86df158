// submit.rs — Send one tool request through the gate kernel.
//
// The kernel is built from the project's gate config with the filesystem
// connector bound. Filesystem tools are confined to `<root>/tmp` unless
// `--sandbox` says otherwise, and can never reach `.toolgate/`. The outcome
// is printed as JSON on stdout; a refusal or failure prints
// `{ "error": <code>, "message": ... }` and exits non-zero.

use std::io::Read;
use std::path::Path;

use serde_json::{json, Value};
use tg_connector_fs::FsSandbox;
use tg_gate::{GateConfig, GateError, GateKernel, Outcome};

pub fn execute(
    config: &GateConfig,
    request: Option<&str>,
    file: Option<&Path>,
    sandbox: Option<&Path>,
) -> anyhow::Result<()> {
    let raw = read_request(request, file)?;
    let sandbox = sandbox_for(config, sandbox);
    tracing::debug!("filesystem sandbox: {}", sandbox.root().display());

    match submit(config, &sandbox, raw) {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&error_body(&e))?);
            anyhow::bail!("request not executed: {}", e.code())
        }
    }
}

fn read_request(request: Option<&str>, file: Option<&Path>) -> anyhow::Result<Value> {
    let text = match (request, file) {
        (_, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?,
        (Some(inline), None) if inline != "-" => inline.to_string(),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("request is not valid JSON: {}", e))
}

/// The sandbox for filesystem tools. The gate's state directory is always
/// protected, whatever root is chosen.
fn sandbox_for(config: &GateConfig, root: Option<&Path>) -> FsSandbox {
    let root = root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.project_root.join("tmp"));
    let root = root.canonicalize().unwrap_or(root);
    let state_dir = config
        .state_dir
        .canonicalize()
        .unwrap_or_else(|_| config.state_dir.clone());
    FsSandbox::new(root).with_protected(state_dir)
}

fn submit(config: &GateConfig, sandbox: &FsSandbox, raw: Value) -> Result<Outcome, GateError> {
    let gate = sandbox.bind(GateKernel::from_config(config)?).build()?;
    gate.submit_json(raw)
}

fn error_body(err: &GateError) -> Value {
    let mut body = json!({ "error": err.code(), "message": err.to_string() });
    // The operation already ran; surface its result alongside the error.
    if let GateError::ReceiptDeferred { result, .. } = err {
        body["result"] = result.clone();
    }
    body
}
