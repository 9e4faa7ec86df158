// kernel.rs — The gate kernel: decide, confirm, execute, record.
//
// GateKernel is the only path from a tool call request to an operation.
// It holds the sole Capability and the operation table bound to it, so an
// operation can only run once the kernel has reached an `allowed` verdict:
//
//   integrity (once) → validate → evaluate (AND) → refuse | confirm | execute
//
// Every refusal and every pending confirmation writes its receipt before the
// caller sees the result. An executed receipt is written only after the
// operation returned Ok. If that append fails before anything reached the
// log, the draft is parked and the caller gets `receipt_deferred`; a record
// that is on the chain is never parked again.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tg_audit::hasher::scope_key;
use tg_audit::{
    FileReceiptStore, LedgerError, MemoryReceiptStore, Receipt, ReceiptDraft, ReceiptLedger,
    ReceiptOutcome, ReceiptStore,
};
use tg_confirm::{ConfirmationStore, JsonFileConfirmationStore, MemoryConfirmationStore};
use tg_integrity::{
    IntegrityCheck, IntegrityError, IntegrityReport, ManifestVerifier, SignedManifestVerifier,
};
use tg_policy::{Action, PolicyEngine, RuleInput, Verdict};

use crate::capability::Capability;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::operation::{Operation, OperationTable};
use crate::request::{Outcome, PendingConfirmation, ToolRequest};

const UNAUTHORIZED_TOOL: &str = "unauthorized_tool";
const INVALID_INPUT: &str = "invalid_input";
const INVALID_CONFIRMATION: &str = "invalid_confirmation";

type IntegrityState = Result<IntegrityReport, Arc<IntegrityError>>;

/// Assembles a [`GateKernel`]. Stores default to in-memory backends.
pub struct GateKernelBuilder {
    engine: PolicyEngine,
    integrity: Box<dyn IntegrityCheck>,
    receipts: Box<dyn ReceiptStore>,
    confirmations: Box<dyn ConfirmationStore>,
    verify_chain_on_open: bool,
    operations: Vec<(String, Box<dyn Operation>)>,
}

impl GateKernelBuilder {
    pub fn with_receipt_store(mut self, store: impl ReceiptStore + 'static) -> Self {
        self.receipts = Box::new(store);
        self
    }

    pub fn with_confirmation_store(mut self, store: impl ConfirmationStore + 'static) -> Self {
        self.confirmations = Box::new(store);
        self
    }

    /// Replay the receipt chain at build time and refuse a broken one.
    pub fn verify_chain_on_open(mut self, verify: bool) -> Self {
        self.verify_chain_on_open = verify;
        self
    }

    /// Bind an operation under a tool name. Rebinding a name replaces it.
    pub fn with_operation(
        mut self,
        tool: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> Self {
        self.operations.push((tool.into(), Box::new(operation)));
        self
    }

    /// Open the ledger and bind every operation to a freshly minted capability.
    pub fn build(self) -> Result<GateKernel, GateError> {
        let ledger = if self.verify_chain_on_open {
            ReceiptLedger::open_verified(self.receipts)?
        } else {
            ReceiptLedger::open(self.receipts)?
        };

        let capability = Capability::mint();
        let mut operations = OperationTable::new(&capability);
        for (tool, operation) in self.operations {
            operations.bind(tool, operation);
        }

        tracing::info!(
            "gate kernel ready: policy {}, {} operation(s) bound",
            self.engine.version(),
            operations.tools().count()
        );

        Ok(GateKernel {
            engine: self.engine,
            ledger,
            confirmations: self.confirmations,
            integrity: self.integrity,
            integrity_state: OnceLock::new(),
            capability,
            operations,
        })
    }
}

/// The capability-guarded execution boundary.
///
/// `GateKernel` is `Send + Sync`; share one instance (e.g. in an `Arc`)
/// between every thread that submits tool calls.
pub struct GateKernel {
    engine: PolicyEngine,
    ledger: ReceiptLedger<Box<dyn ReceiptStore>>,
    confirmations: Box<dyn ConfirmationStore>,
    integrity: Box<dyn IntegrityCheck>,
    integrity_state: OnceLock<IntegrityState>,
    capability: Capability,
    operations: OperationTable,
}

impl GateKernel {
    /// Start assembling a kernel. The integrity check is mandatory.
    pub fn builder(
        engine: PolicyEngine,
        integrity: impl IntegrityCheck + 'static,
    ) -> GateKernelBuilder {
        GateKernelBuilder {
            engine,
            integrity: Box::new(integrity),
            receipts: Box::new(MemoryReceiptStore::new()),
            confirmations: Box::new(MemoryConfirmationStore::new()),
            verify_chain_on_open: true,
            operations: Vec::new(),
        }
    }

    /// A builder wired to the file stores and manifest described by `config`.
    pub fn from_config(config: &GateConfig) -> Result<GateKernelBuilder, GateError> {
        let engine = PolicyEngine::new(config.rule_table()?);
        let plain = ManifestVerifier::new(&config.project_root, &config.manifest_path);

        let builder = if config.options.require_signed_manifest {
            GateKernel::builder(
                engine,
                SignedManifestVerifier::new(
                    plain,
                    &config.signature_path,
                    &config.public_key_path,
                ),
            )
        } else {
            GateKernel::builder(engine, plain)
        };

        let mut confirmations = JsonFileConfirmationStore::new(&config.confirmations_file);
        if let Some(ttl) = config.confirmation_ttl() {
            confirmations = confirmations.with_ttl(ttl);
        }

        Ok(builder
            .with_receipt_store(FileReceiptStore::new(&config.receipts_dir)?)
            .with_confirmation_store(confirmations)
            .verify_chain_on_open(config.options.verify_chain_on_open))
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &ReceiptLedger<Box<dyn ReceiptStore>> {
        &self.ledger
    }

    /// Names of the bound operations.
    pub fn tools(&self) -> Vec<String> {
        self.operations.tools().map(str::to_string).collect()
    }

    /// Run the integrity check (once per kernel) and return its result.
    /// Concurrent first callers block until it is known.
    pub fn integrity_report(&self) -> Result<&IntegrityReport, GateError> {
        let state = self.integrity_state.get_or_init(|| {
            self.integrity.verify().map_err(|e| {
                tracing::warn!("integrity check failed; gate will refuse every request: {}", e);
                Arc::new(e)
            })
        });
        state.as_ref().map_err(|e| GateError::Integrity(Arc::clone(e)))
    }

    /// Parse a JSON request and submit it. Anything that does not parse as
    /// a request is refused as `invalid_input`.
    pub fn submit_json(&self, raw: Value) -> Result<Outcome, GateError> {
        self.integrity_report()?;
        match serde_json::from_value::<ToolRequest>(raw) {
            Ok(request) => self.submit(request),
            Err(e) => self.refuse_invalid(&ToolRequest::default(), e.to_string()),
        }
    }

    /// Decide on a tool call and, if permitted, execute it.
    pub fn submit(&self, request: ToolRequest) -> Result<Outcome, GateError> {
        self.integrity_report()?;

        if let Err(reason) = request.validate() {
            return self.refuse_invalid(&request, reason);
        }

        let args = request.effective_args();
        let input = RuleInput::new(&request.tool, &request.action, &request.domain);
        let verdict = self.engine.evaluate(&input);

        match verdict.action {
            Action::Refused => self.refuse(&request, &args, &verdict.reason),
            _ if !self.operations.contains(&request.tool) => {
                self.refuse(&request, &args, UNAUTHORIZED_TOOL)
            }
            Action::Degraded => match request.confirm_token.as_deref() {
                Some(token) => self.redeem(&request, &args, &input, token),
                None => self.request_confirmation(&request, &args, &verdict),
            },
            Action::Allowed => self.execute(&request, &args, &verdict),
        }
    }

    fn draft(
        &self,
        request: &ToolRequest,
        args: &Value,
        decision: Action,
        reason: &str,
        outcome: ReceiptOutcome,
    ) -> ReceiptDraft {
        ReceiptDraft::new(self.engine.version(), decision, reason, outcome)
            .with_tool(&request.tool)
            .with_action(&request.action)
            .with_domain(&request.domain)
            .with_args(args)
    }

    /// Append a receipt. A record that is on the chain but lost its
    /// snapshot counts as written; the next open rewrites the snapshot.
    fn record(&self, draft: ReceiptDraft) -> Result<Receipt, LedgerError> {
        match self.ledger.append(draft) {
            Err(LedgerError::SnapshotFailed { receipt, .. }) => Ok(*receipt),
            other => other,
        }
    }

    fn refuse_invalid(&self, request: &ToolRequest, reason: String) -> Result<Outcome, GateError> {
        let draft = self.draft(
            request,
            &request.args,
            Action::Refused,
            INVALID_INPUT,
            ReceiptOutcome::Blocked,
        );
        self.record(draft)?;
        tracing::warn!("refused malformed request: {}", reason);
        Err(GateError::InvalidInput { reason })
    }

    fn refuse(
        &self,
        request: &ToolRequest,
        args: &Value,
        reason: &str,
    ) -> Result<Outcome, GateError> {
        let draft = self.draft(request, args, Action::Refused, reason, ReceiptOutcome::Blocked);
        self.record(draft)?;
        tracing::warn!("refused {} ({})", request.tool, reason);
        if reason == UNAUTHORIZED_TOOL {
            Err(GateError::UnauthorizedTool {
                tool: request.tool.clone(),
            })
        } else {
            Err(GateError::Refused {
                reason: reason.to_string(),
            })
        }
    }

    fn request_confirmation(
        &self,
        request: &ToolRequest,
        args: &Value,
        verdict: &Verdict,
    ) -> Result<Outcome, GateError> {
        let draft = self.draft(
            request,
            args,
            Action::Degraded,
            &verdict.reason,
            ReceiptOutcome::Blocked,
        );
        // Record first: a token is only issued once its receipt is written.
        self.record(draft)?;
        let token = self.confirmations.issue(&scope_key(&request.tool, args))?;
        tracing::info!("{} needs confirmation ({})", request.tool, verdict.reason);
        Ok(Outcome::Pending(PendingConfirmation {
            needs_confirmation: true,
            confirm_token: token,
            reason: verdict.reason.clone(),
        }))
    }

    fn redeem(
        &self,
        request: &ToolRequest,
        args: &Value,
        input: &RuleInput<'_>,
        token: &str,
    ) -> Result<Outcome, GateError> {
        if !self.confirmations.consume(token, &scope_key(&request.tool, args))? {
            let draft = self.draft(
                request,
                args,
                Action::Degraded,
                INVALID_CONFIRMATION,
                ReceiptOutcome::Blocked,
            );
            self.record(draft)?;
            tracing::warn!("rejected confirmation token for {}", request.tool);
            return Err(GateError::InvalidConfirmation);
        }

        let confirmed = self.engine.evaluate(&input.confirmed(true));
        if confirmed.is_allowed() {
            self.execute(request, args, &confirmed)
        } else {
            self.refuse(request, args, &confirmed.reason)
        }
    }

    fn execute(
        &self,
        request: &ToolRequest,
        args: &Value,
        verdict: &Verdict,
    ) -> Result<Outcome, GateError> {
        let result = self
            .operations
            .invoke(&self.capability, &request.tool, args)
            .map_err(|e| {
                tracing::warn!("operation {} failed: {}", request.tool, e);
                GateError::Operation(e)
            })?;

        let draft = self.draft(
            request,
            args,
            Action::Allowed,
            &verdict.reason,
            ReceiptOutcome::Executed,
        );
        match self.record(draft.clone()) {
            Ok(receipt) => {
                tracing::info!("executed {} (receipt {})", request.tool, receipt.hash);
                Ok(Outcome::Executed {
                    result,
                    receipt_hash: receipt.hash,
                })
            }
            Err(source) if source.reached_log() => {
                tracing::error!(
                    "executed {} but its receipt is not linked into the chain: {}",
                    request.tool,
                    source
                );
                Err(GateError::ReceiptDeferred { result, source })
            }
            Err(source) => {
                self.ledger.park(&draft).map_err(|park_err| {
                    tracing::error!(
                        "executed {} but could not record or park its receipt: {}",
                        request.tool,
                        park_err
                    );
                    GateError::Ledger(park_err)
                })?;
                Err(GateError::ReceiptDeferred { result, source })
            }
        }
    }
}
