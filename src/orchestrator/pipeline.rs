// src/orchestrator/pipeline.rs

use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::blockchain::{
    client::ChainError,
    models::{ApprovalRecord, Execution, Method, Operation, OrchestrationError, Stage},
    services::{abi, amounts, balance},
    tokens::TokenDescriptor,
};
use crate::config::ApprovalPolicy;

/// What the sender must hold for the action to go through.
#[derive(Debug, Clone)]
pub enum Funding {
    /// Native value attached to the transaction.
    Native(U256),
    /// An ERC-20 amount moved by the action.
    Token { token: TokenDescriptor, amount: U256 },
}

/// One write operation, fully resolved and ready to run.
#[derive(Debug, Clone)]
pub struct ActionPlan {
    pub operation: Operation,
    pub method: Method,
    pub funding: Funding,
    /// Third-party contract pulling `Funding::Token`; triggers the allowance check.
    pub spender: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub input_symbol: String,
    pub input_amount: String,
    pub output_symbol: Option<String>,
    pub expected_output: Option<String>,
    pub minimum_output: Option<String>,
    pub recipient: Option<Address>,
}

impl ActionPlan {
    fn request(&self, sender: Address) -> TransactionRequest {
        let tx = TransactionRequest::new()
            .from(sender)
            .to(self.to)
            .data(self.data.clone());
        if self.value.is_zero() {
            tx
        } else {
            tx.value(self.value)
        }
    }
}

struct StageTracker {
    operation: Operation,
    stage: Stage,
}

impl StageTracker {
    fn new(operation: Operation) -> Self {
        debug!(operation = ?operation, stage = %Stage::Validating, "stage");
        Self {
            operation,
            stage: Stage::Validating,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(operation = ?self.operation, from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    fn fail(&mut self, err: &OrchestrationError) {
        warn!(operation = ?self.operation, stage = %self.stage, error = %err, "operation failed");
        self.stage = Stage::Failed;
    }
}

impl Orchestrator {
    /// Runs `plan` through the stage machine and returns the confirmed execution.
    pub(crate) async fn execute(&self, plan: ActionPlan) -> Result<Execution, OrchestrationError> {
        self.execute_with_receipt(plan).await.map(|(execution, _)| execution)
    }

    /// Like [`Orchestrator::execute`], also handing back the action receipt.
    pub(crate) async fn execute_with_receipt(
        &self,
        plan: ActionPlan,
    ) -> Result<(Execution, TransactionReceipt), OrchestrationError> {
        let mut tracker = StageTracker::new(plan.operation);
        let result = self.drive(&plan, &mut tracker).await;
        match &result {
            Ok((execution, _)) => {
                tracker.advance(Stage::Done);
                info!(
                    "{:?} via {} confirmed in block {}: {:?}",
                    plan.operation, plan.method, execution.block_number, execution.tx_hash
                );
            }
            Err(err) => tracker.fail(err),
        }
        result
    }

    async fn drive(
        &self,
        plan: &ActionPlan,
        tracker: &mut StageTracker,
    ) -> Result<(Execution, TransactionReceipt), OrchestrationError> {
        let sender = self.sender()?;
        self.check_funds(sender, &plan.funding).await?;

        let approval = match (&plan.funding, plan.spender) {
            (Funding::Token { token, amount }, Some(spender)) => {
                tracker.advance(Stage::ApprovalPending);
                self.ensure_allowance(sender, token, spender, *amount).await?
            }
            _ => None,
        };

        tracker.advance(Stage::Acting);
        let tx_hash = self
            .chain
            .send_transaction(plan.request(sender))
            .await
            .map_err(submission_error)?;
        info!("Submitted {} transaction {:?}", plan.method, tx_hash);

        tracker.advance(Stage::Confirming);
        let receipt = self.confirm(tx_hash).await?;

        let execution = Execution {
            operation: plan.operation,
            method: plan.method,
            approval,
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
            input_symbol: plan.input_symbol.clone(),
            input_amount: plan.input_amount.clone(),
            output_symbol: plan.output_symbol.clone(),
            expected_output: plan.expected_output.clone(),
            minimum_output: plan.minimum_output.clone(),
            recipient: plan.recipient,
            contract_address: None,
            fallback_attempts: Vec::new(),
        };
        Ok((execution, receipt))
    }

    pub(crate) fn sender(&self) -> Result<Address, OrchestrationError> {
        self.chain
            .sender()
            .map_err(|_| OrchestrationError::MissingCredential)
    }

    async fn check_funds(&self, owner: Address, funding: &Funding) -> Result<(), OrchestrationError> {
        let (token, required) = match funding {
            Funding::Native(amount) => (self.registry.native().clone(), *amount),
            Funding::Token { token, amount } => (token.clone(), *amount),
        };
        let available = balance::token_balance(self.chain.as_ref(), &token, owner)
            .await
            .map_err(|e| OrchestrationError::BalanceQueryFailed(e.to_string()))?;
        if available < required {
            return Err(OrchestrationError::InsufficientFunds {
                symbol: token.symbol.clone(),
                required: amounts::from_base_units(required, token.decimals),
                available: amounts::from_base_units(available, token.decimals),
            });
        }
        Ok(())
    }

    /// Makes sure `spender` may pull `amount` of `token` from `owner`,
    /// submitting and confirming an approval when the allowance is short.
    async fn ensure_allowance(
        &self,
        owner: Address,
        token: &TokenDescriptor,
        spender: Address,
        amount: U256,
    ) -> Result<Option<ApprovalRecord>, OrchestrationError> {
        let raw = self
            .chain
            .call(token.address, abi::allowance(owner, spender))
            .await
            .map_err(|e| OrchestrationError::AllowanceQueryFailed(e.to_string()))?;
        let current = abi::decode_u256(&raw)
            .map_err(|e| OrchestrationError::AllowanceQueryFailed(e.to_string()))?;
        if current >= amount {
            debug!("{} allowance {} covers {}; no approval needed", token.symbol, current, amount);
            return Ok(None);
        }

        let policy = self.settings.approval_policy;
        let approved = match policy {
            ApprovalPolicy::Exact => amount,
            ApprovalPolicy::Unlimited => U256::MAX,
        };
        info!(
            "Approving {:?} to spend {} {} ({} policy)",
            spender, approved, token.symbol, policy
        );

        let tx = TransactionRequest::new()
            .from(owner)
            .to(token.address)
            .data(abi::approve(spender, approved));
        let tx_hash = self.chain.send_transaction(tx).await.map_err(|e| match e {
            ChainError::MissingCredential => OrchestrationError::MissingCredential,
            other => OrchestrationError::ApprovalFailed(other.to_string()),
        })?;

        let receipt = self.confirm(tx_hash).await.map_err(|e| match e {
            OrchestrationError::TransactionReverted { tx_hash } => {
                OrchestrationError::ApprovalFailed(format!("approval {:?} reverted", tx_hash))
            }
            other => other,
        })?;

        Ok(Some(ApprovalRecord {
            token: token.symbol.clone(),
            spender,
            amount: approved,
            policy,
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
        }))
    }

    /// Waits for `tx_hash` to be mined. A status-0 receipt is a revert no
    /// matter how many confirmations it has.
    async fn confirm(&self, tx_hash: H256) -> Result<TransactionReceipt, OrchestrationError> {
        let receipt = self
            .chain
            .wait_for_receipt(
                tx_hash,
                self.settings.confirmation_timeout,
                self.settings.confirmations,
            )
            .await
            .map_err(|e| match e {
                ChainError::Timeout { tx_hash, waited_secs } => {
                    OrchestrationError::ConfirmationTimeout { tx_hash, waited_secs }
                }
                other => OrchestrationError::SubmissionFailed(other.to_string()),
            })?;

        if receipt.status.map(|s| s.as_u64()) == Some(0) {
            return Err(OrchestrationError::TransactionReverted { tx_hash });
        }
        Ok(receipt)
    }
}

fn submission_error(err: ChainError) -> OrchestrationError {
    match err {
        ChainError::MissingCredential => OrchestrationError::MissingCredential,
        other => OrchestrationError::SubmissionFailed(other.to_string()),
    }
}
