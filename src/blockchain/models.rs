// src/blockchain/models.rs
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApprovalPolicy;

// --- Error types for orchestrated operations ---

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestrationError {
    #[error("unsupported {}token '{symbol}'. Supported tokens: {}", .role.as_ref().map(|r| format!("{} ", r)).unwrap_or_default(), .supported.join(", "))]
    UnsupportedToken {
        symbol: String,
        /// "source" or "destination" when the token was one side of a pair.
        role: Option<String>,
        supported: Vec<String>,
    },
    #[error("cannot trade {input} for {output}: {reason}")]
    UnsupportedPair {
        input: String,
        output: String,
        reason: String,
    },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("insufficient {symbol} balance: need {required}, have {available}")]
    InsufficientFunds {
        symbol: String,
        required: String,
        available: String,
    },
    #[error("balance query failed: {0}")]
    BalanceQueryFailed(String),
    #[error("allowance query failed: {0}")]
    AllowanceQueryFailed(String),
    #[error("approval failed: {0}")]
    ApprovalFailed(String),
    #[error("path query failed: {0}")]
    PathQueryFailed(String),
    #[error("transaction submission failed: {0}")]
    SubmissionFailed(String),
    #[error("transaction {tx_hash:?} reverted")]
    TransactionReverted { tx_hash: H256 },
    /// The transaction was submitted and may still be mined after this error.
    #[error("transaction {tx_hash:?} not confirmed within {waited_secs}s; it may still be mined later")]
    ConfirmationTimeout { tx_hash: H256, waited_secs: u64 },
    #[error("no signing key configured (set PRIVATE_KEY)")]
    MissingCredential,
    #[error("all strategies failed: {}", .attempts.join("; "))]
    StrategyExhausted { attempts: Vec<String> },
    #[error("metadata upload failed: {0}")]
    MetadataUploadFailed(String),
    #[error("{feature} is disabled: {reason}")]
    FeatureDisabled { feature: String, reason: String },
    #[error("invalid server configuration: {0}")]
    InvalidConfiguration(String),
}

/// Stable classification of an [`OrchestrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedToken,
    UnsupportedPair,
    InvalidAmount,
    InvalidAddress,
    InsufficientFunds,
    BalanceQueryFailed,
    AllowanceQueryFailed,
    ApprovalFailed,
    PathQueryFailed,
    SubmissionFailed,
    TransactionReverted,
    ConfirmationTimeout,
    MissingCredential,
    StrategyExhausted,
    MetadataUploadFailed,
    FeatureDisabled,
    InvalidConfiguration,
}

impl ErrorKind {
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ErrorKind::UnsupportedToken
                | ErrorKind::UnsupportedPair
                | ErrorKind::InvalidAmount
                | ErrorKind::InvalidAddress
        )
    }
}

impl OrchestrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestrationError::UnsupportedToken { .. } => ErrorKind::UnsupportedToken,
            OrchestrationError::UnsupportedPair { .. } => ErrorKind::UnsupportedPair,
            OrchestrationError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            OrchestrationError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            OrchestrationError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            OrchestrationError::BalanceQueryFailed(_) => ErrorKind::BalanceQueryFailed,
            OrchestrationError::AllowanceQueryFailed(_) => ErrorKind::AllowanceQueryFailed,
            OrchestrationError::ApprovalFailed(_) => ErrorKind::ApprovalFailed,
            OrchestrationError::PathQueryFailed(_) => ErrorKind::PathQueryFailed,
            OrchestrationError::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            OrchestrationError::TransactionReverted { .. } => ErrorKind::TransactionReverted,
            OrchestrationError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            OrchestrationError::MissingCredential => ErrorKind::MissingCredential,
            OrchestrationError::StrategyExhausted { .. } => ErrorKind::StrategyExhausted,
            OrchestrationError::MetadataUploadFailed(_) => ErrorKind::MetadataUploadFailed,
            OrchestrationError::FeatureDisabled { .. } => ErrorKind::FeatureDisabled,
            OrchestrationError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
        }
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            OrchestrationError::TransactionReverted { tx_hash }
            | OrchestrationError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }

    /// Errors caused by the caller's input rather than the chain.
    pub fn is_invalid_input(&self) -> bool {
        self.kind().is_invalid_input()
    }

    /// Attaches the pair side to an `UnsupportedToken` error.
    pub fn with_role(self, side: &str) -> Self {
        match self {
            OrchestrationError::UnsupportedToken { symbol, supported, .. } => {
                OrchestrationError::UnsupportedToken {
                    symbol,
                    role: Some(side.to_string()),
                    supported,
                }
            }
            other => other,
        }
    }
}

// --- Orchestration models ---

/// Where an operation is in its lifecycle. `Failed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    ApprovalPending,
    Acting,
    Confirming,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::ApprovalPending => "approval_pending",
            Stage::Acting => "acting",
            Stage::Confirming => "confirming",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Transfer,
    Wrap,
    Unwrap,
    Swap,
    Stake,
    Unstake,
    DeployCollection,
}

/// The contract entry point (or strategy) that carried an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "native_transfer")]
    NativeTransfer,
    #[serde(rename = "transfer")]
    Transfer,
    #[serde(rename = "deposit")]
    Deposit,
    #[serde(rename = "withdraw")]
    Withdraw,
    #[serde(rename = "swapExactETHForTokens")]
    SwapExactEthForTokens,
    #[serde(rename = "swapExactTokensForETH")]
    SwapExactTokensForEth,
    #[serde(rename = "swapExactTokensForTokens")]
    SwapExactTokensForTokens,
    #[serde(rename = "createCollection")]
    CreateCollection,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::NativeTransfer => "native_transfer",
            Method::Transfer => "transfer",
            Method::Deposit => "deposit",
            Method::Withdraw => "withdraw",
            Method::SwapExactEthForTokens => "swapExactETHForTokens",
            Method::SwapExactTokensForEth => "swapExactTokensForETH",
            Method::SwapExactTokensForTokens => "swapExactTokensForTokens",
            Method::CreateCollection => "createCollection",
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(
            self,
            Method::SwapExactEthForTokens
                | Method::SwapExactTokensForEth
                | Method::SwapExactTokensForTokens
        )
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of an approval granted during an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub token: String,
    pub spender: Address,
    /// Approved amount in smallest units.
    #[serde(with = "u256_dec")]
    pub amount: U256,
    pub policy: ApprovalPolicy,
    pub tx_hash: H256,
    pub block_number: u64,
}

/// A completed operation. Only built once the action is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub operation: Operation,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRecord>,
    pub tx_hash: H256,
    pub block_number: u64,
    pub input_symbol: String,
    /// Human units.
    pub input_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// Failed strategies tried before the one that succeeded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_attempts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<H256>,
}

impl From<&OrchestrationError> for FailureReport {
    fn from(err: &OrchestrationError) -> Self {
        FailureReport {
            kind: err.kind(),
            message: err.to_string(),
            tx_hash: err.tx_hash(),
        }
    }
}

/// The unit handed to the formatter and to tool callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrchestrationResult {
    Success(Execution),
    Failure(FailureReport),
    FeatureDisabled { feature: String, reason: String },
}

impl OrchestrationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OrchestrationResult::Success(_))
    }
}

impl From<Result<Execution, OrchestrationError>> for OrchestrationResult {
    fn from(result: Result<Execution, OrchestrationError>) -> Self {
        match result {
            Ok(execution) => OrchestrationResult::Success(execution),
            Err(OrchestrationError::FeatureDisabled { feature, reason }) => {
                OrchestrationResult::FeatureDisabled { feature, reason }
            }
            Err(err) => OrchestrationResult::Failure(FailureReport::from(&err)),
        }
    }
}

// --- Quote Models ---

/// Expected output for a swap at current reserves. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub source: String,
    pub destination: String,
    /// Human units.
    pub amount_in: String,
    /// Human units.
    pub amount_out: String,
    /// Output per unit of input; display only.
    pub rate: f64,
    #[serde(with = "u256_dec")]
    pub amount_in_raw: U256,
    #[serde(with = "u256_dec")]
    pub amount_out_raw: U256,
    pub path: Vec<Address>,
}

// --- Balance Models ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub owner: Address,
    pub balances: Vec<BalanceEntry>,
}

// --- NFT Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_max_supply")]
    pub max_supply: u64,
}

fn default_max_supply() -> u64 {
    100
}

/// Serializes `U256` as a decimal string instead of hex.
pub mod u256_dec {
    use ethers::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(D::Error::custom)
    }
}
