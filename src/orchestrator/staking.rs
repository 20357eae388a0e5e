// src/orchestrator/staking.rs

//! Liquid staking against the aprMON vault.
//!
//! Staking deposits native MON through the vault's payable
//! `deposit(uint256,address)`. Unstaking tries `requestRedeem` first and falls
//! back to transferring aprMON to the vault, which the vault treats as a
//! redemption request. With `prefer_swap` both are skipped and aprMON is sold
//! for MON on the router instead.

use ethers::types::U256;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    pipeline::{ActionPlan, Funding},
    Orchestrator,
};
use crate::blockchain::{
    models::{ErrorKind, Execution, Method, Operation, OrchestrationError, OrchestrationResult},
    services::{abi, amounts},
    tokens::{TokenDescriptor, STAKED_SYMBOL},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnstakeOptions {
    /// Sell aprMON on the router instead of redeeming. Falls back to the
    /// configured default when unset.
    #[serde(default)]
    pub prefer_swap: Option<bool>,
    /// Slippage percent for the swap route.
    #[serde(default)]
    pub slippage: Option<String>,
}

/// Ways of getting out of an aprMON position, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnstakeStrategy {
    Withdraw,
    Transfer,
    Swap,
}

impl UnstakeStrategy {
    const REDEEM_ORDER: [UnstakeStrategy; 2] = [UnstakeStrategy::Withdraw, UnstakeStrategy::Transfer];
}

impl std::fmt::Display for UnstakeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnstakeStrategy::Withdraw => write!(f, "withdraw"),
            UnstakeStrategy::Transfer => write!(f, "transfer"),
            UnstakeStrategy::Swap => write!(f, "swap"),
        }
    }
}

/// Whether a failed strategy may be followed by the next one. A timed-out
/// transaction can still be mined, and input or funding problems would fail
/// every strategy the same way.
fn can_fall_back(err: &OrchestrationError) -> bool {
    !matches!(
        err.kind(),
        ErrorKind::ConfirmationTimeout
            | ErrorKind::MissingCredential
            | ErrorKind::InsufficientFunds
            | ErrorKind::BalanceQueryFailed
            | ErrorKind::InvalidAmount
            | ErrorKind::InvalidAddress
            | ErrorKind::UnsupportedToken
            | ErrorKind::UnsupportedPair
            | ErrorKind::InvalidConfiguration
    )
}

impl Orchestrator {
    fn staked_token(&self) -> Result<TokenDescriptor, OrchestrationError> {
        self.registry.resolve(STAKED_SYMBOL)
    }

    /// Stakes `amount` MON into the aprMON vault.
    pub async fn stake(&self, amount: &str) -> OrchestrationResult {
        self.try_stake(amount).await.into()
    }

    pub(crate) async fn try_stake(&self, amount: &str) -> Result<Execution, OrchestrationError> {
        let native = self.registry.native().clone();
        let vault = self.staked_token()?;
        let raw = amounts::to_base_units(amount, native.decimals)?;
        let sender = self.sender()?;

        // Share preview is informational only.
        let expected_shares = match self
            .chain
            .call(vault.address, abi::convert_to_shares(raw))
            .await
        {
            Ok(bytes) => abi::decode_u256(&bytes).ok(),
            Err(e) => {
                debug!("convertToShares preview failed: {}", e);
                None
            }
        };

        self.execute(ActionPlan {
            operation: Operation::Stake,
            method: Method::Deposit,
            funding: Funding::Native(raw),
            spender: None,
            to: vault.address,
            value: raw,
            data: abi::stake_deposit(raw, sender),
            input_symbol: native.symbol.clone(),
            input_amount: amounts::from_base_units(raw, native.decimals),
            output_symbol: Some(vault.symbol.clone()),
            expected_output: expected_shares.map(|s| amounts::from_base_units(s, vault.decimals)),
            minimum_output: None,
            recipient: Some(sender),
        })
        .await
    }

    /// Unstakes `amount` aprMON. The strategy that went through is recorded
    /// as the execution's method, earlier failures in `fallback_attempts`.
    pub async fn unstake(&self, amount: &str, options: UnstakeOptions) -> OrchestrationResult {
        self.try_unstake(amount, options).await.into()
    }

    pub(crate) async fn try_unstake(
        &self,
        amount: &str,
        options: UnstakeOptions,
    ) -> Result<Execution, OrchestrationError> {
        let vault = self.staked_token()?;
        let raw = amounts::to_base_units(amount, vault.decimals)?;

        if options
            .prefer_swap
            .unwrap_or(self.settings.unstake_prefer_swap)
        {
            let slippage = options
                .slippage
                .as_deref()
                .unwrap_or(self.settings.default_slippage.as_str());
            let tenths = amounts::parse_slippage(slippage)?;
            info!("Unstaking {} {} via {}", amount, vault.symbol, UnstakeStrategy::Swap);
            let native = self.registry.native().clone();
            let mut execution = self.swap_resolved(&vault, &native, raw, tenths).await?;
            execution.operation = Operation::Unstake;
            return Ok(execution);
        }

        let sender = self.sender()?;
        let mut attempts = Vec::new();
        for strategy in UnstakeStrategy::REDEEM_ORDER {
            info!("Unstaking {} {} via {}", amount, vault.symbol, strategy);
            match self.execute(self.redeem_plan(strategy, &vault, raw, sender)).await {
                Ok(mut execution) => {
                    execution.fallback_attempts = attempts;
                    return Ok(execution);
                }
                Err(err) if can_fall_back(&err) => {
                    warn!("Unstake strategy {} failed: {}", strategy, err);
                    attempts.push(format!("{}: {}", strategy, err));
                }
                Err(err) => return Err(err),
            }
        }
        Err(OrchestrationError::StrategyExhausted { attempts })
    }

    fn redeem_plan(
        &self,
        strategy: UnstakeStrategy,
        vault: &TokenDescriptor,
        shares: U256,
        sender: ethers::types::Address,
    ) -> ActionPlan {
        let (method, data) = match strategy {
            UnstakeStrategy::Transfer => (Method::Transfer, abi::transfer(vault.address, shares)),
            _ => (Method::Withdraw, abi::request_redeem(shares, sender, sender)),
        };
        ActionPlan {
            operation: Operation::Unstake,
            method,
            funding: Funding::Token {
                token: vault.clone(),
                amount: shares,
            },
            // The vault burns or receives the caller's own shares.
            spender: None,
            to: vault.address,
            value: U256::zero(),
            data,
            input_symbol: vault.symbol.clone(),
            input_amount: amounts::from_base_units(shares, vault.decimals),
            output_symbol: Some(self.registry.native().symbol.clone()),
            expected_output: None,
            minimum_output: None,
            recipient: Some(sender),
        }
    }

    pub async fn claim_withdrawals(&self) -> OrchestrationResult {
        OrchestrationResult::FeatureDisabled {
            feature: "claim_withdrawals".to_string(),
            reason: "withdrawal claims are not available on the aprMON testnet vault".to_string(),
        }
    }

    pub async fn pending_withdrawals(&self) -> OrchestrationResult {
        OrchestrationResult::FeatureDisabled {
            feature: "pending_withdrawals".to_string(),
            reason: "withdrawal request tracking is not available on the aprMON testnet vault"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;

    #[test]
    fn timeouts_and_input_errors_stop_the_fallback_chain() {
        assert!(!can_fall_back(&OrchestrationError::ConfirmationTimeout {
            tx_hash: H256::zero(),
            waited_secs: 60
        }));
        assert!(!can_fall_back(&OrchestrationError::MissingCredential));
        assert!(!can_fall_back(&OrchestrationError::InsufficientFunds {
            symbol: "aprMON".into(),
            required: "1".into(),
            available: "0".into()
        }));
        assert!(can_fall_back(&OrchestrationError::SubmissionFailed("reverted in estimate".into())));
        assert!(can_fall_back(&OrchestrationError::TransactionReverted {
            tx_hash: H256::zero()
        }));
    }

    #[test]
    fn redeem_order_starts_with_withdraw() {
        assert_eq!(
            UnstakeStrategy::REDEEM_ORDER,
            [UnstakeStrategy::Withdraw, UnstakeStrategy::Transfer]
        );
        assert_eq!(UnstakeStrategy::Swap.to_string(), "swap");
    }
}
