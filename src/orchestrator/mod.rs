// src/orchestrator/mod.rs

//! Transaction orchestration.
//!
//! Every write operation is turned into an [`pipeline::ActionPlan`] and driven
//! through the same stage machine:
//! `Validating -> (ApprovalPending ->) Acting -> Confirming -> Done`, with
//! `Failed` reachable from any stage. Each call re-reads balances, allowances
//! and quotes; nothing is cached between calls, so retrying a failed call is
//! safe (a new transaction is built each time).

pub mod nft;
pub mod pipeline;
pub mod staking;
pub mod swap;
pub mod transfer;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;

pub use staking::{UnstakeOptions, UnstakeStrategy};

use crate::blockchain::{
    client::ChainClient,
    models::{BalanceReport, OrchestrationError, Quote},
    services::{
        balance,
        metadata::{MetadataHost, SimulatedMetadataHost},
        quote::QuoteEngine,
    },
    tokens::{TokenDescriptor, TokenRegistry},
};
use crate::config::{ApprovalPolicy, Config, DEFAULT_ROUTER_ADDRESS};

/// Knobs the orchestrator reads on every operation.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub router: Address,
    pub confirmation_timeout: Duration,
    pub confirmations: u64,
    pub approval_policy: ApprovalPolicy,
    /// Percent, one decimal of precision ("0.5").
    pub default_slippage: String,
    pub unstake_prefer_swap: bool,
    pub nft_factory: Option<Address>,
    pub deadline_secs: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            router: Address::from_str(DEFAULT_ROUTER_ADDRESS).unwrap_or_else(|_| Address::zero()),
            confirmation_timeout: Duration::from_secs(60),
            confirmations: 1,
            approval_policy: ApprovalPolicy::Exact,
            default_slippage: "0.5".to_string(),
            unstake_prefer_swap: false,
            nft_factory: None,
            deadline_secs: 1200,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            router: config.router_address,
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            confirmations: config.confirmations,
            approval_policy: config.approval_policy,
            default_slippage: config.default_slippage.clone(),
            unstake_prefer_swap: config.unstake_prefer_swap,
            nft_factory: config.nft_factory_address,
            deadline_secs: config.swap_deadline_secs,
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    chain: Arc<dyn ChainClient>,
    registry: Arc<TokenRegistry>,
    quotes: QuoteEngine,
    settings: OrchestratorSettings,
    metadata: Arc<dyn MetadataHost>,
}

impl Orchestrator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        registry: Arc<TokenRegistry>,
        settings: OrchestratorSettings,
    ) -> Self {
        let quotes = QuoteEngine::new(chain.clone(), registry.clone(), settings.router);
        Self {
            chain,
            registry,
            quotes,
            settings,
            metadata: Arc::new(SimulatedMetadataHost),
        }
    }

    /// Replaces the simulated metadata host used by collection deploys.
    pub fn with_metadata_host(mut self, host: Arc<dyn MetadataHost>) -> Self {
        self.metadata = host;
        self
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn quotes(&self) -> &QuoteEngine {
        &self.quotes
    }

    pub async fn quote(
        &self,
        source: &str,
        destination: &str,
        amount_in: &str,
    ) -> Result<Quote, OrchestrationError> {
        self.quotes.quote(source, destination, amount_in).await
    }

    /// Balances of `owner` (the signer when `None`) for `symbols`, or for the
    /// native asset and every registered token when `symbols` is empty.
    pub async fn balances(
        &self,
        owner: Option<&str>,
        symbols: &[String],
    ) -> Result<BalanceReport, OrchestrationError> {
        let owner = match owner {
            Some(raw) => parse_address(raw)?,
            None => self
                .chain
                .sender()
                .map_err(|_| OrchestrationError::MissingCredential)?,
        };

        let tokens: Vec<TokenDescriptor> = if symbols.is_empty() {
            std::iter::once(self.registry.native().clone())
                .chain(self.registry.tokens().iter().cloned())
                .collect()
        } else {
            symbols
                .iter()
                .map(|s| self.registry.resolve(s))
                .collect::<Result<_, _>>()?
        };

        Ok(balance::get_balances(self.chain.as_ref(), owner, &tokens).await)
    }
}

/// Parses a 0x-prefixed, 20-byte address.
pub fn parse_address(raw: &str) -> Result<Address, OrchestrationError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(OrchestrationError::InvalidAddress(trimmed.to_string()));
    }
    Address::from_str(trimmed).map_err(|_| OrchestrationError::InvalidAddress(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_requires_full_hex() {
        assert!(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_ok());
        assert_eq!(
            parse_address("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            Err(OrchestrationError::InvalidAddress(
                "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266".into()
            ))
        );
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzz9Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_err());
    }

    #[test]
    fn settings_follow_config() {
        let config = Config {
            confirmation_timeout_secs: 5,
            approval_policy: ApprovalPolicy::Unlimited,
            ..Config::default()
        };
        let settings = OrchestratorSettings::from(&config);
        assert_eq!(settings.confirmation_timeout, Duration::from_secs(5));
        assert_eq!(settings.approval_policy, ApprovalPolicy::Unlimited);
        assert_eq!(settings.router, config.router_address);
    }
}
