// src/lib.rs

use std::sync::Arc;

use anyhow::Context;

// Re-export commonly used types
pub use ethers::types::{Address, H256, U256, U64};

// Re-export modules
pub mod api;
pub mod blockchain;
pub mod config;
pub mod format;
pub mod intent;
pub mod mcp;
pub mod orchestrator;
pub mod utils;

use blockchain::{client::ChainClient, tokens::TokenRegistry};
use orchestrator::{Orchestrator, OrchestratorSettings};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Chain access for reads and signed writes
    pub chain: Arc<dyn ChainClient>,
    /// Token table, built once at startup
    pub registry: Arc<TokenRegistry>,
    /// Runs every write operation
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Builds the registry (with configured extras) and the orchestrator
    /// around `chain`.
    pub fn new(config: config::Config, chain: Arc<dyn ChainClient>) -> anyhow::Result<Self> {
        let registry = TokenRegistry::monad_testnet()?
            .with_tokens(config.extra_tokens.clone())
            .context("EXTRA_TOKENS conflicts with the built-in token table")?
            .with_paths(config.swap_path_overrides.clone())
            .context("SWAP_PATH_OVERRIDES names an unknown token")?;
        let registry = Arc::new(registry);
        let orchestrator = Orchestrator::new(
            chain.clone(),
            registry.clone(),
            OrchestratorSettings::from(&config),
        );
        Ok(Self {
            config,
            chain,
            registry,
            orchestrator,
        })
    }
}
