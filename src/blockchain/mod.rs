// src/blockchain/mod.rs

// Re-export the client module with EVM client
pub mod client;
pub mod evm_client;
pub use client::{ChainClient, ChainError, EvmClient};

// Re-export other modules
pub mod models;
pub mod nonce_manager;
pub mod services;
pub mod tokens;

// Re-export commonly used types
pub use ethers::types::{Address, H256, U256, U64};
