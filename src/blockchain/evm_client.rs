// src/blockchain/evm_client.rs

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{
        Address, Block, BlockId, BlockNumber, Bytes, Transaction, TransactionReceipt,
        TransactionRequest, H256, U256, U64,
    },
};
use ethers_providers::{Http, Middleware, Provider};
use secrecy::{ExposeSecret, SecretString};

use crate::blockchain::{
    client::{ChainClient, ChainError},
    nonce_manager::NonceManager,
    services::transactions,
};

/// JSON-RPC client for one EVM chain, optionally holding a signing key.
#[derive(Clone)]
pub struct EvmClient {
    provider: Arc<Provider<Http>>,
    rpc_url: String,
    chain_id: u64,
    wallet: Option<LocalWallet>,
    nonce_manager: NonceManager,
    http: reqwest::Client,
}

impl EvmClient {
    /// Create a read-only client for the given RPC URL
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| anyhow!("Failed to create provider for {}: {}", rpc_url, e))?;
        Ok(Self {
            provider: Arc::new(provider),
            rpc_url: rpc_url.to_string(),
            chain_id,
            wallet: None,
            nonce_manager: NonceManager::new(),
            http: reqwest::Client::new(),
        })
    }

    /// Attach the signing key used for write operations.
    pub fn with_private_key(mut self, private_key: &SecretString) -> Result<Self> {
        let wallet = LocalWallet::from_str(private_key.expose_secret().trim_start_matches("0x"))
            .map_err(|e| anyhow!("Invalid private key: {}", e))?
            .with_chain_id(self.chain_id);
        tracing::info!("Signer loaded for {:?}", wallet.address());
        self.wallet = Some(wallet);
        Ok(self)
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

fn rpc_err<E: std::fmt::Display>(e: E) -> ChainError {
    ChainError::Rpc(e.to_string())
}

#[async_trait]
impl ChainClient for EvmClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sender(&self) -> Result<Address, ChainError> {
        self.wallet
            .as_ref()
            .map(|w| w.address())
            .ok_or(ChainError::MissingCredential)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider.get_balance(address, None).await.map_err(rpc_err)
    }

    async fn get_block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(rpc_err)
    }

    async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ChainError> {
        let id = BlockId::Number(BlockNumber::Number(U64::from(number)));
        self.provider.get_block(id).await.map_err(rpc_err)
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        self.provider.get_transaction(hash).await.map_err(rpc_err)
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_err)
    }

    async fn get_gas_price(&self) -> Result<U256, ChainError> {
        self.provider.get_gas_price().await.map_err(rpc_err)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::new().to(to).data(data).into();
        self.provider.call(&tx, None).await.map_err(rpc_err)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError> {
        let wallet = self.wallet.as_ref().ok_or(ChainError::MissingCredential)?;
        transactions::send_evm_transaction(
            &self.http,
            &self.rpc_url,
            wallet,
            tx,
            &self.nonce_manager,
            self.chain_id,
        )
        .await
        .map_err(rpc_err)
    }
}
