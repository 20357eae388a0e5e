//! Chain client boundary.
//!
//! Everything the orchestrator needs from the network goes through
//! [`ChainClient`]: reads, submission of signed transactions and waiting for
//! receipts. The production implementation is [`EvmClient`]; tests drive the
//! orchestrator with a recording mock.

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{
    Address, Block, Bytes, Transaction, TransactionReceipt, TransactionRequest, H256, U256,
};
use thiserror::Error;
use tracing::{debug, warn};

pub use super::evm_client::EvmClient;

/// How often `wait_for_receipt` polls the node.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("no signing key configured")]
    MissingCredential,
    #[error("transaction {tx_hash:?} not mined after {waited_secs}s")]
    Timeout { tx_hash: H256, waited_secs: u64 },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Address that signs write operations.
    fn sender(&self) -> Result<Address, ChainError>;

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn get_block_number(&self) -> Result<u64, ChainError>;

    async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ChainError>;

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError>;

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError>;

    async fn get_gas_price(&self) -> Result<U256, ChainError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Signs and broadcasts `tx` from [`ChainClient::sender`]; returns its hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError>;

    /// Polls until `hash` is mined with `confirmations` blocks on top of it
    /// (counting its own), or `timeout` elapses. Giving up does not cancel the
    /// transaction. Transient read errors are logged and polling continues.
    async fn wait_for_receipt(
        &self,
        hash: H256,
        timeout: Duration,
        confirmations: u64,
    ) -> Result<TransactionReceipt, ChainError> {
        let wait = async {
            loop {
                match self.get_transaction_receipt(hash).await {
                    Ok(Some(receipt)) => {
                        let mined_at = receipt.block_number.map(|b| b.as_u64());
                        match (mined_at, confirmations) {
                            (_, 0) | (_, 1) => return receipt,
                            (Some(mined_at), needed) => match self.get_block_number().await {
                                Ok(head) if head + 1 >= mined_at + needed => return receipt,
                                Ok(head) => debug!(
                                    "{:?} has {} of {} confirmations",
                                    hash,
                                    (head + 1).saturating_sub(mined_at),
                                    needed
                                ),
                                Err(e) => warn!("block number poll failed: {}", e),
                            },
                            (None, _) => debug!("{:?} receipt has no block number yet", hash),
                        }
                    }
                    Ok(None) => debug!("{:?} not mined yet", hash),
                    Err(e) => warn!("receipt poll for {:?} failed: {}", hash, e),
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ChainError::Timeout {
                tx_hash: hash,
                waited_secs: timeout.as_secs(),
            })
    }
}
