// src/blockchain/nonce_manager.rs

use std::sync::Arc;

use dashmap::DashMap;
use ethers_core::types::{Address, U256};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::warn;

// Manages nonces for multiple sender addresses so concurrent operations
// from the same signer get sequential nonces.
#[derive(Debug, Clone, Default)]
pub struct NonceManager {
    // Each address gets its own state, protected by a Mutex.
    // The DashMap allows for concurrent access to different address states.
    nonces: Arc<DashMap<Address, Arc<Mutex<NonceState>>>>,
}

#[derive(Debug)]
struct NonceState {
    next_nonce: Option<U256>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: Address) -> Arc<Mutex<NonceState>> {
        self.nonces
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(NonceState { next_nonce: None })))
            .clone()
    }

    /// Gets the next valid nonce for a given address.
    /// Fetches the pending count from the node the first time (or after a
    /// reset), then hands out sequential values.
    pub async fn get_next_nonce(
        &self,
        client: &Client,
        address: Address,
        rpc_url: &str,
    ) -> anyhow::Result<U256> {
        let address_nonce_lock = self.slot(address);

        // Lock the mutex specifically for this address.
        let mut state = address_nonce_lock.lock().await;

        let nonce_to_use = match state.next_nonce {
            Some(nonce) => nonce,
            None => {
                let payload = serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": "eth_getTransactionCount",
                    "params": [format!("{:?}", address), "pending"],
                    "id": 1
                });

                let resp: serde_json::Value = client
                    .post(rpc_url)
                    .json(&payload)
                    .send()
                    .await?
                    .json()
                    .await?;

                if let Some(err) = resp.get("error") {
                    return Err(anyhow::anyhow!("RPC Error fetching nonce: {}", err));
                }
                let nonce_hex = resp["result"]
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("Failed to get nonce from RPC response"))?;
                U256::from_str_radix(nonce_hex.trim_start_matches("0x"), 16)?
            }
        };

        // Increment the nonce for the *next* transaction and save it.
        state.next_nonce = Some(nonce_to_use + U256::one());

        Ok(nonce_to_use)
    }

    /// Forgets the cached nonce so the next call re-reads it from the node.
    pub async fn reset(&self, address: Address) {
        let slot = self.slot(address);
        slot.lock().await.next_nonce = None;
    }

    /// Gives back `nonce` after its submission failed.
    ///
    /// When it is still the latest nonce handed out, the next call reuses it.
    /// Otherwise later nonces may already be in flight: the cache is dropped
    /// and the node's pending count decides. Until the gap at `nonce` is
    /// filled, those later transactions stay queued, and one still being
    /// signed can collide with the re-read value.
    pub async fn release(&self, address: Address, nonce: U256) {
        let slot = self.slot(address);
        let mut state = slot.lock().await;
        if state.next_nonce == Some(nonce + U256::one()) {
            state.next_nonce = Some(nonce);
        } else {
            warn!(
                "Nonce {} for {:?} failed after later nonces were handed out; re-reading from the node",
                nonce, address
            );
            state.next_nonce = None;
        }
    }
}
