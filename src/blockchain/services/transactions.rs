// src/blockchain/services/transactions.rs

use anyhow::{anyhow, Context, Result};
use ethers_core::types::{TransactionRequest, H256, U256, U64};
use ethers_signers::{LocalWallet, Signer};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::blockchain::nonce_manager::NonceManager;

async fn rpc(client: &Client, rpc_url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let payload = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let response: serde_json::Value = client
        .post(rpc_url)
        .json(&payload)
        .send()
        .await?
        .json()
        .await?;
    if let Some(err) = response.get("error") {
        return Err(anyhow!("RPC Error in {}: {}", method, err));
    }
    Ok(response["result"].clone())
}

fn parse_hex_u256(value: &serde_json::Value, what: &str) -> Result<U256> {
    let hex = value
        .as_str()
        .with_context(|| format!("Failed to get {} from RPC", what))?;
    Ok(U256::from_str_radix(hex.trim_start_matches("0x"), 16)?)
}

/// A centralized function for sending any EVM transaction.
/// It uses the NonceManager to prevent nonce races between concurrent
/// operations from the same signer.
pub async fn send_evm_transaction(
    client: &Client,
    rpc_url: &str,
    wallet: &LocalWallet,
    tx_request: TransactionRequest,
    nonce_manager: &NonceManager,
    expected_chain_id: u64,
) -> Result<H256> {
    let from_address = wallet.address();

    // Refuse to sign for a node on a different chain than configured.
    let chain_id_value = rpc(client, rpc_url, "eth_chainId", json!([])).await?;
    let chain_id_hex = chain_id_value
        .as_str()
        .context("Failed to get chain_id from RPC")?;
    let chain_id = U64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)?;
    if chain_id.as_u64() != expected_chain_id {
        return Err(anyhow!(
            "RPC endpoint reports chain {} but {} is configured",
            chain_id,
            expected_chain_id
        ));
    }

    let nonce = nonce_manager
        .get_next_nonce(client, from_address, rpc_url)
        .await?;

    let result = sign_and_send(client, rpc_url, wallet, tx_request, nonce, expected_chain_id).await;
    if result.is_err() {
        warn!("Submission from {:?} with nonce {} failed; releasing it", from_address, nonce);
        nonce_manager.release(from_address, nonce).await;
    }
    result
}

async fn sign_and_send(
    client: &Client,
    rpc_url: &str,
    wallet: &LocalWallet,
    tx_request: TransactionRequest,
    nonce: U256,
    chain_id: u64,
) -> Result<H256> {
    // Populate the final transaction request
    let mut tx = tx_request
        .from(wallet.address())
        .nonce(nonce)
        .chain_id(chain_id);

    // If gas is not provided, estimate it via eth_estimateGas
    if tx.gas.is_none() {
        let call_obj = serde_json::to_value(&tx)?;
        let gas = parse_hex_u256(
            &rpc(client, rpc_url, "eth_estimateGas", json!([call_obj])).await?,
            "gas estimate",
        )?;
        // 20% headroom over the node's estimate.
        tx = tx.gas(gas * U256::from(12u64) / U256::from(10u64));
    }

    // If gas price not provided, fetch eth_gasPrice and use legacy gas_price
    if tx.gas_price.is_none() {
        let gp = parse_hex_u256(
            &rpc(client, rpc_url, "eth_gasPrice", json!([])).await?,
            "gasPrice",
        )?;
        tx = tx.gas_price(gp);
    }

    // Sign the transaction
    let signer = wallet.clone().with_chain_id(chain_id);
    let signature = signer.sign_transaction(&tx.clone().into()).await?;
    let raw_tx = tx.rlp_signed(&signature);

    debug!("Broadcasting tx with nonce {}", nonce);
    let result = rpc(
        client,
        rpc_url,
        "eth_sendRawTransaction",
        json!([format!("0x{}", hex::encode(raw_tx))]),
    )
    .await?;

    let tx_hash = result
        .as_str()
        .ok_or_else(|| anyhow!("Failed to extract transaction hash from response"))?;

    tx_hash
        .parse::<H256>()
        .map_err(|e| anyhow!("Invalid transaction hash '{}': {}", tx_hash, e))
}
