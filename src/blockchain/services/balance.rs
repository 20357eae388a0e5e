use ethers::types::{Address, U256};
use futures::future::join_all;
use tracing::warn;

use crate::blockchain::{
    client::{ChainClient, ChainError},
    models::{BalanceEntry, BalanceReport},
    services::{abi, amounts},
    tokens::TokenDescriptor,
};

/// Balance of `owner` in `token`, native or ERC-20.
pub async fn token_balance(
    chain: &dyn ChainClient,
    token: &TokenDescriptor,
    owner: Address,
) -> Result<U256, ChainError> {
    if token.is_native() {
        chain.get_balance(owner).await
    } else {
        let raw = chain.call(token.address, abi::balance_of(owner)).await?;
        abi::decode_u256(&raw).map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}

/// Balances for each of `tokens`. A failed read is reported on its entry
/// instead of failing the whole report.
pub async fn get_balances(
    chain: &dyn ChainClient,
    owner: Address,
    tokens: &[TokenDescriptor],
) -> BalanceReport {
    let reads = tokens.iter().map(|token| async move {
        match token_balance(chain, token, owner).await {
            Ok(raw) => BalanceEntry {
                symbol: token.symbol.clone(),
                raw: Some(raw.to_string()),
                formatted: Some(amounts::from_base_units(raw, token.decimals)),
                error: None,
            },
            Err(e) => {
                warn!("Failed to read {} balance for {:?}: {}", token.symbol, owner, e);
                BalanceEntry {
                    symbol: token.symbol.clone(),
                    raw: None,
                    formatted: None,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    BalanceReport {
        owner,
        balances: join_all(reads).await,
    }
}
