// src/blockchain/services/quote.rs

use std::sync::Arc;

use ethers::types::{Address, U256};
use tracing::{debug, info};

use crate::blockchain::{
    client::ChainClient,
    models::{OrchestrationError, Quote},
    services::{abi, amounts},
    tokens::{SwapPath, TokenDescriptor, TokenRegistry},
};

/// Prices token pairs against the V2 router's `getAmountsOut`.
#[derive(Clone)]
pub struct QuoteEngine {
    chain: Arc<dyn ChainClient>,
    registry: Arc<TokenRegistry>,
    router: Address,
}

impl QuoteEngine {
    pub fn new(chain: Arc<dyn ChainClient>, registry: Arc<TokenRegistry>, router: Address) -> Self {
        Self {
            chain,
            registry,
            router,
        }
    }

    pub fn router(&self) -> Address {
        self.router
    }

    /// Resolves both sides of a pair, naming the side that is unknown.
    pub fn resolve_pair(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<(TokenDescriptor, TokenDescriptor), OrchestrationError> {
        let src = self
            .registry
            .resolve(source)
            .map_err(|e| e.with_role("source"))?;
        let dst = self
            .registry
            .resolve(destination)
            .map_err(|e| e.with_role("destination"))?;
        if src.symbol == dst.symbol {
            return Err(OrchestrationError::UnsupportedPair {
                input: src.symbol,
                output: dst.symbol,
                reason: "source and destination are the same token".to_string(),
            });
        }
        Ok((src, dst))
    }

    /// Quotes `amount_in` (human units) of `source` into `destination`.
    /// Input is validated before any network call.
    pub async fn quote(
        &self,
        source: &str,
        destination: &str,
        amount_in: &str,
    ) -> Result<Quote, OrchestrationError> {
        let (src, dst) = self.resolve_pair(source, destination)?;
        let amount_in_raw = amounts::to_base_units(amount_in, src.decimals)?;
        self.quote_resolved(&src, &dst, amount_in_raw).await
    }

    pub async fn quote_resolved(
        &self,
        src: &TokenDescriptor,
        dst: &TokenDescriptor,
        amount_in_raw: U256,
    ) -> Result<Quote, OrchestrationError> {
        if self.registry.is_wrap_pair(src, dst) {
            return Err(OrchestrationError::UnsupportedPair {
                input: src.symbol.clone(),
                output: dst.symbol.clone(),
                reason: "native and wrapped native convert 1:1 through wrap/unwrap".to_string(),
            });
        }

        let path = self.registry.path_for(src, dst);
        let amount_out_raw = self.amounts_out(amount_in_raw, &path).await?;

        let amount_in = amounts::from_base_units(amount_in_raw, src.decimals);
        let amount_out = amounts::from_base_units(amount_out_raw, dst.decimals);
        let rate = match (amount_in.parse::<f64>(), amount_out.parse::<f64>()) {
            (Ok(i), Ok(o)) if i > 0.0 => o / i,
            _ => 0.0,
        };

        info!(
            "Quote {} {} -> {} {} over {} hop(s)",
            amount_in,
            src.symbol,
            amount_out,
            dst.symbol,
            path.hops.len() - 1
        );

        Ok(Quote {
            source: src.symbol.clone(),
            destination: dst.symbol.clone(),
            amount_in,
            amount_out,
            rate,
            amount_in_raw,
            amount_out_raw,
            path: path.hops,
        })
    }

    async fn amounts_out(&self, amount_in: U256, path: &SwapPath) -> Result<U256, OrchestrationError> {
        debug!("getAmountsOut({}, {:?})", amount_in, path.hops);
        let raw = self
            .chain
            .call(self.router, abi::get_amounts_out(amount_in, &path.hops))
            .await
            .map_err(|e| OrchestrationError::PathQueryFailed(e.to_string()))?;
        let amounts = abi::decode_u256_array(&raw)
            .map_err(|e| OrchestrationError::PathQueryFailed(e.to_string()))?;
        if amounts.len() != path.hops.len() {
            return Err(OrchestrationError::PathQueryFailed(format!(
                "router returned {} amounts for a {}-token path",
                amounts.len(),
                path.hops.len()
            )));
        }
        // The first element echoes the input; the last is what arrives.
        match amounts.last() {
            Some(out) if !out.is_zero() => Ok(*out),
            _ => Err(OrchestrationError::PathQueryFailed(
                "router quoted zero output; the pool has no liquidity".to_string(),
            )),
        }
    }
}
