// src/orchestrator/swap.rs

use ethers::types::U256;
use tracing::info;

use super::{
    pipeline::{ActionPlan, Funding},
    Orchestrator,
};
use crate::blockchain::{
    models::{Execution, Method, Operation, OrchestrationError, OrchestrationResult},
    services::{abi, amounts},
    tokens::TokenDescriptor,
};

impl Orchestrator {
    /// Swaps `amount` of `source` into `destination` through the V2 router.
    /// `slippage` is a percent with one decimal ("0.5", "2%"); the configured
    /// default applies when it is `None`.
    pub async fn swap(
        &self,
        source: &str,
        destination: &str,
        amount: &str,
        slippage: Option<&str>,
    ) -> OrchestrationResult {
        self.try_swap(source, destination, amount, slippage)
            .await
            .into()
    }

    pub(crate) async fn try_swap(
        &self,
        source: &str,
        destination: &str,
        amount: &str,
        slippage: Option<&str>,
    ) -> Result<Execution, OrchestrationError> {
        let (src, dst) = self.quotes.resolve_pair(source, destination)?;
        let raw = amounts::to_base_units(amount, src.decimals)?;
        let tenths = amounts::parse_slippage(slippage.unwrap_or(self.settings.default_slippage.as_str()))?;

        if self.registry.is_wrap_pair(&src, &dst) {
            info!("{} -> {} is a 1:1 conversion; routing to wrap/unwrap", src.symbol, dst.symbol);
            return if src.is_native() {
                self.try_wrap(amount).await
            } else {
                self.try_unwrap(amount).await
            };
        }

        self.swap_resolved(&src, &dst, raw, tenths).await
    }

    /// Quotes and executes an already-validated swap.
    pub(crate) async fn swap_resolved(
        &self,
        src: &TokenDescriptor,
        dst: &TokenDescriptor,
        amount_in: U256,
        slippage_tenths: u32,
    ) -> Result<Execution, OrchestrationError> {
        let sender = self.sender()?;
        let quote = self.quotes.quote_resolved(src, dst, amount_in).await?;
        let minimum = amounts::minimum_output(quote.amount_out_raw, slippage_tenths);
        let deadline = swap_deadline(chrono::Utc::now().timestamp(), self.settings.deadline_secs)?;
        let router = self.quotes.router();

        let (method, funding, spender, value, data) = if src.is_native() {
            (
                Method::SwapExactEthForTokens,
                Funding::Native(amount_in),
                None,
                amount_in,
                abi::swap_exact_eth_for_tokens(minimum, &quote.path, sender, deadline),
            )
        } else {
            let (method, sig) = if dst.is_native() {
                (Method::SwapExactTokensForEth, abi::SWAP_EXACT_TOKENS_FOR_ETH)
            } else {
                (Method::SwapExactTokensForTokens, abi::SWAP_EXACT_TOKENS_FOR_TOKENS)
            };
            (
                method,
                Funding::Token {
                    token: src.clone(),
                    amount: amount_in,
                },
                Some(router),
                U256::zero(),
                abi::swap_exact_tokens(sig, amount_in, minimum, &quote.path, sender, deadline),
            )
        };

        info!(
            "Swapping {} {} for at least {} {} (expected {}) via {}",
            quote.amount_in,
            src.symbol,
            amounts::from_base_units(minimum, dst.decimals),
            dst.symbol,
            quote.amount_out,
            method
        );

        self.execute(ActionPlan {
            operation: Operation::Swap,
            method,
            funding,
            spender,
            to: router,
            value,
            data,
            input_symbol: src.symbol.clone(),
            input_amount: quote.amount_in.clone(),
            output_symbol: Some(dst.symbol.clone()),
            expected_output: Some(quote.amount_out.clone()),
            minimum_output: Some(amounts::from_base_units(minimum, dst.decimals)),
            recipient: Some(sender),
        })
        .await
    }
}

/// Unix time `lifetime_secs` after `now`, as the router's `deadline` argument.
fn swap_deadline(now: i64, lifetime_secs: u64) -> Result<U256, OrchestrationError> {
    (now.max(0) as u64)
        .checked_add(lifetime_secs)
        .map(U256::from)
        .ok_or_else(|| {
            OrchestrationError::InvalidConfiguration(format!(
                "swap deadline of {} seconds overflows the clock",
                lifetime_secs
            ))
        })
}
