// src/orchestrator/transfer.rs

//! Plain transfers and the 1:1 native <-> wrapped conversions.

use ethers::types::{Bytes, U256};

use super::{
    parse_address,
    pipeline::{ActionPlan, Funding},
    Orchestrator,
};
use crate::blockchain::{
    models::{Execution, Method, Operation, OrchestrationError, OrchestrationResult},
    services::{abi, amounts},
};

impl Orchestrator {
    /// Sends `amount` of `symbol` to `to`. Native sends carry value, tokens
    /// go through `transfer(address,uint256)`.
    pub async fn transfer(&self, symbol: &str, amount: &str, to: &str) -> OrchestrationResult {
        self.try_transfer(symbol, amount, to).await.into()
    }

    pub(crate) async fn try_transfer(
        &self,
        symbol: &str,
        amount: &str,
        to: &str,
    ) -> Result<Execution, OrchestrationError> {
        let token = self.registry.resolve(symbol)?;
        let raw = amounts::to_base_units(amount, token.decimals)?;
        let recipient = parse_address(to)?;

        let plan = if token.is_native() {
            ActionPlan {
                operation: Operation::Transfer,
                method: Method::NativeTransfer,
                funding: Funding::Native(raw),
                spender: None,
                to: recipient,
                value: raw,
                data: Bytes::default(),
                input_symbol: token.symbol.clone(),
                input_amount: amounts::from_base_units(raw, token.decimals),
                output_symbol: None,
                expected_output: None,
                minimum_output: None,
                recipient: Some(recipient),
            }
        } else {
            ActionPlan {
                operation: Operation::Transfer,
                method: Method::Transfer,
                funding: Funding::Token {
                    token: token.clone(),
                    amount: raw,
                },
                spender: None,
                to: token.address,
                value: U256::zero(),
                data: abi::transfer(recipient, raw),
                input_symbol: token.symbol.clone(),
                input_amount: amounts::from_base_units(raw, token.decimals),
                output_symbol: None,
                expected_output: None,
                minimum_output: None,
                recipient: Some(recipient),
            }
        };
        self.execute(plan).await
    }

    /// Wraps native MON into WMON through `deposit()`.
    pub async fn wrap(&self, amount: &str) -> OrchestrationResult {
        self.try_wrap(amount).await.into()
    }

    pub(crate) async fn try_wrap(&self, amount: &str) -> Result<Execution, OrchestrationError> {
        let native = self.registry.native().clone();
        let wrapped = self.registry.wrapped_native().clone();
        let raw = amounts::to_base_units(amount, native.decimals)?;
        let human = amounts::from_base_units(raw, native.decimals);

        self.execute(ActionPlan {
            operation: Operation::Wrap,
            method: Method::Deposit,
            funding: Funding::Native(raw),
            spender: None,
            to: wrapped.address,
            value: raw,
            data: abi::wrap(),
            input_symbol: native.symbol,
            input_amount: human.clone(),
            output_symbol: Some(wrapped.symbol),
            expected_output: Some(human.clone()),
            minimum_output: Some(human),
            recipient: None,
        })
        .await
    }

    /// Unwraps WMON back into native MON through `withdraw(uint256)`.
    pub async fn unwrap(&self, amount: &str) -> OrchestrationResult {
        self.try_unwrap(amount).await.into()
    }

    pub(crate) async fn try_unwrap(&self, amount: &str) -> Result<Execution, OrchestrationError> {
        let native = self.registry.native().clone();
        let wrapped = self.registry.wrapped_native().clone();
        let raw = amounts::to_base_units(amount, wrapped.decimals)?;
        let human = amounts::from_base_units(raw, wrapped.decimals);

        self.execute(ActionPlan {
            operation: Operation::Unwrap,
            method: Method::Withdraw,
            funding: Funding::Token {
                token: wrapped.clone(),
                amount: raw,
            },
            // The wrapper burns the caller's own balance; nothing to approve.
            spender: None,
            to: wrapped.address,
            value: U256::zero(),
            data: abi::unwrap(raw),
            input_symbol: wrapped.symbol,
            input_amount: human.clone(),
            output_symbol: Some(native.symbol),
            expected_output: Some(human.clone()),
            minimum_output: Some(human),
            recipient: None,
        })
        .await
    }
}
