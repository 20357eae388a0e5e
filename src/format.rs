// src/format.rs

//! User-facing text for orchestration results, quotes and balances.
//! The structured values stay the source of truth; this only renders them.

use crate::blockchain::models::{
    BalanceReport, ErrorKind, Execution, Method, Operation, OrchestrationResult, Quote,
};

fn describe(execution: &Execution) -> String {
    let amount = format!("{} {}", execution.input_amount, execution.input_symbol);
    match execution.operation {
        Operation::Transfer => match execution.recipient {
            Some(to) => format!("Sent {} to {:?}", amount, to),
            None => format!("Sent {}", amount),
        },
        Operation::Wrap => format!("Wrapped {}", amount),
        Operation::Unwrap => format!("Unwrapped {}", amount),
        Operation::Swap => format!(
            "Swapped {} for {}",
            amount,
            execution.output_symbol.as_deref().unwrap_or("?")
        ),
        Operation::Stake => format!("Staked {}", amount),
        Operation::Unstake => match execution.method {
            Method::Withdraw => format!("Requested redemption of {}", amount),
            Method::Transfer => format!("Returned {} to the staking vault", amount),
            _ => format!("Sold {} on the router", amount),
        },
        Operation::DeployCollection => format!(
            "Deployed collection {} (max supply {})",
            execution.input_symbol, execution.input_amount
        ),
    }
}

pub fn format_result(result: &OrchestrationResult) -> String {
    match result {
        OrchestrationResult::Success(execution) => {
            let mut lines = vec![format!("✅ {}", describe(execution))];
            if let Some(approval) = &execution.approval {
                lines.push(format!(
                    "Approval: {} for {:?} ({} policy), tx {:?}",
                    approval.token, approval.spender, approval.policy, approval.tx_hash
                ));
            }
            if let (Some(symbol), Some(expected)) =
                (&execution.output_symbol, &execution.expected_output)
            {
                lines.push(format!("Expected output: {} {}", expected, symbol));
                if let Some(minimum) = &execution.minimum_output {
                    if execution.method.is_swap() {
                        lines.push(format!("Minimum output: {} {}", minimum, symbol));
                    }
                }
            }
            if let Some(address) = execution.contract_address {
                lines.push(format!("Contract: {:?}", address));
            }
            lines.push(format!("Method: {}", execution.method));
            if !execution.fallback_attempts.is_empty() {
                lines.push(format!(
                    "Earlier attempts: {}",
                    execution.fallback_attempts.join("; ")
                ));
            }
            lines.push(format!(
                "Transaction: {:?} (block {})",
                execution.tx_hash, execution.block_number
            ));
            lines.join("\n")
        }
        OrchestrationResult::Failure(report) => {
            let mut text = format!("❌ {}", report.message);
            match report.kind {
                ErrorKind::ConfirmationTimeout => text.push_str(
                    "\n⚠️ The transaction was submitted and may still be mined. Check its hash before retrying.",
                ),
                ErrorKind::TransactionReverted => {
                    text.push_str("\nNothing was changed on chain except the gas spent.")
                }
                _ => {}
            }
            text
        }
        OrchestrationResult::FeatureDisabled { feature, reason } => {
            format!("ℹ️ {} is not available: {}", feature, reason)
        }
    }
}

pub fn format_quote(quote: &Quote) -> String {
    format!(
        "{} {} ≈ {} {} (1 {} ≈ {:.6} {}) via {} hop(s)",
        quote.amount_in,
        quote.source,
        quote.amount_out,
        quote.destination,
        quote.source,
        quote.rate,
        quote.destination,
        quote.path.len().saturating_sub(1)
    )
}

pub fn format_balances(report: &BalanceReport) -> String {
    let mut lines = vec![format!("Balances for {:?}:", report.owner)];
    for entry in &report.balances {
        match (&entry.formatted, &entry.error) {
            (Some(amount), _) => lines.push(format!("- {}: {}", entry.symbol, amount)),
            (None, Some(err)) => lines.push(format!("- {}: unavailable ({})", entry.symbol, err)),
            (None, None) => lines.push(format!("- {}: unavailable", entry.symbol)),
        }
    }
    lines.join("\n")
}
