//! Stage ordering, approvals and failure classification for write operations

mod common;

use std::sync::Arc;

use common::{orchestrator, orchestrator_with, settings, token, units, MockChain, RECIPIENT, SENDER};
use ethers::types::{Address, U256};
use monad_mcp_server::{
    blockchain::models::{ErrorKind, Execution, Method, Operation, OrchestrationResult},
    config::ApprovalPolicy,
    orchestrator::OrchestratorSettings,
};

fn success(result: OrchestrationResult) -> Execution {
    match result {
        OrchestrationResult::Success(execution) => execution,
        other => panic!("expected success, got {:?}", other),
    }
}

fn failure_kind(result: &OrchestrationResult) -> ErrorKind {
    match result {
        OrchestrationResult::Failure(report) => report.kind,
        other => panic!("expected failure, got {:?}", other),
    }
}

fn router() -> Address {
    OrchestratorSettings::default().router
}

/// WETH holder with a 1 WETH -> 3000 USDC pool.
fn weth_usdc_chain() -> Arc<MockChain> {
    let chain = Arc::new(MockChain::new());
    chain
        .set_token_balance(token("WETH"), SENDER, units(5, 18))
        .set_amount_out(vec![token("WETH"), token("USDC")], units(3000, 6));
    chain
}

#[tokio::test]
async fn token_swap_approves_and_confirms_before_acting() {
    let chain = weth_usdc_chain();
    let orch = orchestrator(chain.clone());

    let execution = success(orch.swap("WETH", "USDC", "1", None).await);

    assert_eq!(
        chain.labels(),
        vec![
            "call:getAmountsOut",
            "call:balanceOf",
            "call:allowance",
            "send:approve",
            "wait:approve",
            "send:swapExactTokensForTokens",
            "wait:swapExactTokensForTokens",
        ]
    );
    let approval = execution.approval.expect("approval recorded");
    assert_eq!(approval.token, "WETH");
    assert_eq!(approval.spender, router());
    assert_eq!(approval.amount, units(1, 18));
    assert_eq!(approval.policy, ApprovalPolicy::Exact);
    assert_eq!(execution.method, Method::SwapExactTokensForTokens);
    assert_eq!(execution.expected_output.as_deref(), Some("3000"));
    // Default slippage 0.5% -> floor of 99.5%.
    assert_eq!(execution.minimum_output.as_deref(), Some("2985"));
    assert!(chain.sends().iter().all(|send| send.value.is_zero()));
}

#[tokio::test]
async fn sufficient_allowance_skips_approval() {
    let chain = weth_usdc_chain();
    chain.set_allowance(token("WETH"), SENDER, router(), units(10, 18));
    let orch = orchestrator(chain.clone());

    let execution = success(orch.swap("WETH", "USDC", "1", None).await);

    assert!(execution.approval.is_none());
    assert!(chain.labels().contains(&"call:allowance".to_string()));
    assert!(!chain.labels().contains(&"send:approve".to_string()));
}

#[tokio::test]
async fn native_leg_never_checks_allowance() {
    let chain = Arc::new(MockChain::new());
    chain
        .set_native_balance(SENDER, units(10, 18))
        .set_amount_out(vec![token("WMON"), token("USDC")], units(2, 6));
    let orch = orchestrator(chain.clone());

    let execution = success(orch.swap("MON", "USDC", "1.5", Some("1")).await);

    assert_eq!(
        chain.labels(),
        vec![
            "call:getAmountsOut",
            "balance:native",
            "send:swapExactETHForTokens",
            "wait:swapExactETHForTokens",
        ]
    );
    assert_eq!(execution.method, Method::SwapExactEthForTokens);
    assert_eq!(chain.sends()[0].value, U256::from(1_500_000_000_000_000_000u64));
    assert_eq!(chain.sends()[0].to, router());
    assert_eq!(execution.minimum_output.as_deref(), Some("1.98"));
}

#[tokio::test]
async fn token_to_native_uses_the_plain_entry_point() {
    let chain = Arc::new(MockChain::new());
    chain
        .set_token_balance(token("USDC"), SENDER, units(100, 6))
        .set_amount_out(vec![token("USDC"), token("WMON")], units(3, 18));
    let orch = orchestrator(chain.clone());

    let execution = success(orch.swap("USDC", "MON", "10", None).await);

    assert_eq!(execution.method, Method::SwapExactTokensForEth);
    assert!(execution.approval.is_some());
    assert!(chain.sends().iter().all(|send| send.value.is_zero()));
}

#[tokio::test]
async fn slippage_floor_is_integer_math() {
    let chain = weth_usdc_chain();
    chain.set_amount_out(vec![token("WETH"), token("USDC")], U256::from(1_000_000u64));
    let orch = orchestrator(chain);

    let execution = success(orch.swap("WETH", "USDC", "1", Some("2.0")).await);
    assert_eq!(execution.expected_output.as_deref(), Some("1"));
    assert_eq!(execution.minimum_output.as_deref(), Some("0.98"));
}

#[tokio::test]
async fn unlimited_policy_approves_the_ceiling() {
    let chain = weth_usdc_chain();
    let orch = orchestrator_with(
        chain,
        OrchestratorSettings {
            approval_policy: ApprovalPolicy::Unlimited,
            ..settings()
        },
    );

    let execution = success(orch.swap("WETH", "USDC", "1", None).await);
    let approval = execution.approval.expect("approval recorded");
    assert_eq!(approval.amount, U256::MAX);
    assert_eq!(approval.policy, ApprovalPolicy::Unlimited);
}

#[tokio::test]
async fn overflowing_deadline_fails_before_any_transaction() {
    let chain = weth_usdc_chain();
    let orch = orchestrator_with(
        chain.clone(),
        OrchestratorSettings {
            deadline_secs: u64::MAX,
            ..settings()
        },
    );

    let result = orch.swap("WETH", "USDC", "1", None).await;
    assert_eq!(failure_kind(&result), ErrorKind::InvalidConfiguration);
    assert!(chain.sends().is_empty());
}

#[tokio::test]
async fn reverted_action_is_never_a_success() {
    let chain = weth_usdc_chain();
    chain.revert("swapExactTokensForTokens");
    let orch = orchestrator(chain);

    let result = orch.swap("WETH", "USDC", "1", None).await;
    assert!(!result.is_success());
    assert_eq!(failure_kind(&result), ErrorKind::TransactionReverted);
    match result {
        OrchestrationResult::Failure(report) => assert!(report.tx_hash.is_some()),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn reverted_approval_stops_before_the_action() {
    let chain = weth_usdc_chain();
    chain.revert("approve");
    let orch = orchestrator(chain.clone());

    let result = orch.swap("WETH", "USDC", "1", None).await;
    assert_eq!(failure_kind(&result), ErrorKind::ApprovalFailed);
    assert_eq!(chain.sends().len(), 1);
}

#[tokio::test]
async fn failed_approval_submission_is_classified() {
    let chain = weth_usdc_chain();
    chain.fail_send("approve");
    let orch = orchestrator(chain.clone());

    let result = orch.swap("WETH", "USDC", "1", None).await;
    assert_eq!(failure_kind(&result), ErrorKind::ApprovalFailed);
    assert!(!chain.labels().contains(&"send:swapExactTokensForTokens".to_string()));
}

#[tokio::test]
async fn allowance_read_failure_is_classified() {
    let chain = weth_usdc_chain();
    chain.fail_call("allowance");
    let orch = orchestrator(chain.clone());

    let result = orch.swap("WETH", "USDC", "1", None).await;
    assert_eq!(failure_kind(&result), ErrorKind::AllowanceQueryFailed);
    assert!(chain.sends().is_empty());
}

#[tokio::test]
async fn confirmation_timeout_keeps_the_hash() {
    let chain = Arc::new(MockChain::new());
    chain
        .set_native_balance(SENDER, units(10, 18))
        .time_out("native_transfer");
    let orch = orchestrator(chain);

    let result = orch.transfer("MON", "1", RECIPIENT).await;
    match result {
        OrchestrationResult::Failure(report) => {
            assert_eq!(report.kind, ErrorKind::ConfirmationTimeout);
            assert!(report.tx_hash.is_some());
            assert!(report.message.contains("may still be mined"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn insufficient_balance_is_terminal() {
    let chain = Arc::new(MockChain::new());
    chain.set_token_balance(token("USDC"), SENDER, units(1, 6));
    let orch = orchestrator(chain.clone());

    let result = orch.transfer("USDC", "2", RECIPIENT).await;
    match &result {
        OrchestrationResult::Failure(report) => {
            assert_eq!(report.kind, ErrorKind::InsufficientFunds);
            assert!(report.message.contains("need 2, have 1"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(chain.sends().is_empty());
}

#[tokio::test]
async fn missing_signer_is_a_credential_error() {
    let chain = Arc::new(MockChain::without_signer());
    let orch = orchestrator(chain.clone());

    let result = orch.transfer("MON", "1", RECIPIENT).await;
    assert_eq!(failure_kind(&result), ErrorKind::MissingCredential);
    let result = orch.swap("MON", "USDC", "1", None).await;
    assert_eq!(failure_kind(&result), ErrorKind::MissingCredential);
    assert!(chain.events().is_empty());
}

#[tokio::test]
async fn invalid_input_makes_no_calls() {
    let chain = Arc::new(MockChain::new());
    let orch = orchestrator(chain.clone());

    assert_eq!(failure_kind(&orch.transfer("USDC", "0", RECIPIENT).await), ErrorKind::InvalidAmount);
    assert_eq!(failure_kind(&orch.transfer("USDC", "-3", RECIPIENT).await), ErrorKind::InvalidAmount);
    assert_eq!(failure_kind(&orch.swap("MON", "USDC", "abc", None).await), ErrorKind::InvalidAmount);
    assert_eq!(failure_kind(&orch.swap("MON", "USDC", "1", Some("150")).await), ErrorKind::InvalidAmount);
    assert_eq!(failure_kind(&orch.wrap("0").await), ErrorKind::InvalidAmount);
    assert_eq!(failure_kind(&orch.transfer("USDC", "1", "0x1234").await), ErrorKind::InvalidAddress);
    assert_eq!(failure_kind(&orch.transfer("DOGE", "1", RECIPIENT).await), ErrorKind::UnsupportedToken);
    assert!(chain.events().is_empty());
}

#[tokio::test]
async fn token_transfer_calls_the_token_contract() {
    let chain = Arc::new(MockChain::new());
    chain.set_token_balance(token("USDC"), SENDER, units(50, 6));
    let orch = orchestrator(chain.clone());

    let execution = success(orch.transfer("usdc", "12.5", RECIPIENT).await);

    assert_eq!(execution.operation, Operation::Transfer);
    assert_eq!(execution.method, Method::Transfer);
    assert_eq!(execution.input_amount, "12.5");
    assert_eq!(
        chain.labels(),
        vec!["call:balanceOf", "send:transfer", "wait:transfer"]
    );
    assert_eq!(chain.sends()[0].to, token("USDC"));
    assert!(chain.sends()[0].value.is_zero());
}

#[tokio::test]
async fn native_transfer_carries_value() {
    let chain = Arc::new(MockChain::new());
    chain.set_native_balance(SENDER, units(10, 18));
    let orch = orchestrator(chain.clone());

    let execution = success(orch.transfer("MON", "2", RECIPIENT).await);

    assert_eq!(execution.method, Method::NativeTransfer);
    let send = &chain.sends()[0];
    assert_eq!(send.name, "native_transfer");
    assert_eq!(send.value, units(2, 18));
    assert_eq!(format!("{:?}", send.to), RECIPIENT);
    assert!(execution.block_number > 0);
}

#[tokio::test]
async fn wrap_and_unwrap_hit_the_wrapper() {
    let chain = Arc::new(MockChain::new());
    chain
        .set_native_balance(SENDER, units(10, 18))
        .set_token_balance(token("WMON"), SENDER, units(10, 18));
    let orch = orchestrator(chain.clone());

    let wrapped = success(orch.wrap("1").await);
    assert_eq!(wrapped.operation, Operation::Wrap);
    assert_eq!(wrapped.method, Method::Deposit);
    assert_eq!(wrapped.output_symbol.as_deref(), Some("WMON"));

    let unwrapped = success(orch.unwrap("1").await);
    assert_eq!(unwrapped.operation, Operation::Unwrap);
    assert_eq!(unwrapped.method, Method::Withdraw);

    let sends = chain.sends();
    assert_eq!(sends[0].name, "deposit");
    assert_eq!(sends[0].value, units(1, 18));
    assert_eq!(sends[1].name, "withdraw");
    assert!(sends[1].value.is_zero());
    assert!(sends.iter().all(|s| s.to == token("WMON")));
    assert!(!chain.labels().contains(&"call:allowance".to_string()));
}

#[tokio::test]
async fn swapping_mon_for_wmon_wraps() {
    let chain = Arc::new(MockChain::new());
    chain.set_native_balance(SENDER, units(10, 18));
    let orch = orchestrator(chain.clone());

    let execution = success(orch.swap("MON", "WMON", "3", None).await);
    assert_eq!(execution.operation, Operation::Wrap);
    assert!(!chain.labels().contains(&"call:getAmountsOut".to_string()));
}

#[tokio::test]
async fn concurrent_operations_do_not_interleave_their_steps() {
    let chain = Arc::new(MockChain::new());
    chain
        .set_token_balance(token("USDC"), SENDER, units(100, 6))
        .set_token_balance(token("WETH"), SENDER, units(5, 18));
    let orch = orchestrator(chain.clone());

    let (usdc, weth) = tokio::join!(
        orch.transfer("USDC", "10", RECIPIENT),
        orch.transfer("WETH", "1", RECIPIENT)
    );
    let usdc = success(usdc);
    let weth = success(weth);
    assert_ne!(usdc.tx_hash, weth.tx_hash);

    for contract in [token("USDC"), token("WETH")] {
        let steps: Vec<String> = chain
            .events()
            .iter()
            .filter(|e| e.to == contract)
            .map(|e| e.label())
            .collect();
        assert_eq!(steps, vec!["call:balanceOf", "send:transfer", "wait:transfer"]);
    }
}

#[tokio::test]
async fn balances_report_per_token_failures() {
    let chain = Arc::new(MockChain::new());
    chain
        .set_native_balance(SENDER, units(3, 18))
        .fail_call("balanceOf");
    let orch = orchestrator(chain);

    let report = orch.balances(None, &[]).await.unwrap();
    assert_eq!(report.owner, SENDER);
    assert_eq!(report.balances[0].symbol, "MON");
    assert_eq!(report.balances[0].formatted.as_deref(), Some("3"));
    assert!(report.balances[1..].iter().all(|b| b.error.is_some()));

    let filtered = orch
        .balances(Some(RECIPIENT), &["wmon".to_string()])
        .await
        .unwrap();
    assert_eq!(filtered.balances.len(), 1);
    assert_eq!(filtered.balances[0].symbol, "WMON");
}
