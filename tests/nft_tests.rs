//! Collection deploys through the factory

mod common;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{orchestrator, orchestrator_with, settings, MockChain};
use ethers::types::{Address, Log, H256};
use monad_mcp_server::{
    blockchain::{
        models::{CollectionRequest, ErrorKind, Method, Operation, OrchestrationResult},
        services::metadata::MetadataHost,
    },
    orchestrator::OrchestratorSettings,
};
use serde_json::Value;

const FACTORY: Address = ethers::types::H160([0xfa; 20]);
const COLLECTION: Address = ethers::types::H160([0xc0; 20]);

struct BrokenHost;

#[async_trait]
impl MetadataHost for BrokenHost {
    async fn upload_image(&self, _file_name: &str, _bytes: &[u8]) -> Result<String> {
        Err(anyhow!("pinning service unavailable"))
    }

    async fn upload_metadata(&self, _metadata: &Value) -> Result<String> {
        Err(anyhow!("pinning service unavailable"))
    }
}

fn request() -> CollectionRequest {
    CollectionRequest {
        name: "Monad Cats".to_string(),
        symbol: "mcat".to_string(),
        description: None,
        max_supply: 50,
    }
}

fn with_factory() -> OrchestratorSettings {
    OrchestratorSettings {
        nft_factory: Some(FACTORY),
        ..settings()
    }
}

#[tokio::test]
async fn deploy_without_factory_is_disabled() {
    let chain = Arc::new(MockChain::new());
    let orch = orchestrator(chain.clone());

    match orch.deploy_collection(request()).await {
        OrchestrationResult::FeatureDisabled { feature, .. } => {
            assert_eq!(feature, "deploy_collection")
        }
        other => panic!("expected disabled feature, got {:?}", other),
    }
    assert!(chain.events().is_empty());
}

#[tokio::test]
async fn deploy_reads_the_collection_from_the_factory_log() {
    let chain = Arc::new(MockChain::new());
    chain.set_receipt_logs(
        "createCollection",
        vec![Log {
            address: FACTORY,
            topics: vec![H256::repeat_byte(0x01), H256::from(COLLECTION)],
            ..Default::default()
        }],
    );
    let orch = orchestrator_with(chain.clone(), with_factory());

    let execution = match orch.deploy_collection(request()).await {
        OrchestrationResult::Success(execution) => execution,
        other => panic!("deploy failed: {:?}", other),
    };

    assert_eq!(execution.operation, Operation::DeployCollection);
    assert_eq!(execution.method, Method::CreateCollection);
    assert_eq!(execution.input_symbol, "MCAT");
    assert_eq!(execution.input_amount, "50");
    assert_eq!(execution.contract_address, Some(COLLECTION));
    let sends = chain.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].to, FACTORY);
    assert!(sends[0].value.is_zero());
}

#[tokio::test]
async fn unfunded_signer_still_submits_the_deploy() {
    let chain = Arc::new(MockChain::new());
    let orch = orchestrator_with(chain.clone(), with_factory());

    let result = orch.deploy_collection(request()).await;

    assert!(result.is_success(), "deploy failed: {:?}", result);
    assert_eq!(
        chain.labels(),
        vec!["balance:native", "send:createCollection", "wait:createCollection"]
    );
}

#[tokio::test]
async fn metadata_failure_stops_before_any_transaction() {
    let chain = Arc::new(MockChain::new());
    let orch = orchestrator_with(chain.clone(), with_factory()).with_metadata_host(Arc::new(BrokenHost));

    match orch.deploy_collection(request()).await {
        OrchestrationResult::Failure(report) => {
            assert_eq!(report.kind, ErrorKind::MetadataUploadFailed);
            assert!(report.message.contains("pinning service unavailable"));
        }
        other => panic!("expected upload failure, got {:?}", other),
    }
    assert!(chain.sends().is_empty());
}

#[tokio::test]
async fn zero_supply_is_rejected() {
    let chain = Arc::new(MockChain::new());
    let orch = orchestrator_with(chain.clone(), with_factory());

    let mut req = request();
    req.max_supply = 0;
    match orch.deploy_collection(req).await {
        OrchestrationResult::Failure(report) => assert_eq!(report.kind, ErrorKind::InvalidAmount),
        other => panic!("expected invalid amount, got {:?}", other),
    }
    assert!(chain.events().is_empty());
}
