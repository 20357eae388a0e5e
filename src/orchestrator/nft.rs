// src/orchestrator/nft.rs

use ethers::types::{Address, TransactionReceipt, U256};
use tracing::{info, warn};

use super::{
    pipeline::{ActionPlan, Funding},
    Orchestrator,
};
use crate::blockchain::{
    models::{
        CollectionRequest, Execution, Method, Operation, OrchestrationError, OrchestrationResult,
    },
    services::{abi, metadata},
};

/// The factory emits `CollectionCreated(address indexed collection, ...)`;
/// the new address is the first indexed topic.
fn collection_address(receipt: &TransactionReceipt, factory: Address) -> Option<Address> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == factory)
        .find_map(|log| log.topics.get(1).map(|topic| Address::from(*topic)))
        .or(receipt.contract_address)
}

impl Orchestrator {
    /// Uploads placeholder artwork and collection metadata, then deploys the
    /// collection through the configured factory.
    pub async fn deploy_collection(&self, request: CollectionRequest) -> OrchestrationResult {
        self.try_deploy_collection(request).await.into()
    }

    pub(crate) async fn try_deploy_collection(
        &self,
        request: CollectionRequest,
    ) -> Result<Execution, OrchestrationError> {
        let factory = self
            .settings
            .nft_factory
            .ok_or_else(|| OrchestrationError::FeatureDisabled {
                feature: "deploy_collection".to_string(),
                reason: "no collection factory configured (set NFT_FACTORY_ADDRESS)".to_string(),
            })?;
        if request.max_supply == 0 {
            return Err(OrchestrationError::InvalidAmount(
                "max supply must be greater than zero".to_string(),
            ));
        }
        let sender = self.sender()?;

        let name = request.name.trim();
        let symbol = request.symbol.trim().to_uppercase();
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| format!("{} collection on Monad testnet", name));

        let image = metadata::render_placeholder_image(name, &symbol);
        let image_uri = self
            .metadata
            .upload_image(&format!("{}.svg", symbol.to_lowercase()), &image)
            .await
            .map_err(|e| OrchestrationError::MetadataUploadFailed(e.to_string()))?;
        let document = metadata::collection_metadata(name, &symbol, &description, &image_uri);
        let base_uri = self
            .metadata
            .upload_metadata(&document)
            .await
            .map_err(|e| OrchestrationError::MetadataUploadFailed(e.to_string()))?;
        info!("Collection {} metadata at {}", symbol, base_uri);

        let (mut execution, receipt) = self
            .execute_with_receipt(ActionPlan {
                operation: Operation::DeployCollection,
                method: Method::CreateCollection,
                // Gas only. An unfunded signer fails at submission, not here.
                funding: Funding::Native(U256::zero()),
                spender: None,
                to: factory,
                value: U256::zero(),
                data: abi::create_collection(name, &symbol, &base_uri, request.max_supply),
                input_symbol: symbol.clone(),
                input_amount: request.max_supply.to_string(),
                output_symbol: None,
                expected_output: None,
                minimum_output: None,
                recipient: Some(sender),
            })
            .await?;

        execution.contract_address = collection_address(&receipt, factory);
        if execution.contract_address.is_none() {
            warn!("Factory receipt {:?} carried no collection address", execution.tx_hash);
        }
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Log, H256};

    #[test]
    fn reads_collection_from_factory_log_topic() {
        let factory = Address::repeat_byte(0xfa);
        let collection = Address::repeat_byte(0xc0);
        let receipt = TransactionReceipt {
            logs: vec![
                Log {
                    address: Address::repeat_byte(0x01),
                    topics: vec![H256::zero(), H256::repeat_byte(0x99)],
                    ..Default::default()
                },
                Log {
                    address: factory,
                    topics: vec![H256::zero(), H256::from(collection)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(collection_address(&receipt, factory), Some(collection));
    }

    #[test]
    fn no_factory_log_means_no_address() {
        let receipt = TransactionReceipt::default();
        assert_eq!(collection_address(&receipt, Address::repeat_byte(0xfa)), None);
    }
}
