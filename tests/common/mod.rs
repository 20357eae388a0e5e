//! Shared test fixtures: a recording in-memory chain and orchestrator builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{
    Address, Block, Bytes, Log, Transaction, TransactionReceipt, TransactionRequest, H160, H256,
    U256, U64,
};

use monad_mcp_server::{
    blockchain::{
        client::{ChainClient, ChainError},
        services::abi,
        tokens::TokenRegistry,
    },
    orchestrator::{Orchestrator, OrchestratorSettings},
};

pub const SENDER: Address = H160([0x11; 20]);
pub const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";

/// One interaction with the chain, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// "balance", "call", "send" or "wait".
    pub kind: &'static str,
    /// Contract function name, or "native_transfer" for an empty-data send.
    pub name: String,
    pub to: Address,
    pub value: U256,
}

impl Event {
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    amounts_out: HashMap<Vec<Address>, U256>,
    failing_calls: HashSet<String>,
    failing_sends: HashSet<String>,
    reverting: HashSet<String>,
    timing_out: HashSet<String>,
    receipt_logs: HashMap<String, Vec<Log>>,
    sent: HashMap<H256, (String, Address)>,
    next_hash: u64,
}

pub struct MockChain {
    sender: Option<Address>,
    state: Mutex<State>,
}

const KNOWN: [&str; 14] = [
    abi::BALANCE_OF,
    abi::ALLOWANCE,
    abi::APPROVE,
    abi::TRANSFER,
    abi::WRAP_DEPOSIT,
    abi::UNWRAP_WITHDRAW,
    abi::GET_AMOUNTS_OUT,
    abi::SWAP_EXACT_ETH_FOR_TOKENS,
    abi::SWAP_EXACT_TOKENS_FOR_ETH,
    abi::SWAP_EXACT_TOKENS_FOR_TOKENS,
    abi::STAKE_DEPOSIT,
    abi::REQUEST_REDEEM,
    abi::CONVERT_TO_SHARES,
    abi::CREATE_COLLECTION,
];

fn function_name(data: &[u8]) -> String {
    if data.len() < 4 {
        return "native_transfer".to_string();
    }
    KNOWN
        .iter()
        .find(|sig| abi::selector(sig) == data[..4])
        .map(|sig| sig.split('(').next().unwrap_or(sig).to_string())
        .unwrap_or_else(|| format!("0x{}", hex::encode(&data[..4])))
}

fn words(types: &[ParamType], data: &[u8]) -> Vec<Token> {
    decode(types, &data[4..]).expect("mock received malformed calldata")
}

fn uint(value: U256) -> Bytes {
    Bytes::from(encode(&[Token::Uint(value)]))
}

impl MockChain {
    pub fn new() -> Self {
        Self::with_sender(Some(SENDER))
    }

    pub fn without_signer() -> Self {
        Self::with_sender(None)
    }

    fn with_sender(sender: Option<Address>) -> Self {
        Self {
            sender,
            state: Mutex::new(State::default()),
        }
    }

    pub fn set_native_balance(&self, owner: Address, amount: U256) -> &Self {
        self.state.lock().unwrap().native.insert(owner, amount);
        self
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) -> &Self {
        self.state.lock().unwrap().tokens.insert((token, owner), amount);
        self
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) -> &Self {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
        self
    }

    /// Router output for `path`; `getAmountsOut` on any other path reverts.
    pub fn set_amount_out(&self, path: Vec<Address>, amount_out: U256) -> &Self {
        self.state.lock().unwrap().amounts_out.insert(path, amount_out);
        self
    }

    pub fn fail_call(&self, name: &str) -> &Self {
        self.state.lock().unwrap().failing_calls.insert(name.to_string());
        self
    }

    pub fn fail_send(&self, name: &str) -> &Self {
        self.state.lock().unwrap().failing_sends.insert(name.to_string());
        self
    }

    pub fn revert(&self, name: &str) -> &Self {
        self.state.lock().unwrap().reverting.insert(name.to_string());
        self
    }

    pub fn time_out(&self, name: &str) -> &Self {
        self.state.lock().unwrap().timing_out.insert(name.to_string());
        self
    }

    pub fn set_receipt_logs(&self, name: &str, logs: Vec<Log>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .receipt_logs
            .insert(name.to_string(), logs);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events().iter().map(Event::label).collect()
    }

    pub fn sends(&self) -> Vec<Event> {
        self.events().into_iter().filter(|e| e.kind == "send").collect()
    }

    fn record(&self, kind: &'static str, name: &str, to: Address, value: U256) {
        self.state.lock().unwrap().events.push(Event {
            kind,
            name: name.to_string(),
            to,
            value,
        });
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn chain_id(&self) -> u64 {
        10143
    }

    fn sender(&self) -> Result<Address, ChainError> {
        self.sender.ok_or(ChainError::MissingCredential)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.record("balance", "native", address, U256::zero());
        Ok(self
            .state
            .lock()
            .unwrap()
            .native
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_block_number(&self) -> Result<u64, ChainError> {
        Ok(100)
    }

    async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ChainError> {
        Ok(Some(Block {
            number: Some(U64::from(number)),
            ..Default::default()
        }))
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        Ok(Some(Transaction {
            hash,
            ..Default::default()
        }))
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(Some(TransactionReceipt {
            transaction_hash: hash,
            status: Some(U64::from(1)),
            ..Default::default()
        }))
    }

    async fn get_gas_price(&self) -> Result<U256, ChainError> {
        Ok(U256::from(52_000_000_000u64))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let name = function_name(&data);
        self.record("call", &name, to, U256::zero());
        let state = self.state.lock().unwrap();
        if state.failing_calls.contains(&name) {
            return Err(ChainError::Rpc("execution reverted".into()));
        }
        match name.as_str() {
            "balanceOf" => {
                let owner = words(&[ParamType::Address], &data)[0].clone().into_address().unwrap();
                Ok(uint(state.tokens.get(&(to, owner)).copied().unwrap_or_default()))
            }
            "allowance" => {
                let args = words(&[ParamType::Address, ParamType::Address], &data);
                let owner = args[0].clone().into_address().unwrap();
                let spender = args[1].clone().into_address().unwrap();
                Ok(uint(
                    state
                        .allowances
                        .get(&(to, owner, spender))
                        .copied()
                        .unwrap_or_default(),
                ))
            }
            "getAmountsOut" => {
                let args = words(
                    &[ParamType::Uint(256), ParamType::Array(Box::new(ParamType::Address))],
                    &data,
                );
                let amount_in = args[0].clone().into_uint().unwrap();
                let path: Vec<Address> = args[1]
                    .clone()
                    .into_array()
                    .unwrap()
                    .into_iter()
                    .map(|t| t.into_address().unwrap())
                    .collect();
                let out = state
                    .amounts_out
                    .get(&path)
                    .copied()
                    .ok_or_else(|| ChainError::Rpc("execution reverted: INSUFFICIENT_LIQUIDITY".into()))?;
                // The router echoes the input first; intermediate hops are filler.
                let mut amounts = vec![Token::Uint(amount_in)];
                amounts.extend((2..path.len()).map(|_| Token::Uint(U256::from(7u64))));
                amounts.push(Token::Uint(out));
                Ok(Bytes::from(encode(&[Token::Array(amounts)])))
            }
            "convertToShares" => {
                let assets = words(&[ParamType::Uint(256)], &data)[0].clone().into_uint().unwrap();
                Ok(uint(assets * U256::from(95u64) / U256::from(100u64)))
            }
            other => Err(ChainError::Rpc(format!("mock has no view {}", other))),
        }
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError> {
        let from = self.sender()?;
        let data = tx.data.clone().unwrap_or_default();
        let name = function_name(&data);
        let to = tx.to.as_ref().and_then(|t| t.as_address().copied()).unwrap_or_default();
        let value = tx.value.unwrap_or_default();
        self.record("send", &name, to, value);

        let mut state = self.state.lock().unwrap();
        if state.failing_sends.contains(&name) {
            return Err(ChainError::Rpc(format!("{} would revert", name)));
        }
        if name == "approve" {
            let args = words(&[ParamType::Address, ParamType::Uint(256)], &data);
            let spender = args[0].clone().into_address().unwrap();
            let amount = args[1].clone().into_uint().unwrap();
            state.allowances.insert((to, from, spender), amount);
        }
        state.next_hash += 1;
        let hash = H256::from_low_u64_be(state.next_hash);
        state.sent.insert(hash, (name, to));
        Ok(hash)
    }

    async fn wait_for_receipt(
        &self,
        hash: H256,
        timeout: Duration,
        _confirmations: u64,
    ) -> Result<TransactionReceipt, ChainError> {
        let (name, to) = self
            .state
            .lock()
            .unwrap()
            .sent
            .get(&hash)
            .cloned()
            .expect("waited on a transaction the mock never sent");
        self.record("wait", &name, to, U256::zero());

        let state = self.state.lock().unwrap();
        if state.timing_out.contains(&name) {
            return Err(ChainError::Timeout {
                tx_hash: hash,
                waited_secs: timeout.as_secs(),
            });
        }
        let status = if state.reverting.contains(&name) { 0u64 } else { 1u64 };
        Ok(TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(U64::from(1_000 + hash.to_low_u64_be())),
            status: Some(U64::from(status)),
            logs: state.receipt_logs.get(&name).cloned().unwrap_or_default(),
            ..Default::default()
        })
    }
}

pub fn registry() -> Arc<TokenRegistry> {
    Arc::new(TokenRegistry::monad_testnet().expect("built-in registry"))
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        confirmation_timeout: Duration::from_secs(5),
        ..OrchestratorSettings::default()
    }
}

pub fn orchestrator(chain: Arc<MockChain>) -> Orchestrator {
    orchestrator_with(chain, settings())
}

pub fn orchestrator_with(chain: Arc<MockChain>, settings: OrchestratorSettings) -> Orchestrator {
    Orchestrator::new(chain, registry(), settings)
}

/// `amount` whole units at `decimals`.
pub fn units(amount: u64, decimals: u8) -> U256 {
    U256::from(amount) * U256::exp10(decimals as usize)
}

pub fn token(symbol: &str) -> Address {
    registry().resolve(symbol).expect("registered token").address
}
