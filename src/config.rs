// src/config.rs

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use secrecy::SecretString;

use crate::blockchain::tokens::TokenDescriptor;

pub const MONAD_TESTNET_RPC: &str = "https://testnet-rpc.monad.xyz";
pub const MONAD_TESTNET_CHAIN_ID: u64 = 10143;
/// Uniswap V2 router deployment on Monad testnet.
pub const DEFAULT_ROUTER_ADDRESS: &str = "0xfB8e1C3b833f9E67a71C859a132cf783b645e436";

/// How much allowance to grant when an approval is required.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Approve exactly the amount about to be moved.
    Exact,
    /// Approve `U256::MAX`. The spender is trusted with any future spend
    /// of the token up to that ceiling.
    Unlimited,
}

impl FromStr for ApprovalPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(ApprovalPolicy::Exact),
            "unlimited" | "max" => Ok(ApprovalPolicy::Unlimited),
            other => Err(anyhow!("unknown approval policy '{}'", other)),
        }
    }
}

impl std::fmt::Display for ApprovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalPolicy::Exact => write!(f, "exact"),
            ApprovalPolicy::Unlimited => write!(f, "unlimited"),
        }
    }
}

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // Chain settings
    pub rpc_url: String,
    pub chain_id: u64,

    /// Signing key for write operations. Never logged.
    pub private_key: Option<SecretString>,

    // Contracts
    pub router_address: Address,
    pub nft_factory_address: Option<Address>,

    // Orchestration settings
    pub confirmation_timeout_secs: u64,
    pub confirmations: u64,
    pub default_slippage: String,
    pub approval_policy: ApprovalPolicy,
    pub unstake_prefer_swap: bool,
    pub swap_deadline_secs: u64,

    // Registry extensions
    pub extra_tokens: Vec<TokenDescriptor>,
    pub swap_path_overrides: HashMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rpc_url: MONAD_TESTNET_RPC.to_string(),
            chain_id: MONAD_TESTNET_CHAIN_ID,
            private_key: None,
            router_address: Address::from_str(DEFAULT_ROUTER_ADDRESS)
                .unwrap_or_else(|_| Address::zero()),
            nft_factory_address: None,
            confirmation_timeout_secs: 60,
            confirmations: 1,
            default_slippage: "0.5".to_string(),
            approval_policy: ApprovalPolicy::Exact,
            unstake_prefer_swap: false,
            swap_deadline_secs: 1200,
            extra_tokens: Vec::new(),
            swap_path_overrides: HashMap::new(),
        }
    }
}

fn parse_address(var: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("{} must be a 0x-prefixed address", var))
}

/// Longest swap deadline accepted from `SWAP_DEADLINE_SECS` (one week).
pub const MAX_SWAP_DEADLINE_SECS: u64 = 7 * 24 * 60 * 60;

fn parse_deadline(value: &str) -> Result<u64> {
    let secs: u64 = value
        .trim()
        .parse()
        .context("SWAP_DEADLINE_SECS must be a valid number")?;
    if secs == 0 || secs > MAX_SWAP_DEADLINE_SECS {
        return Err(anyhow!(
            "SWAP_DEADLINE_SECS must be between 1 and {} seconds, got {}",
            MAX_SWAP_DEADLINE_SECS,
            secs
        ));
    }
    Ok(secs)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Returns true when a signing key was supplied.
    pub fn has_signer(&self) -> bool {
        self.private_key.is_some()
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let rpc_url = env::var("RPC_URL").unwrap_or_else(|_| MONAD_TESTNET_RPC.to_string());
        url::Url::parse(&rpc_url).context("RPC_URL must be a valid URL")?;

        let chain_id = env::var("CHAIN_ID")
            .unwrap_or_else(|_| MONAD_TESTNET_CHAIN_ID.to_string())
            .parse::<u64>()
            .context("CHAIN_ID must be a valid number")?;

        let private_key = env::var("PRIVATE_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::new);

        let router_address = match env::var("ROUTER_ADDRESS") {
            Ok(v) => parse_address("ROUTER_ADDRESS", &v)?,
            Err(_) => defaults.router_address,
        };

        let nft_factory_address = match env::var("NFT_FACTORY_ADDRESS") {
            Ok(v) if !v.trim().is_empty() => Some(parse_address("NFT_FACTORY_ADDRESS", &v)?),
            _ => None,
        };

        let approval_policy = match env::var("APPROVAL_POLICY") {
            Ok(v) => v.parse().context("APPROVAL_POLICY must be 'exact' or 'unlimited'")?,
            Err(_) => ApprovalPolicy::Exact,
        };

        let extra_tokens = match env::var("EXTRA_TOKENS") {
            Ok(v) => serde_json::from_str(&v)
                .context("EXTRA_TOKENS must be a JSON array of token descriptors")?,
            Err(_) => Vec::new(),
        };

        let swap_path_overrides = match env::var("SWAP_PATH_OVERRIDES") {
            Ok(v) => serde_json::from_str(&v)
                .context("SWAP_PATH_OVERRIDES must be a JSON map of 'SRC/DST' -> [symbols]")?,
            Err(_) => HashMap::new(),
        };

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            rpc_url,
            chain_id,
            private_key,

            router_address,
            nft_factory_address,

            confirmation_timeout_secs: env::var("CONFIRMATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("CONFIRMATION_TIMEOUT_SECS must be a valid number")?,
            confirmations: env::var("CONFIRMATIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("CONFIRMATIONS must be a valid number")?,
            default_slippage: env::var("DEFAULT_SLIPPAGE")
                .unwrap_or_else(|_| defaults.default_slippage.clone()),
            approval_policy,
            unstake_prefer_swap: env::var("UNSTAKE_PREFER_SWAP")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            swap_deadline_secs: parse_deadline(
                &env::var("SWAP_DEADLINE_SECS").unwrap_or_else(|_| "1200".to_string()),
            )?,

            extra_tokens,
            swap_path_overrides,
        })
    }
}
