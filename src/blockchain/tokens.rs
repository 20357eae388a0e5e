// src/blockchain/tokens.rs

//! Static token table for Monad testnet plus the swap-path exception table.
//!
//! The registry is built once at startup and shared read-only. Symbols are
//! matched case-insensitively but always handed back in their canonical
//! casing (`aprMON`, `shMON`, ...) because downstream calls key on it.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::blockchain::models::OrchestrationError;

pub const NATIVE_SYMBOL: &str = "MON";
pub const WRAPPED_NATIVE_SYMBOL: &str = "WMON";
pub const STAKED_SYMBOL: &str = "aprMON";

// (symbol, name, address, decimals)
const MONAD_TESTNET_TOKENS: &[(&str, &str, &str, u8)] = &[
    ("WMON", "Wrapped Monad", "0x760AfE86e5de5fa0Ee542fc7B7B713e1c5425701", 18),
    ("USDC", "USD Coin", "0xf817257fed379853cDe0fa4F97AB987181B1E5Ea", 6),
    ("USDT", "Tether USD", "0x88b8E2161DEDC77EF4ab7585569D2415a1C1055D", 6),
    ("WETH", "Wrapped Ether", "0xB5a30b0FDc5EA94A52fDc42e3E9760Cb8449Fb37", 18),
    ("WBTC", "Wrapped Bitcoin", "0xcf5a6076cfa32686c0Df13aBaDa2b40dec133F1d", 8),
    ("aprMON", "aPriori Monad LST", "0xb2f82D0f38dc453D596Ad40A37799446Cc89274A", 18),
    ("gMON", "Magma Staked MON", "0xaEef2f6B429Cb59C9B2D7bB2141ADa993E8571c3", 18),
    ("shMON", "ShMonad", "0x3a98250F98Dd388C211206983453837C8365BDc1", 18),
    ("sMON", "Kintsu Staked Monad", "0xe1d2439b75fb9746E7Bc6cB777Ae10AA7f7ef9c5", 18),
    ("CHOG", "Chog", "0xE0590015A873bF326bd645c3E1266d4db41C4E6B", 18),
    ("DAK", "Molandak", "0x0F0BDEbF0F83cD1EE3974779Bcb7315f9808c714", 18),
    ("YAKI", "Moyaki", "0xfe140e1dCe99Be9F4F15d657CD9b7BF622270C50", 18),
];

// Pairs without a direct pool. Routes copied from confirmed swaps.
const MONAD_TESTNET_PATHS: &[(&str, &str, &[&str])] = &[
    ("DAK", "USDC", &["DAK", "WMON", "USDC"]),
    ("USDC", "DAK", &["USDC", "WMON", "DAK"]),
];

/// A token the server knows how to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub name: String,
    /// The all-zero address marks the chain's native asset.
    pub address: Address,
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn new(symbol: &str, name: &str, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address,
            decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_zero()
    }
}

/// Ordered hop list handed to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPath {
    pub hops: Vec<Address>,
    /// Source was the native asset, rewritten to the wrapped address.
    pub native_in: bool,
    /// Destination was the native asset, rewritten to the wrapped address.
    pub native_out: bool,
}

#[derive(Debug, Clone)]
pub struct TokenRegistry {
    native: TokenDescriptor,
    wrapped_symbol: String,
    tokens: Vec<TokenDescriptor>,
    by_address: HashMap<Address, usize>,
    paths: HashMap<(String, String), Vec<String>>,
}

impl TokenRegistry {
    /// Builds a registry from a native descriptor and the contract-backed tokens.
    /// `wrapped_symbol` must name one of `tokens`.
    pub fn new(
        native: TokenDescriptor,
        wrapped_symbol: &str,
        tokens: Vec<TokenDescriptor>,
    ) -> Result<Self> {
        if !native.is_native() {
            bail!("native token {} must use the zero address", native.symbol);
        }
        let mut registry = Self {
            native,
            wrapped_symbol: wrapped_symbol.to_string(),
            tokens: Vec::new(),
            by_address: HashMap::new(),
            paths: HashMap::new(),
        };
        for token in tokens {
            registry.insert(token)?;
        }
        if registry.exact(wrapped_symbol).is_none() {
            bail!("wrapped token {} is not registered", wrapped_symbol);
        }
        Ok(registry)
    }

    /// The reference deployment's table.
    pub fn monad_testnet() -> Result<Self> {
        let native = TokenDescriptor::new(NATIVE_SYMBOL, "Monad", Address::zero(), 18);
        let tokens = MONAD_TESTNET_TOKENS
            .iter()
            .map(|(symbol, name, address, decimals)| {
                let address = Address::from_str(address)
                    .with_context(|| format!("bad address for {}", symbol))?;
                Ok(TokenDescriptor::new(symbol, name, address, *decimals))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut registry = Self::new(native, WRAPPED_NATIVE_SYMBOL, tokens)?;
        for (source, destination, hops) in MONAD_TESTNET_PATHS {
            let hops: Vec<String> = hops.iter().map(|s| s.to_string()).collect();
            registry.add_path(source, destination, hops)?;
        }
        Ok(registry)
    }

    /// Adds extra tokens (e.g. from `EXTRA_TOKENS`).
    pub fn with_tokens(mut self, extra: Vec<TokenDescriptor>) -> Result<Self> {
        for token in extra {
            self.insert(token)?;
        }
        Ok(self)
    }

    /// Adds path overrides keyed as `"SRC/DST"`.
    pub fn with_paths(mut self, overrides: HashMap<String, Vec<String>>) -> Result<Self> {
        for (key, hops) in overrides {
            let (source, destination) = key
                .split_once('/')
                .ok_or_else(|| anyhow!("path key '{}' must look like SRC/DST", key))?;
            self.add_path(source.trim(), destination.trim(), hops)?;
        }
        Ok(self)
    }

    fn insert(&mut self, token: TokenDescriptor) -> Result<()> {
        if token.is_native() {
            bail!("token {} cannot use the native sentinel address", token.symbol);
        }
        // The native symbol resolves in any casing, so a token spelled like it
        // would never be reachable.
        if token.symbol.eq_ignore_ascii_case(&self.native.symbol) {
            bail!("token {} collides with the native symbol {}", token.symbol, self.native.symbol);
        }
        if self.exact(&token.symbol).is_some() {
            bail!("duplicate token symbol {}", token.symbol);
        }
        if self.by_address.contains_key(&token.address) {
            bail!("duplicate token address {:?}", token.address);
        }
        self.by_address.insert(token.address, self.tokens.len());
        self.tokens.push(token);
        Ok(())
    }

    fn add_path(&mut self, source: &str, destination: &str, hops: Vec<String>) -> Result<()> {
        if hops.len() < 2 {
            bail!("path {}/{} needs at least two hops", source, destination);
        }
        let source = self.canonical(source)?;
        let destination = self.canonical(destination)?;
        let hops = hops
            .iter()
            .map(|h| self.canonical(h))
            .collect::<Result<Vec<_>>>()?;
        if hops.first() != Some(&source) || hops.last() != Some(&destination) {
            bail!("path {}/{} must start and end at its pair", source, destination);
        }
        self.paths.insert((source, destination), hops);
        Ok(())
    }

    fn canonical(&self, symbol: &str) -> Result<String> {
        self.resolve(symbol)
            .map(|t| t.symbol)
            .map_err(|e| anyhow!(e.to_string()))
    }

    fn exact(&self, symbol: &str) -> Option<&TokenDescriptor> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    /// Resolves a symbol in any casing. Exact-case matches win over
    /// case-insensitive ones; among the latter, registry order decides.
    pub fn resolve(&self, symbol: &str) -> Result<TokenDescriptor, OrchestrationError> {
        let wanted = symbol.trim();
        if wanted.eq_ignore_ascii_case(&self.native.symbol) {
            return Ok(self.native.clone());
        }
        self.exact(wanted)
            .or_else(|| self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(wanted)))
            .cloned()
            .ok_or_else(|| OrchestrationError::UnsupportedToken {
                symbol: wanted.to_string(),
                role: None,
                supported: self.symbols(),
            })
    }

    pub fn by_address(&self, address: &Address) -> Option<&TokenDescriptor> {
        self.by_address.get(address).map(|i| &self.tokens[*i])
    }

    pub fn native(&self) -> &TokenDescriptor {
        &self.native
    }

    pub fn wrapped_native(&self) -> &TokenDescriptor {
        // Checked in `new`.
        self.exact(&self.wrapped_symbol)
            .unwrap_or(&self.native)
    }

    /// All symbols, native first.
    pub fn symbols(&self) -> Vec<String> {
        std::iter::once(self.native.symbol.clone())
            .chain(self.tokens.iter().map(|t| t.symbol.clone()))
            .collect()
    }

    /// Contract-backed tokens in registry order.
    pub fn tokens(&self) -> &[TokenDescriptor] {
        &self.tokens
    }

    /// Address to use for `token` inside a router path.
    pub fn path_address(&self, token: &TokenDescriptor) -> Address {
        if token.is_native() {
            self.wrapped_native().address
        } else {
            token.address
        }
    }

    /// True when the pair is the native asset and its wrapped form.
    pub fn is_wrap_pair(&self, a: &TokenDescriptor, b: &TokenDescriptor) -> bool {
        let wrapped = &self.wrapped_symbol;
        (a.is_native() && &b.symbol == wrapped) || (b.is_native() && &a.symbol == wrapped)
    }

    /// Route for a resolved pair: exception table first, otherwise the
    /// direct `[source, destination]` pair.
    pub fn path_for(&self, source: &TokenDescriptor, destination: &TokenDescriptor) -> SwapPath {
        let key = (source.symbol.clone(), destination.symbol.clone());
        let hops = match self.paths.get(&key) {
            Some(symbols) => symbols
                .iter()
                .filter_map(|s| self.resolve(s).ok())
                .map(|t| self.path_address(&t))
                .collect(),
            None => vec![self.path_address(source), self.path_address(destination)],
        };
        SwapPath {
            hops,
            native_in: source.is_native(),
            native_out: destination.is_native(),
        }
    }
}
