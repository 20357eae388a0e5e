// src/blockchain/services/abi.rs

//! Calldata encoding and return-data decoding for the handful of contracts
//! the orchestrator talks to: ERC-20 tokens, WMON, the V2 router, the aprMON
//! staking vault and the collection factory.

use anyhow::{anyhow, Result};
use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::keccak256;

pub const BALANCE_OF: &str = "balanceOf(address)";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const TRANSFER: &str = "transfer(address,uint256)";
pub const WRAP_DEPOSIT: &str = "deposit()";
pub const UNWRAP_WITHDRAW: &str = "withdraw(uint256)";
pub const GET_AMOUNTS_OUT: &str = "getAmountsOut(uint256,address[])";
pub const SWAP_EXACT_ETH_FOR_TOKENS: &str = "swapExactETHForTokens(uint256,address[],address,uint256)";
pub const SWAP_EXACT_TOKENS_FOR_ETH: &str =
    "swapExactTokensForETH(uint256,uint256,address[],address,uint256)";
pub const SWAP_EXACT_TOKENS_FOR_TOKENS: &str =
    "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)";
pub const STAKE_DEPOSIT: &str = "deposit(uint256,address)";
pub const REQUEST_REDEEM: &str = "requestRedeem(uint256,address,address)";
pub const CONVERT_TO_SHARES: &str = "convertToShares(uint256)";
pub const CREATE_COLLECTION: &str = "createCollection(string,string,string,uint256)";

pub fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

pub fn encode_call(sig: &str, tokens: Vec<Token>) -> Bytes {
    let mut out = selector(sig).to_vec();
    let mut tail = encode(&tokens);
    out.append(&mut tail);
    Bytes::from(out)
}

fn address_array(path: &[Address]) -> Token {
    Token::Array(path.iter().copied().map(Token::Address).collect())
}

pub fn balance_of(owner: Address) -> Bytes {
    encode_call(BALANCE_OF, vec![Token::Address(owner)])
}

pub fn allowance(owner: Address, spender: Address) -> Bytes {
    encode_call(ALLOWANCE, vec![Token::Address(owner), Token::Address(spender)])
}

pub fn approve(spender: Address, amount: U256) -> Bytes {
    encode_call(APPROVE, vec![Token::Address(spender), Token::Uint(amount)])
}

pub fn transfer(to: Address, amount: U256) -> Bytes {
    encode_call(TRANSFER, vec![Token::Address(to), Token::Uint(amount)])
}

pub fn wrap() -> Bytes {
    encode_call(WRAP_DEPOSIT, vec![])
}

pub fn unwrap(amount: U256) -> Bytes {
    encode_call(UNWRAP_WITHDRAW, vec![Token::Uint(amount)])
}

pub fn get_amounts_out(amount_in: U256, path: &[Address]) -> Bytes {
    encode_call(GET_AMOUNTS_OUT, vec![Token::Uint(amount_in), address_array(path)])
}

pub fn swap_exact_eth_for_tokens(
    amount_out_min: U256,
    path: &[Address],
    to: Address,
    deadline: U256,
) -> Bytes {
    encode_call(
        SWAP_EXACT_ETH_FOR_TOKENS,
        vec![
            Token::Uint(amount_out_min),
            address_array(path),
            Token::Address(to),
            Token::Uint(deadline),
        ],
    )
}

/// `swapExactTokensForETH` or `swapExactTokensForTokens`, selected by `sig`.
pub fn swap_exact_tokens(
    sig: &str,
    amount_in: U256,
    amount_out_min: U256,
    path: &[Address],
    to: Address,
    deadline: U256,
) -> Bytes {
    encode_call(
        sig,
        vec![
            Token::Uint(amount_in),
            Token::Uint(amount_out_min),
            address_array(path),
            Token::Address(to),
            Token::Uint(deadline),
        ],
    )
}

pub fn stake_deposit(assets: U256, receiver: Address) -> Bytes {
    encode_call(STAKE_DEPOSIT, vec![Token::Uint(assets), Token::Address(receiver)])
}

pub fn request_redeem(shares: U256, controller: Address, owner: Address) -> Bytes {
    encode_call(
        REQUEST_REDEEM,
        vec![Token::Uint(shares), Token::Address(controller), Token::Address(owner)],
    )
}

pub fn convert_to_shares(assets: U256) -> Bytes {
    encode_call(CONVERT_TO_SHARES, vec![Token::Uint(assets)])
}

pub fn create_collection(name: &str, symbol: &str, base_uri: &str, max_supply: u64) -> Bytes {
    encode_call(
        CREATE_COLLECTION,
        vec![
            Token::String(name.to_string()),
            Token::String(symbol.to_string()),
            Token::String(base_uri.to_string()),
            Token::Uint(U256::from(max_supply)),
        ],
    )
}

pub fn decode_u256(data: &[u8]) -> Result<U256> {
    let tokens = decode(&[ParamType::Uint(256)], data)?;
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| anyhow!("expected a uint256 return value"))
}

pub fn decode_u256_array(data: &[u8]) -> Result<Vec<U256>> {
    let tokens = decode(&[ParamType::Array(Box::new(ParamType::Uint(256)))], data)?;
    let array = tokens
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| anyhow!("expected a uint256[] return value"))?;
    array
        .into_iter()
        .map(|t| t.into_uint().ok_or_else(|| anyhow!("non-uint element in uint256[]")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_selectors() {
        assert_eq!(hex::encode(selector(TRANSFER)), "a9059cbb");
        assert_eq!(hex::encode(selector(APPROVE)), "095ea7b3");
        assert_eq!(hex::encode(selector(BALANCE_OF)), "70a08231");
        assert_eq!(hex::encode(selector(GET_AMOUNTS_OUT)), "d06ca61f");
        assert_eq!(hex::encode(selector(WRAP_DEPOSIT)), "d0e30db0");
    }

    #[test]
    fn amounts_array_decodes_in_order() {
        let data = encode(&[Token::Array(vec![
            Token::Uint(U256::from(5u64)),
            Token::Uint(U256::from(9u64)),
        ])]);
        let amounts = decode_u256_array(&data).unwrap();
        assert_eq!(amounts, vec![U256::from(5u64), U256::from(9u64)]);
    }

    #[test]
    fn malformed_return_data_is_an_error() {
        assert!(decode_u256(&[1, 2, 3]).is_err());
        assert!(decode_u256_array(&[]).is_err());
    }
}
