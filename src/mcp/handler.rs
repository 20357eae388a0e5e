//! # MCP Handler Module
//!
//! This module implements the Model Context Protocol (MCP) for the Monad server.
//! It handles incoming MCP requests and dispatches them to the orchestrator.
//!
//! ## Supported Tools
//!
//! ### Queries
//! - `get_balance` - Native and token balances for an address
//! - `list_tokens` - Registered tokens with addresses and decimals
//! - `get_quote` - Router quote for a token pair
//! - `get_block`, `get_transaction`, `get_gas_price` - Raw chain reads
//!
//! ### Orchestrated Operations
//! - `transfer`, `wrap`, `unwrap`, `swap`
//! - `stake`, `unstake`, `claim_withdrawals`, `get_pending_withdrawals`
//! - `deploy_nft_collection`
//!
//! ### Free Text
//! - `process_request` - Parses an English or Spanish request and runs it

use ethers::types::H256;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{error, info};

use crate::{
    blockchain::models::{CollectionRequest, OrchestrationError, OrchestrationResult},
    format,
    intent::{self, Intent},
    mcp::protocol::{error_codes, Request, Response},
    orchestrator::UnstakeOptions,
    utils, AppState,
};

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            // Do not overwrite if caller already set content
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

fn error_code_for(invalid_input: bool) -> i32 {
    if invalid_input {
        error_codes::INVALID_PARAMS
    } else {
        error_codes::INTERNAL_ERROR
    }
}

/// Maps an orchestration result onto a JSON-RPC response. Failures become
/// errors carrying the failure report as `data`.
fn orchestration_response(req_id: &Value, result: OrchestrationResult) -> Response {
    let text = format::format_result(&result);
    match &result {
        OrchestrationResult::Failure(report) => Response::error_with_data(
            req_id.clone(),
            error_code_for(report.kind.is_invalid_input()),
            text,
            json!(report),
        ),
        _ => Response::success(req_id.clone(), make_texty_result(text, json!(result))),
    }
}

fn orchestration_error(req_id: &Value, err: &OrchestrationError) -> Response {
    orchestration_response(req_id, OrchestrationResult::from(Err(err.clone())))
}

fn chain_error(req_id: &Value, err: impl std::fmt::Display) -> Response {
    Response::error(req_id.clone(), error_codes::INTERNAL_ERROR, err.to_string())
}

const TOOL_NAMES: [&str; 16] = [
    "get_balance",
    "list_tokens",
    "get_quote",
    "transfer",
    "wrap",
    "unwrap",
    "swap",
    "stake",
    "unstake",
    "claim_withdrawals",
    "get_pending_withdrawals",
    "deploy_nft_collection",
    "get_block",
    "get_transaction",
    "get_gas_price",
    "process_request",
];

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        // Convenience aliases to support direct method calls from CLI
        // They are rewritten into tools/call internally to reuse the same logic
        name if TOOL_NAMES.contains(&name) => {
            let name = req.method.clone();
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": name,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);
    let req_id = &req.id;

    let orchestrator = &state.orchestrator;

    match tool_name {
        "get_balance" => {
            let res: Result<Response, Response> = (async {
                let address = utils::get_optional_arg::<String>(args, "address", req_id)?;
                let tokens = utils::get_optional_arg::<Vec<String>>(args, "tokens", req_id)?
                    .unwrap_or_default();
                let report = orchestrator
                    .balances(address.as_deref(), &tokens)
                    .await
                    .map_err(|e| orchestration_error(req_id, &e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(format::format_balances(&report), json!(report)),
                ))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "list_tokens" => {
            let registry = orchestrator.registry();
            let tokens: Vec<_> = std::iter::once(registry.native())
                .chain(registry.tokens().iter())
                .collect();
            let text = format!("Supported tokens: {}", registry.symbols().join(", "));
            Response::success(req_id.clone(), make_texty_result(text, json!({ "tokens": tokens })))
        }
        "get_quote" => {
            let res: Result<Response, Response> = (async {
                let from = utils::get_required_arg::<String>(args, "from_token", req_id)?;
                let to = utils::get_required_arg::<String>(args, "to_token", req_id)?;
                let amount = utils::get_amount_arg(args, "amount", req_id)?;
                let quote = orchestrator
                    .quote(&from, &to, &amount)
                    .await
                    .map_err(|e| orchestration_error(req_id, &e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(format::format_quote(&quote), json!(quote)),
                ))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "transfer" => {
            let res: Result<Response, Response> = (async {
                let token = utils::get_required_arg::<String>(args, "token", req_id)?;
                let amount = utils::get_amount_arg(args, "amount", req_id)?;
                let to = utils::get_required_arg::<String>(args, "to", req_id)?;
                let result = orchestrator.transfer(&token, &amount, &to).await;
                Ok(orchestration_response(req_id, result))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "wrap" | "unwrap" => {
            let res: Result<Response, Response> = (async {
                let amount = utils::get_amount_arg(args, "amount", req_id)?;
                let result = if tool_name == "wrap" {
                    orchestrator.wrap(&amount).await
                } else {
                    orchestrator.unwrap(&amount).await
                };
                Ok(orchestration_response(req_id, result))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "swap" => {
            let res: Result<Response, Response> = (async {
                let from = utils::get_required_arg::<String>(args, "from_token", req_id)?;
                let to = utils::get_required_arg::<String>(args, "to_token", req_id)?;
                let amount = utils::get_amount_arg(args, "amount", req_id)?;
                let slippage = match args.get("slippage") {
                    Some(Value::Null) | None => None,
                    Some(_) => Some(utils::get_amount_arg(args, "slippage", req_id)?),
                };
                let result = orchestrator
                    .swap(&from, &to, &amount, slippage.as_deref())
                    .await;
                Ok(orchestration_response(req_id, result))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "stake" => {
            let res: Result<Response, Response> = (async {
                let amount = utils::get_amount_arg(args, "amount", req_id)?;
                Ok(orchestration_response(req_id, orchestrator.stake(&amount).await))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "unstake" => {
            let res: Result<Response, Response> = (async {
                let amount = utils::get_amount_arg(args, "amount", req_id)?;
                let options = UnstakeOptions {
                    prefer_swap: utils::get_optional_arg::<bool>(args, "prefer_swap", req_id)?,
                    slippage: match args.get("slippage") {
                        Some(Value::Null) | None => None,
                        Some(_) => Some(utils::get_amount_arg(args, "slippage", req_id)?),
                    },
                };
                Ok(orchestration_response(
                    req_id,
                    orchestrator.unstake(&amount, options).await,
                ))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "claim_withdrawals" => {
            orchestration_response(req_id, orchestrator.claim_withdrawals().await)
        }
        "get_pending_withdrawals" => {
            orchestration_response(req_id, orchestrator.pending_withdrawals().await)
        }
        "deploy_nft_collection" => {
            let res: Result<Response, Response> = (async {
                let request = CollectionRequest {
                    name: utils::get_required_arg::<String>(args, "name", req_id)?,
                    symbol: utils::get_required_arg::<String>(args, "symbol", req_id)?,
                    description: utils::get_optional_arg::<String>(args, "description", req_id)?,
                    max_supply: utils::get_optional_arg::<u64>(args, "max_supply", req_id)?
                        .unwrap_or(100),
                };
                if request.name.trim().is_empty() || request.symbol.trim().is_empty() {
                    return Err(Response::error(
                        req_id.clone(),
                        error_codes::INVALID_PARAMS,
                        "Collection name and symbol must not be empty".into(),
                    ));
                }
                Ok(orchestration_response(
                    req_id,
                    orchestrator.deploy_collection(request).await,
                ))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "get_block" => {
            let res: Result<Response, Response> = (async {
                let number = match utils::get_optional_arg::<u64>(args, "number", req_id)? {
                    Some(n) => n,
                    None => state
                        .chain
                        .get_block_number()
                        .await
                        .map_err(|e| chain_error(req_id, e))?,
                };
                let block = state
                    .chain
                    .get_block(number)
                    .await
                    .map_err(|e| chain_error(req_id, e))?
                    .ok_or_else(|| {
                        Response::error(
                            req_id.clone(),
                            error_codes::INVALID_PARAMS,
                            format!("Block {} not found", number),
                        )
                    })?;
                let text = format!(
                    "Block {} ({} transactions)",
                    number,
                    block.transactions.len()
                );
                Ok(Response::success(req_id.clone(), make_texty_result(text, json!(block))))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "get_transaction" => {
            let res: Result<Response, Response> = (async {
                let raw = utils::get_required_arg::<String>(args, "hash", req_id)?;
                let hash = H256::from_str(raw.trim()).map_err(|_| {
                    Response::error(
                        req_id.clone(),
                        error_codes::INVALID_PARAMS,
                        format!("Invalid transaction hash: {}", raw),
                    )
                })?;
                let tx = state
                    .chain
                    .get_transaction(hash)
                    .await
                    .map_err(|e| chain_error(req_id, e))?
                    .ok_or_else(|| {
                        Response::error(
                            req_id.clone(),
                            error_codes::INVALID_PARAMS,
                            format!("Transaction {:?} not found", hash),
                        )
                    })?;
                let receipt = state
                    .chain
                    .get_transaction_receipt(hash)
                    .await
                    .map_err(|e| chain_error(req_id, e))?;
                let status = match receipt.as_ref().and_then(|r| r.status) {
                    Some(s) if s.as_u64() == 1 => "succeeded",
                    Some(_) => "reverted",
                    None => "pending",
                };
                let text = format!("Transaction {:?} {}", hash, status);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(text, json!({ "transaction": tx, "receipt": receipt })),
                ))
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "get_gas_price" => match state.chain.get_gas_price().await {
            Ok(price) => {
                let gwei = ethers::utils::format_units(price, "gwei").unwrap_or_default();
                Response::success(
                    req_id.clone(),
                    make_texty_result(
                        format!("Gas price: {} gwei", gwei),
                        json!({ "wei": price.to_string(), "gwei": gwei }),
                    ),
                )
            }
            Err(e) => {
                error!("Gas price query failed: {}", e);
                chain_error(req_id, e)
            }
        },
        "process_request" => {
            let res: Result<Response, Response> = (async {
                let text = utils::get_required_arg::<String>(args, "text", req_id)?;
                let parsed = intent::parse_intent(&text).ok_or_else(|| {
                    Response::error(
                        req_id.clone(),
                        error_codes::INVALID_PARAMS,
                        "Request not recognized. Try e.g. 'swap 1 MON for USDC' or 'stake 2 MON'."
                            .into(),
                    )
                })?;
                info!("Parsed request as {:?}", parsed);
                Ok(run_intent(req_id, &state, parsed).await)
            })
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        _ => Response::error(
            req_id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Tool not found: {}", tool_name),
        ),
    }
}

/// Runs a parsed request through the same orchestrator entry points as the
/// structured tools.
async fn run_intent(req_id: &Value, state: &AppState, parsed: Intent) -> Response {
    let orchestrator = &state.orchestrator;
    match parsed {
        Intent::Balance { address } => match orchestrator.balances(address.as_deref(), &[]).await {
            Ok(report) => Response::success(
                req_id.clone(),
                make_texty_result(format::format_balances(&report), json!(report)),
            ),
            Err(e) => orchestration_error(req_id, &e),
        },
        Intent::Quote {
            amount,
            source,
            destination,
        } => match orchestrator.quote(&source, &destination, &amount).await {
            Ok(quote) => Response::success(
                req_id.clone(),
                make_texty_result(format::format_quote(&quote), json!(quote)),
            ),
            Err(e) => orchestration_error(req_id, &e),
        },
        Intent::Transfer { amount, token, to } => {
            orchestration_response(req_id, orchestrator.transfer(&token, &amount, &to).await)
        }
        Intent::Wrap { amount } => orchestration_response(req_id, orchestrator.wrap(&amount).await),
        Intent::Unwrap { amount } => {
            orchestration_response(req_id, orchestrator.unwrap(&amount).await)
        }
        Intent::Swap {
            amount,
            source,
            destination,
        } => orchestration_response(
            req_id,
            orchestrator.swap(&source, &destination, &amount, None).await,
        ),
        Intent::Stake { amount } => {
            orchestration_response(req_id, orchestrator.stake(&amount).await)
        }
        Intent::Unstake { amount } => orchestration_response(
            req_id,
            orchestrator
                .unstake(&amount, UnstakeOptions::default())
                .await,
        ),
        Intent::ClaimWithdrawals => {
            orchestration_response(req_id, orchestrator.claim_withdrawals().await)
        }
        Intent::PendingWithdrawals => {
            orchestration_response(req_id, orchestrator.pending_withdrawals().await)
        }
        Intent::DeployCollection { name, symbol } => orchestration_response(
            req_id,
            orchestrator
                .deploy_collection(CollectionRequest {
                    name,
                    symbol,
                    description: None,
                    max_supply: 100,
                })
                .await,
        ),
    }
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "monad_mcp",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions =
        "Monad testnet MCP server for balances, transfers, wrapping, swaps, staking and NFT collection deploys.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let amount = json!({"type": ["string", "number"], "description": "Amount in human units, e.g. '1.5'."});
    let slippage = json!({"type": ["string", "number"], "description": "Slippage tolerance in percent with one decimal, e.g. '0.5'."});
    let tools = json!([
        {
            "name": "get_balance",
            "description": "Get MON and token balances of an address (defaults to the server's signer).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": {"type": "string", "description": "The 0x... address to check."},
                    "tokens": {"type": "array", "items": {"type": "string"}, "description": "Token symbols; all registered tokens when omitted."}
                }
            }
        },
        {
            "name": "list_tokens",
            "description": "List the supported tokens with their addresses and decimals.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_quote",
            "description": "Quote a swap on the Uniswap V2 router without executing it.",
            "inputSchema": {
                "type": "object",
                "properties": {"from_token": {"type": "string"}, "to_token": {"type": "string"}, "amount": amount},
                "required": ["from_token", "to_token", "amount"]
            }
        },
        {
            "name": "transfer",
            "description": "Send MON or a registered token to an address.",
            "inputSchema": {
                "type": "object",
                "properties": {"token": {"type": "string"}, "amount": amount, "to": {"type": "string"}},
                "required": ["token", "amount", "to"]
            }
        },
        {
            "name": "wrap",
            "description": "Wrap MON into WMON.",
            "inputSchema": {"type": "object", "properties": {"amount": amount}, "required": ["amount"]}
        },
        {
            "name": "unwrap",
            "description": "Unwrap WMON into MON.",
            "inputSchema": {"type": "object", "properties": {"amount": amount}, "required": ["amount"]}
        },
        {
            "name": "swap",
            "description": "Swap tokens through the Uniswap V2 router with a minimum-output floor. Approves the router first when needed.",
            "inputSchema": {
                "type": "object",
                "properties": {"from_token": {"type": "string"}, "to_token": {"type": "string"}, "amount": amount, "slippage": slippage},
                "required": ["from_token", "to_token", "amount"]
            }
        },
        {
            "name": "stake",
            "description": "Stake MON into the aprMON liquid staking vault.",
            "inputSchema": {"type": "object", "properties": {"amount": amount}, "required": ["amount"]}
        },
        {
            "name": "unstake",
            "description": "Unstake aprMON. Tries a redemption request, then a transfer to the vault; with prefer_swap sells aprMON for MON instead.",
            "inputSchema": {
                "type": "object",
                "properties": {"amount": amount, "prefer_swap": {"type": "boolean"}, "slippage": slippage},
                "required": ["amount"]
            }
        },
        {
            "name": "claim_withdrawals",
            "description": "Claim finished aprMON withdrawals (currently unavailable).",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_pending_withdrawals",
            "description": "List pending aprMON withdrawal requests (currently unavailable).",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "deploy_nft_collection",
            "description": "Deploy an NFT collection through the configured factory with generated placeholder artwork.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "symbol": {"type": "string"},
                    "description": {"type": "string"},
                    "max_supply": {"type": "integer", "minimum": 1}
                },
                "required": ["name", "symbol"]
            }
        },
        {
            "name": "get_block",
            "description": "Get a block by number (latest when omitted).",
            "inputSchema": {"type": "object", "properties": {"number": {"type": "integer"}}}
        },
        {
            "name": "get_transaction",
            "description": "Get a transaction and its receipt by hash.",
            "inputSchema": {"type": "object", "properties": {"hash": {"type": "string"}}, "required": ["hash"]}
        },
        {
            "name": "get_gas_price",
            "description": "Current gas price on Monad testnet.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "process_request",
            "description": "Run a plain-language request in English or Spanish, e.g. 'swap 1 MON for USDC' or 'stakea 2 MON'.",
            "inputSchema": {"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}
        },
    ]);
    Response::success(req.id.clone(), json!({ "tools": tools }))
}
