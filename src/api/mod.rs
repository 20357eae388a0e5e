//! # API Module
//!
//! HTTP handlers for the Monad MCP server.
//!
//! ## Available Endpoints
//!
//! - `GET /health` - Liveness, chain id and whether a signer is loaded
//! - `GET /balance/:address` - Native and token balances (`?tokens=USDC,WMON`)
//! - `GET /quote?from=MON&to=USDC&amount=1` - Router quote
//! - `POST /rpc` - JSON-RPC endpoint for MCP tool calls

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod balance;
pub mod health;
pub mod quote;
pub mod rpc;

/// Routes served under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/balance/:address", get(balance::get_balance_handler))
        .route("/quote", get(quote::get_quote_handler))
        .route("/rpc", post(rpc::rpc_handler))
}

/// Caller mistakes are 400s; chain and node failures are 502s.
fn error_status(err: &crate::blockchain::models::OrchestrationError) -> axum::http::StatusCode {
    use crate::blockchain::models::OrchestrationError;
    match err {
        e if e.is_invalid_input() => axum::http::StatusCode::BAD_REQUEST,
        OrchestrationError::MissingCredential => axum::http::StatusCode::BAD_REQUEST,
        _ => axum::http::StatusCode::BAD_GATEWAY,
    }
}
