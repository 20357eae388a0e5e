use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::error;

use super::error_status;

// Optional comma-separated token filter, e.g. `?tokens=USDC,WMON`.
#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub tokens: Option<String>,
}

// The handler function for the GET /balance/{address} endpoint.
pub async fn get_balance_handler(
    Path(address): Path<String>,
    Query(query): Query<BalanceQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tokens: Vec<String> = query
        .tokens
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    match state.orchestrator.balances(Some(&address), &tokens).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Failed to get balances for {}: {}", address, e);
            (error_status(&e), Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
