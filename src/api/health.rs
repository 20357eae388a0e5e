use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "chain_id": state.chain.chain_id(),
        "signer": state.chain.sender().is_ok(),
    }))
}
