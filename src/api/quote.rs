use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::warn;

use super::error_status;

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub from: String,
    pub to: String,
    pub amount: String,
}

// The handler function for the GET /quote endpoint.
pub async fn get_quote_handler(
    Query(query): Query<QuoteQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state
        .orchestrator
        .quote(&query.from, &query.to, &query.amount)
        .await
    {
        Ok(quote) => (StatusCode::OK, Json(serde_json::json!(quote))).into_response(),
        Err(e) => {
            warn!("Quote {} -> {} failed: {}", query.from, query.to, e);
            (
                error_status(&e),
                Json(serde_json::json!({ "error": e.to_string(), "kind": e.kind() })),
            )
                .into_response()
        }
    }
}
