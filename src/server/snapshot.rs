use std::sync::Arc;

use axum::{Json, extract::State};

use crate::auth::RequireAgent;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};

/// Serves the latest allocation snapshot written by the refresh job.
pub async fn latest_snapshot(
    _auth: RequireAgent,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let path = state.config.snapshot_path();
    if !path.exists() {
        return Err(ApiError::not_found(
            "Nenhum snapshot disponível. Execute a sincronização primeiro.",
        ));
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|_| ApiError::internal("Falha ao ler snapshot"))?;
    let snapshot: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|_| ApiError::internal("Snapshot corrompido"))?;

    Ok(Json(ApiResponse::success(snapshot)))
}
