use std::sync::Arc;

use axum::{Json, extract::State};

use crate::auth::RequireCoordinator;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::sync::{FileCollector, RefreshSummary, run_refresh};

/// Re-derives the allocation snapshot from the last raw payload and the
/// schools reference table, and records a `reload_data` audit row.
pub async fn reload_data(
    RequireCoordinator(user): RequireCoordinator,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RefreshSummary>>, ApiError> {
    let collector = FileCollector::new(state.config.raw_metrics_path());

    let summary = run_refresh(
        &collector,
        &state.config.schools_csv_path(),
        &state.config.snapshot_path(),
        Some(state.store.as_ref()),
    )
    .await?;

    state.licenses.record_reload(&user.username)?;

    Ok(Json(ApiResponse::with_message(
        summary,
        "Dados recarregados com sucesso",
    )))
}
