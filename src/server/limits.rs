use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::auth::RequireCoordinator;
use crate::server::AppState;
use crate::server::dto::{ChangeLimitRequest, GlobalLimitData, SetGlobalLimitData};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::DEFAULT_LICENSE_LIMIT;

pub async fn change_school_limit(
    RequireCoordinator(user): RequireCoordinator,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ChangeLimitRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if req.motivo.trim().is_empty() {
        return Err(ApiError::bad_request("Novo limite e motivo são obrigatórios"));
    }

    let message =
        state
            .licenses
            .change_school_limit(&id, req.new_limit, &req.motivo, &user.username)?;
    Ok(Json(ApiResponse::message(message)))
}

pub async fn get_global_limit(
    _auth: RequireCoordinator,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<GlobalLimitData>>, ApiError> {
    let limit = state.licenses.get_global_limit()?;
    Ok(Json(ApiResponse::success(GlobalLimitData {
        limit,
        default: DEFAULT_LICENSE_LIMIT,
    })))
}

pub async fn set_global_limit(
    RequireCoordinator(user): RequireCoordinator,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangeLimitRequest>,
) -> Result<Json<ApiResponse<SetGlobalLimitData>>, ApiError> {
    if req.motivo.trim().is_empty() {
        return Err(ApiError::bad_request("Novo limite e motivo são obrigatórios"));
    }

    let updated = state
        .licenses
        .set_global_limit(req.new_limit, &req.motivo, &user.username)?;

    Ok(Json(ApiResponse::with_message(
        SetGlobalLimitData {
            updated,
            limit: req.new_limit,
        },
        "Limite global alterado com sucesso",
    )))
}
