use std::sync::Arc;

use axum::{Json, extract::State};

use crate::auth::RequireAgent;
use crate::server::AppState;
use crate::server::dto::{LicenseRequest, TransferRequest};
use crate::server::response::{ApiError, ApiResponse};

fn require_field(value: &str, message: &'static str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(message));
    }
    Ok(())
}

pub async fn assign(
    RequireAgent(user): RequireAgent,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LicenseRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_field(&req.school_id, "schoolId é obrigatório")?;
    require_field(&req.user_email, "userEmail é obrigatório")?;

    let message = state.licenses.assign(
        &req.school_id,
        &req.user_email,
        &req.motivo,
        &req.ticket,
        &user.username,
    )?;
    Ok(Json(ApiResponse::message(message)))
}

pub async fn revoke(
    RequireAgent(user): RequireAgent,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LicenseRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_field(&req.school_id, "schoolId é obrigatório")?;
    require_field(&req.user_email, "userEmail é obrigatório")?;

    let message = state.licenses.revoke(
        &req.school_id,
        &req.user_email,
        &req.motivo,
        &req.ticket,
        &user.username,
    )?;
    Ok(Json(ApiResponse::message(message)))
}

pub async fn transfer(
    RequireAgent(user): RequireAgent,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_field(&req.school_id, "schoolId é obrigatório")?;
    require_field(&req.from_email, "fromEmail é obrigatório")?;
    require_field(&req.to_email, "toEmail é obrigatório")?;

    let message = state.licenses.transfer(
        &req.school_id,
        &req.from_email,
        &req.to_email,
        &req.motivo,
        &req.ticket,
        &user.username,
    )?;
    Ok(Json(ApiResponse::message(message)))
}
