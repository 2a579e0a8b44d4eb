use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::auth::RequireAgent;
use crate::license::{SchoolOverview, SchoolUserView};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_schools(
    _auth: RequireAgent,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<SchoolOverview>>>, ApiError> {
    let overview = state.licenses.get_overview()?;
    Ok(Json(ApiResponse::success(overview)))
}

pub async fn school_users(
    _auth: RequireAgent,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<SchoolUserView>>>, ApiError> {
    let users = state.licenses.get_school_users(&id)?;
    Ok(Json(ApiResponse::success(users)))
}
