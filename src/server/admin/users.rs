use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use crate::auth::{PasswordHasher, RequireAdmin};
use crate::server::AppState;
use crate::server::dto::{CreateCredentialRequest, UpdatePasswordRequest, UpdateRoleRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_password, validate_username};
use crate::types::{Credential, Role};

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Credential>>>, ApiError> {
    let creds = state.store.list_credentials()?;
    Ok(Json(ApiResponse::success(creds)))
}

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCredentialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_lowercase();
    let name = req.name.trim().to_string();

    if username.is_empty() || name.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "Username, nome e senha são obrigatórios",
        ));
    }
    validate_username(&username)?;
    validate_password(&req.password)?;

    let role = Role::parse(&req.role).ok_or_else(|| ApiError::bad_request("Perfil inválido"))?;

    let hasher = PasswordHasher::new();
    let now = Utc::now();
    let cred = Credential {
        username,
        name,
        role,
        password_hash: hasher.hash(&req.password)?,
        created_at: now,
        updated_at: now,
    };

    state.store.create_credential(&cred)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(cred, "Usuário criado com sucesso")),
    ))
}

pub async fn update_password(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let username = req.username.trim().to_lowercase();
    if username.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::bad_request(
            "Username e nova senha são obrigatórios",
        ));
    }
    validate_password(&req.new_password)?;

    let hasher = PasswordHasher::new();
    let hash = hasher.hash(&req.new_password)?;
    state.store.update_credential_password(&username, &hash)?;

    Ok(Json(ApiResponse::message("Senha atualizada com sucesso")))
}

pub async fn update_role(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let username = req.username.trim().to_lowercase();
    if username.is_empty() || req.new_role.is_empty() {
        return Err(ApiError::bad_request(
            "Username e novo perfil são obrigatórios",
        ));
    }

    let role =
        Role::parse(&req.new_role).ok_or_else(|| ApiError::bad_request("Perfil inválido"))?;
    state.store.update_credential_role(&username, role)?;

    Ok(Json(ApiResponse::message("Perfil atualizado com sucesso")))
}
