use std::sync::Arc;

use axum::{Json, extract::State};

use crate::auth::{AuthOutcome, authenticate};
use crate::server::AppState;
use crate::server::dto::{LoginData, LoginRequest, UserInfo};
use crate::server::response::{ApiError, ApiResponse};

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginData>>, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "Username e password são obrigatórios",
        ));
    }

    match authenticate(&state, &req.username, &req.password)? {
        AuthOutcome::Locked { retry_in } => {
            let minutes = retry_in.as_secs().div_ceil(60);
            Err(ApiError::forbidden(format!(
                "Conta bloqueada por {minutes} minutos devido a muitas tentativas falhadas"
            )))
        }
        AuthOutcome::InvalidCredentials => Err(ApiError::unauthorized("Credenciais inválidas")),
        AuthOutcome::Success(user) => {
            let token = state.tokens.issue(&user.username, &user.name, user.role)?;

            Ok(Json(ApiResponse::with_message(
                LoginData {
                    token,
                    user: UserInfo {
                        username: user.username,
                        name: user.name,
                        role: user.role,
                    },
                },
                "Login realizado com sucesso",
            )))
        }
    }
}
