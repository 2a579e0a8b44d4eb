use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{AuthUser, TokenValidationError, validate_bearer};
use crate::server::AppState;
use crate::types::Role;

/// Extractor that requires role Agent or above (any authenticated staff).
pub struct RequireAgent(pub AuthUser);

/// Extractor that requires role Coordinator or above.
pub struct RequireCoordinator(pub AuthUser);

/// Extractor that requires role Admin.
pub struct RequireAdmin(pub AuthUser);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    Forbidden,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação ausente ou inválido",
            ),
            AuthError::InvalidScheme => (
                StatusCode::UNAUTHORIZED,
                "Esquema de autorização inválido",
            ),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token inválido"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expirado"),
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Acesso negado. Permissão insuficiente.",
            ),
            AuthError::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "Erro interno"),
        };

        let body = json!({ "success": false, "message": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Bearer realm=\"licman\"".parse().unwrap(),
            );
        }

        response
    }
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::MissingAuth => AuthError::MissingAuth,
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::TokenExpired => AuthError::TokenExpired,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

fn require_role(parts: &Parts, state: &Arc<AppState>, required: Role) -> Result<AuthUser, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let user = validate_bearer(state, auth_header)?;

    if !user.role.satisfies(required) {
        return Err(AuthError::Forbidden);
    }

    Ok(user)
}

impl FromRequestParts<Arc<AppState>> for RequireAgent {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Agent).map(RequireAgent)
    }
}

impl FromRequestParts<Arc<AppState>> for RequireCoordinator {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Coordinator).map(RequireCoordinator)
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).map(RequireAdmin)
    }
}
