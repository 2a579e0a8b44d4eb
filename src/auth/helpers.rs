use std::sync::Arc;
use std::time::Duration;

use super::PasswordHasher;
use crate::error::Error;
use crate::server::AppState;
use crate::types::Role;

/// The identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub name: String,
    pub role: Role,
}

/// Outcome of a username/password check. Failures are ordinary values so the
/// login handler can map them to status codes without a stack trace.
pub enum AuthOutcome {
    Success(AuthUser),
    InvalidCredentials,
    Locked { retry_in: Duration },
}

#[derive(Debug)]
pub enum TokenValidationError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

/// Validates staff credentials with the lockout policy applied.
///
/// The username is lowercased before any lookup. Unknown users and password
/// mismatches both count as failed attempts and both report the same
/// `InvalidCredentials` outcome.
pub fn authenticate(
    state: &Arc<AppState>,
    username: &str,
    password: &str,
) -> crate::error::Result<AuthOutcome> {
    let username = username.trim().to_lowercase();

    if let Some(retry_in) = state.lockout.locked_for(&username) {
        return Ok(AuthOutcome::Locked { retry_in });
    }

    let Some(cred) = state.store.get_credential(&username)? else {
        state.lockout.record_failure(&username);
        return Ok(AuthOutcome::InvalidCredentials);
    };

    let hasher = PasswordHasher::new();
    if !hasher.verify(password, &cred.password_hash)? {
        state.lockout.record_failure(&username);
        return Ok(AuthOutcome::InvalidCredentials);
    }

    state.lockout.clear(&username);

    Ok(AuthOutcome::Success(AuthUser {
        username: cred.username,
        name: cred.name,
        role: cred.role,
    }))
}

/// Validates a Bearer token from an Authorization header and resolves the
/// request identity. Tokens whose subject no longer exists in the credential
/// store are rejected even when the signature is still valid.
pub fn validate_bearer(
    state: &Arc<AppState>,
    auth_header: Option<&str>,
) -> Result<AuthUser, TokenValidationError> {
    let header = auth_header.ok_or(TokenValidationError::MissingAuth)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(TokenValidationError::InvalidScheme)?;

    let claims = state.tokens.verify(token).map_err(|e| match e {
        Error::TokenExpired => TokenValidationError::TokenExpired,
        _ => TokenValidationError::InvalidToken,
    })?;

    let cred = state
        .store
        .get_credential(&claims.sub)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    Ok(AuthUser {
        username: cred.username,
        name: claims.name,
        role: claims.role,
    })
}
