use serde::{Deserialize, Serialize};

use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub token: String,
    pub user: UserInfo,
}

/// Body for assign and revoke.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRequest {
    pub school_id: String,
    pub user_email: String,
    #[serde(default)]
    pub motivo: String,
    #[serde(default)]
    pub ticket: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub school_id: String,
    pub from_email: String,
    pub to_email: String,
    #[serde(default)]
    pub motivo: String,
    #[serde(default)]
    pub ticket: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLimitRequest {
    pub new_limit: i64,
    #[serde(default)]
    pub motivo: String,
}

#[derive(Debug, Serialize)]
pub struct GlobalLimitData {
    pub limit: i64,
    pub default: i64,
}

#[derive(Debug, Serialize)]
pub struct SetGlobalLimitData {
    pub updated: usize,
    pub limit: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, rename = "schoolId")]
    pub school_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub export: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCredentialRequest {
    pub username: String,
    pub name: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub username: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub username: String,
    pub new_role: String,
}
