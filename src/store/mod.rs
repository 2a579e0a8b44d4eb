mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Filters for the audit log reader. All fields are optional and combine
/// with AND; results are always newest-first.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub school_id: Option<String>,
    pub action: Option<String>,
    /// Case-insensitive substring match on the actor username.
    pub actor: Option<String>,
}

/// Store defines the database interface.
///
/// The license ledger operations run their precondition checks, the flag
/// mutation, and the audit insert under a single transaction; a failed
/// precondition leaves both the ledger and the audit log untouched.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // School operations
    fn upsert_school(&self, school: &School) -> Result<()>;
    fn get_school(&self, id: &str) -> Result<Option<School>>;
    fn list_schools(&self) -> Result<Vec<School>>;
    /// Used-license count per school id, for schools with at least one
    /// licensed user.
    fn list_license_usage(&self) -> Result<HashMap<String, i64>>;
    fn school_used_count(&self, school_id: &str) -> Result<i64>;

    // User (license subject) operations
    fn upsert_user(&self, user: &User) -> Result<()>;
    fn get_user_by_email(&self, school_id: &str, email: &str) -> Result<Option<User>>;
    fn list_school_users(&self, school_id: &str) -> Result<Vec<User>>;

    // License ledger operations
    fn assign_license(
        &self,
        school_id: &str,
        user_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<()>;
    fn revoke_license(
        &self,
        school_id: &str,
        user_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<()>;
    fn transfer_license(
        &self,
        school_id: &str,
        from_email: &str,
        to_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<()>;
    fn set_school_limit(
        &self,
        school_id: &str,
        new_limit: i64,
        reason: &str,
        actor: &str,
    ) -> Result<()>;
    /// Applies the limit to every school; returns the number of schools
    /// updated. One audit row per affected school.
    fn set_all_school_limits(&self, new_limit: i64, reason: &str, actor: &str) -> Result<usize>;
    fn record_reload(&self, actor: &str) -> Result<()>;

    // Audit log reader
    fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>>;

    // Credential operations
    fn create_credential(&self, cred: &Credential) -> Result<()>;
    fn get_credential(&self, username: &str) -> Result<Option<Credential>>;
    fn list_credentials(&self) -> Result<Vec<Credential>>;
    fn update_credential_password(&self, username: &str, password_hash: &str) -> Result<()>;
    fn update_credential_role(&self, username: &str, role: Role) -> Result<()>;
    fn has_admin_credential(&self) -> Result<bool>;
}
