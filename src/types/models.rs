use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Email domains authorized to hold a Canva license.
pub const ALLOWED_EMAIL_DOMAINS: &[&str] = &[
    "maplebear.com.br",
    "mbcentral.com.br",
    "seb.com.br",
    "sebsa.com.br",
];

/// Default per-school license limit for newly imported schools.
pub const DEFAULT_LICENSE_LIMIT: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    pub region: String,
    pub cluster: String,
    pub carteira_saf: String,
    pub license_limit: i64,
    pub status: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
    pub neighborhood: String,
}

/// A license subject: one person at one school. The school binding is fixed
/// for the lifetime of the record; transfers move the flag, not the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub school_id: String,
    pub email: String,
    pub name: String,
    pub has_canva: bool,
    pub is_compliant: bool,
}

/// One row of the append-only audit log, joined with the school name for
/// display. Never updated or deleted after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub action: String,
    pub school_id: Option<String>,
    pub school_name: Option<String>,
    pub actor: String,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

/// A staff login record. The password hash is an argon2id PHC string with
/// the salt embedded; it is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub name: String,
    pub role: Role,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns true if the email's domain is on the organizational allow-list.
/// Subdomains of an allowed domain count (school emails are subdomains of
/// the franchise domain).
#[must_use]
pub fn is_compliant_email(email: &str) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let domain = domain.trim().to_lowercase();
    ALLOWED_EMAIL_DOMAINS
        .iter()
        .any(|allowed| domain == *allowed || domain.ends_with(&format!(".{allowed}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliant_email_exact_domain() {
        assert!(is_compliant_email("ana.paula@mbcentral.com.br"));
        assert!(is_compliant_email("JOAO@SEB.COM.BR"));
    }

    #[test]
    fn test_compliant_email_school_subdomain() {
        assert!(is_compliant_email("clarice@arcoverde.maplebear.com.br"));
    }

    #[test]
    fn test_non_compliant_email() {
        assert!(!is_compliant_email("admin@escola.com"));
        assert!(!is_compliant_email("no-at-sign"));
        assert!(!is_compliant_email("evil@maplebear.com.br.attacker.com"));
    }
}
