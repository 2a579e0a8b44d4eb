use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::DEFAULT_LICENSE_LIMIT;

/// Derived usage label for a school's license pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Empty,
    Partial,
    Full,
    Excess,
}

impl UsageStatus {
    #[must_use]
    pub fn from_counts(used: i64, limit: i64) -> Self {
        if used == 0 {
            UsageStatus::Empty
        } else if used < limit {
            UsageStatus::Partial
        } else if used == limit {
            UsageStatus::Full
        } else {
            UsageStatus::Excess
        }
    }
}

/// Display badge the dashboard renders next to each school.
#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub tone: &'static str,
    pub text: String,
}

#[must_use]
pub fn badge(used: i64, limit: i64) -> Badge {
    match UsageStatus::from_counts(used, limit) {
        UsageStatus::Empty => Badge {
            tone: "gray",
            text: format!("0/{limit} Licenças"),
        },
        UsageStatus::Partial => Badge {
            tone: "blue",
            text: format!("{used}/{limit} Licenças"),
        },
        UsageStatus::Full => Badge {
            tone: "green",
            text: format!("{used}/{limit} Licenças (Completa)"),
        },
        UsageStatus::Excess => Badge {
            tone: "red",
            text: format!("{used}/{limit} Licenças (Excesso)"),
        },
    }
}

#[derive(Debug, Serialize)]
pub struct Contact {
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct SchoolOverview {
    pub id: String,
    pub name: String,
    pub status: String,
    pub cluster: String,
    pub city: String,
    pub state: String,
    pub region: String,
    pub carteira_saf: String,
    pub used: i64,
    pub limit: i64,
    pub usage_status: UsageStatus,
    pub badge: Badge,
    pub contact: Contact,
}

#[derive(Debug, Serialize)]
pub struct SchoolUserView {
    pub name: String,
    pub email: String,
    pub school_id: String,
    pub school_name: String,
    pub status_licenca: String,
    pub has_canva: bool,
    pub is_compliant: bool,
}

/// Business operations over the license ledger. Preconditions, mutations,
/// and audit inserts run inside the store's transactions; this layer
/// assembles views and success messages for the handlers.
pub struct LicenseService {
    store: Arc<dyn Store>,
}

impl LicenseService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Lists every school with its current used-license count (computed from
    /// the ledger, never cached) and derived usage label.
    pub fn get_overview(&self) -> Result<Vec<SchoolOverview>> {
        let usage = self.store.list_license_usage()?;
        let schools = self.store.list_schools()?;

        Ok(schools
            .into_iter()
            .map(|school| {
                let used = usage.get(&school.id).copied().unwrap_or(0);
                let limit = school.license_limit;
                let address = format!(
                    "{}, {}, {}/{}",
                    school.address, school.neighborhood, school.city, school.state
                );
                SchoolOverview {
                    id: school.id,
                    name: school.name,
                    status: school.status,
                    cluster: school.cluster,
                    city: school.city,
                    state: school.state,
                    region: school.region,
                    carteira_saf: school.carteira_saf,
                    used,
                    limit,
                    usage_status: UsageStatus::from_counts(used, limit),
                    badge: badge(used, limit),
                    contact: Contact {
                        phone: school.contact_phone,
                        email: school.contact_email,
                        address,
                    },
                }
            })
            .collect())
    }

    pub fn get_school_users(&self, school_id: &str) -> Result<Vec<SchoolUserView>> {
        let school = self
            .store
            .get_school(school_id)?
            .ok_or_else(|| Error::NotFound("Escola não encontrada".into()))?;

        let users = self.store.list_school_users(school_id)?;

        Ok(users
            .into_iter()
            .map(|user| SchoolUserView {
                name: user.name,
                email: user.email,
                school_id: school.id.clone(),
                school_name: school.name.clone(),
                status_licenca: if user.has_canva {
                    "Ativa".to_string()
                } else {
                    "Sem licença".to_string()
                },
                has_canva: user.has_canva,
                is_compliant: user.is_compliant,
            })
            .collect())
    }

    pub fn assign(
        &self,
        school_id: &str,
        user_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<String> {
        self.store
            .assign_license(school_id, user_email, reason, ticket, actor)?;
        Ok("Licença atribuída com sucesso".to_string())
    }

    pub fn revoke(
        &self,
        school_id: &str,
        user_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<String> {
        self.store
            .revoke_license(school_id, user_email, reason, ticket, actor)?;
        Ok("Licença revogada com sucesso".to_string())
    }

    pub fn transfer(
        &self,
        school_id: &str,
        from_email: &str,
        to_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<String> {
        self.store
            .transfer_license(school_id, from_email, to_email, reason, ticket, actor)?;
        Ok("Licença transferida com sucesso".to_string())
    }

    pub fn change_school_limit(
        &self,
        school_id: &str,
        new_limit: i64,
        reason: &str,
        actor: &str,
    ) -> Result<String> {
        self.store
            .set_school_limit(school_id, new_limit, reason, actor)?;
        Ok("Limite alterado com sucesso".to_string())
    }

    /// Applies one limit to every school. Returns the number of schools
    /// updated.
    pub fn set_global_limit(&self, new_limit: i64, reason: &str, actor: &str) -> Result<usize> {
        self.store.set_all_school_limits(new_limit, reason, actor)
    }

    /// The "global" limit is the most common per-school limit; schools can
    /// diverge individually.
    pub fn get_global_limit(&self) -> Result<i64> {
        let schools = self.store.list_schools()?;
        if schools.is_empty() {
            return Ok(DEFAULT_LICENSE_LIMIT);
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for school in &schools {
            *counts.entry(school.license_limit).or_insert(0) += 1;
        }

        // Deterministic tie-break: prefer the smaller limit.
        Ok(counts
            .into_iter()
            .max_by_key(|&(limit, count)| (count, std::cmp::Reverse(limit)))
            .map(|(limit, _)| limit)
            .unwrap_or(DEFAULT_LICENSE_LIMIT))
    }

    pub fn record_reload(&self, actor: &str) -> Result<()> {
        self.store.record_reload(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{School, User};

    fn school(id: &str, limit: i64) -> School {
        School {
            id: id.to_string(),
            name: format!("Escola {id}"),
            city: String::new(),
            state: String::new(),
            region: String::new(),
            cluster: String::new(),
            carteira_saf: String::new(),
            license_limit: limit,
            status: "Operando".into(),
            contact_email: String::new(),
            contact_phone: String::new(),
            address: String::new(),
            neighborhood: String::new(),
        }
    }

    fn service_with_schools(limits: &[(&str, i64)]) -> LicenseService {
        let store = SqliteStore::new(":memory:").unwrap();
        store.initialize().unwrap();
        for (id, limit) in limits {
            store.upsert_school(&school(id, *limit)).unwrap();
        }
        LicenseService::new(Arc::new(store))
    }

    #[test]
    fn test_usage_status_labels() {
        assert_eq!(UsageStatus::from_counts(0, 2), UsageStatus::Empty);
        assert_eq!(UsageStatus::from_counts(1, 2), UsageStatus::Partial);
        assert_eq!(UsageStatus::from_counts(2, 2), UsageStatus::Full);
        assert_eq!(UsageStatus::from_counts(3, 2), UsageStatus::Excess);
        // zero-limit school with nobody licensed reads as empty
        assert_eq!(UsageStatus::from_counts(0, 0), UsageStatus::Empty);
    }

    #[test]
    fn test_badge_text() {
        assert_eq!(badge(0, 2).tone, "gray");
        assert_eq!(badge(1, 2).text, "1/2 Licenças");
        assert_eq!(badge(2, 2).text, "2/2 Licenças (Completa)");
        assert_eq!(badge(3, 2).tone, "red");
    }

    #[test]
    fn test_overview_counts_and_labels() {
        let service = service_with_schools(&[("257", 2)]);
        let store = service.store.clone();

        let mut user = User {
            id: "u1".into(),
            school_id: "257".into(),
            email: "a@x.maplebear.com.br".into(),
            name: "A".into(),
            has_canva: false,
            is_compliant: true,
        };
        store.upsert_user(&user).unwrap();
        user.id = "u2".into();
        user.email = "b@x.maplebear.com.br".into();
        store.upsert_user(&user).unwrap();

        store
            .assign_license("257", "a@x.maplebear.com.br", "", "", "t")
            .unwrap();

        let overview = service.get_overview().unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].used, 1);
        assert_eq!(overview[0].limit, 2);
        assert_eq!(overview[0].usage_status, UsageStatus::Partial);
    }

    #[test]
    fn test_school_users_unknown_school() {
        let service = service_with_schools(&[]);
        assert!(matches!(
            service.get_school_users("999"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_global_limit_is_most_common() {
        let service = service_with_schools(&[("1", 2), ("2", 2), ("3", 5)]);
        assert_eq!(service.get_global_limit().unwrap(), 2);

        // no schools yet: fall back to the default
        let empty = service_with_schools(&[]);
        assert_eq!(empty.get_global_limit().unwrap(), DEFAULT_LICENSE_LIMIT);
    }
}
