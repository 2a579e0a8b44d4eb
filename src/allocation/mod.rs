//! Assigns scraped user records to schools by email-domain matching and
//! builds the allocation snapshot served to dashboards.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sentinel bucket for users whose email matches no school domain.
pub const UNALLOCATED_SCHOOL_ID: &str = "0";
pub const UNALLOCATED_SCHOOL_NAME: &str = "Usuários Sem Escola Definida";

const SCHOOL_ID_COL: &str = "ID da Escola";
const SCHOOL_NAME_COL: &str = "Nome da Escola";
const SCHOOL_EMAIL_COL: &str = "E-mail da Escola";

/// One user record as delivered by the external collector. The aliases
/// accept the collector's original field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUser {
    #[serde(alias = "nome")]
    pub name: String,
    pub email: String,
    #[serde(default, alias = "funcao")]
    pub role: String,
}

/// Raw payload from the external collector: collection metadata plus the
/// full user list.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMetrics {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, alias = "periodo_filtro")]
    pub filter_period: Option<String>,
    #[serde(alias = "usuarios")]
    pub users: Vec<RawUser>,
}

#[derive(Debug, Clone)]
pub struct DirectorySchool {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
}

/// Schools reference table with a domain-to-school lookup. Duplicate ids
/// keep the first row; duplicate domains map to the first school seen, so
/// the lookup is unambiguous.
#[derive(Debug)]
pub struct SchoolDirectory {
    schools: Vec<DirectorySchool>,
    domain_map: HashMap<String, usize>,
}

impl SchoolDirectory {
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parses the schools CSV (`;` separated, UTF-8 with optional BOM).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let col = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| Error::Config(format!("schools CSV missing column '{name}'")))
        };
        let id_col = col(SCHOOL_ID_COL)?;
        let name_col = col(SCHOOL_NAME_COL)?;
        let email_col = col(SCHOOL_EMAIL_COL)?;

        let mut schools: Vec<DirectorySchool> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut domain_map: HashMap<String, usize> = HashMap::new();

        for record in rdr.records() {
            let record = record?;
            let id = record.get(id_col).unwrap_or("").trim().to_string();
            if id.is_empty() || id == UNALLOCATED_SCHOOL_ID {
                continue;
            }
            if !seen_ids.insert(id.clone()) {
                continue;
            }

            let name = record.get(name_col).unwrap_or("").trim().to_string();
            let domain = extract_domain(record.get(email_col).unwrap_or(""));

            let index = schools.len();
            if let Some(domain) = &domain {
                domain_map.entry(domain.clone()).or_insert(index);
            }
            schools.push(DirectorySchool { id, name, domain });
        }

        Ok(Self {
            schools,
            domain_map,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    #[must_use]
    pub fn match_domain(&self, domain: &str) -> Option<&DirectorySchool> {
        self.domain_map
            .get(&domain.to_lowercase())
            .map(|&i| &self.schools[i])
    }
}

/// Extracts the lowercased domain from an email address, or passes a bare
/// domain value through unchanged.
fn extract_domain(value: &str) -> Option<String> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    match value.rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => Some(domain.to_string()),
        Some(_) => None,
        None => Some(value),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SchoolAllocation {
    pub school_id: String,
    pub school_name: String,
    pub users: Vec<RawUser>,
    pub total_users: usize,
    /// Currently used licenses from the ledger; filled by the refresh job.
    pub total_licenses: i64,
}

/// The persisted result of one refresh run.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub timestamp: Option<i64>,
    pub filter_period: Option<String>,
    pub schools_allocation: Vec<SchoolAllocation>,
    pub unallocated_users_count: usize,
    pub unallocated_users_list: Vec<RawUser>,
}

/// Single pass over the raw user list: each user lands in the school whose
/// domain exactly matches the email's domain (case-insensitive); everyone
/// else goes into the unallocated bucket. Every directory school appears in
/// the result, licensed or not.
#[must_use]
pub fn allocate(metrics: &RawMetrics, directory: &SchoolDirectory) -> Snapshot {
    let mut allocations: Vec<SchoolAllocation> = directory
        .schools
        .iter()
        .map(|school| SchoolAllocation {
            school_id: school.id.clone(),
            school_name: school.name.clone(),
            users: Vec::new(),
            total_users: 0,
            total_licenses: 0,
        })
        .collect();
    let mut unallocated: Vec<RawUser> = Vec::new();

    for user in &metrics.users {
        let email = user.email.trim().to_lowercase();
        // allocations are in directory order, so the domain map's index
        // applies directly
        let school_index = email
            .rsplit_once('@')
            .and_then(|(_, domain)| directory.domain_map.get(domain).copied());

        match school_index {
            Some(i) => {
                allocations[i].users.push(user.clone());
                allocations[i].total_users += 1;
            }
            None => unallocated.push(user.clone()),
        }
    }

    allocations.push(SchoolAllocation {
        school_id: UNALLOCATED_SCHOOL_ID.to_string(),
        school_name: UNALLOCATED_SCHOOL_NAME.to_string(),
        users: unallocated.clone(),
        total_users: unallocated.len(),
        total_licenses: 0,
    });

    Snapshot {
        generated_at: Utc::now(),
        timestamp: metrics.timestamp,
        filter_period: metrics.filter_period.clone(),
        schools_allocation: allocations,
        unallocated_users_count: unallocated.len(),
        unallocated_users_list: unallocated,
    }
}
