use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::json;

use super::schema::SCHEMA;
use super::{AuditFilter, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn school_from_row(row: &Row) -> rusqlite::Result<School> {
    Ok(School {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        state: row.get(3)?,
        region: row.get(4)?,
        cluster: row.get(5)?,
        carteira_saf: row.get(6)?,
        license_limit: row.get(7)?,
        status: row.get(8)?,
        contact_email: row.get(9)?,
        contact_phone: row.get(10)?,
        address: row.get(11)?,
        neighborhood: row.get(12)?,
    })
}

const SCHOOL_COLUMNS: &str = "id, name, city, state, region, cluster, carteira_saf, license_limit, \
     status, contact_email, contact_phone, address, neighborhood";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        school_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        has_canva: row.get(4)?,
        is_compliant: row.get(5)?,
    })
}

fn get_user_tx(conn: &Connection, school_id: &str, email: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, school_id, email, name, has_canva, is_compliant
         FROM users WHERE school_id = ?1 AND lower(email) = lower(?2)",
        params![school_id, email],
        user_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn used_count_tx(conn: &Connection, school_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE school_id = ?1 AND has_canva = 1",
        params![school_id],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

fn insert_audit(
    conn: &Connection,
    action: &str,
    school_id: Option<&str>,
    actor: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_logs (action, school_id, actor, payload, ts)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            action,
            school_id,
            actor,
            payload.to_string(),
            format_datetime(&Utc::now()),
        ],
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // School operations

    fn upsert_school(&self, school: &School) -> Result<()> {
        // license_limit is left alone on update so re-imports never clobber
        // an operator-tuned limit.
        self.conn().execute(
            "INSERT INTO schools (id, name, city, state, region, cluster, carteira_saf,
                                  license_limit, status, contact_email, contact_phone,
                                  address, neighborhood)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 city = excluded.city,
                 state = excluded.state,
                 region = excluded.region,
                 cluster = excluded.cluster,
                 carteira_saf = excluded.carteira_saf,
                 status = excluded.status,
                 contact_email = excluded.contact_email,
                 contact_phone = excluded.contact_phone,
                 address = excluded.address,
                 neighborhood = excluded.neighborhood",
            params![
                school.id,
                school.name,
                school.city,
                school.state,
                school.region,
                school.cluster,
                school.carteira_saf,
                school.license_limit,
                school.status,
                school.contact_email,
                school.contact_phone,
                school.address,
                school.neighborhood,
            ],
        )?;
        Ok(())
    }

    fn get_school(&self, id: &str) -> Result<Option<School>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = ?1"),
            params![id],
            school_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_schools(&self) -> Result<Vec<School>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {SCHOOL_COLUMNS} FROM schools ORDER BY name"))?;
        let rows = stmt.query_map([], school_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_license_usage(&self) -> Result<HashMap<String, i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT school_id, COUNT(*) FROM users WHERE has_canva = 1 GROUP BY school_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(Error::from)
    }

    fn school_used_count(&self, school_id: &str) -> Result<i64> {
        used_count_tx(&self.conn(), school_id)
    }

    // User operations

    fn upsert_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM users WHERE lower(email) = lower(?1)",
                params![user.email],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE users SET school_id = ?1, email = ?2, name = ?3,
                            has_canva = ?4, is_compliant = ?5
                     WHERE id = ?6",
                    params![
                        user.school_id,
                        user.email,
                        user.name,
                        user.has_canva,
                        user.is_compliant,
                        id,
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO users (id, school_id, email, name, has_canva, is_compliant)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user.id,
                        user.school_id,
                        user.email,
                        user.name,
                        user.has_canva,
                        user.is_compliant,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_user_by_email(&self, school_id: &str, email: &str) -> Result<Option<User>> {
        get_user_tx(&self.conn(), school_id, email)
    }

    fn list_school_users(&self, school_id: &str) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, school_id, email, name, has_canva, is_compliant
             FROM users WHERE school_id = ?1 ORDER BY name, email",
        )?;
        let rows = stmt.query_map(params![school_id], user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // License ledger operations

    fn assign_license(
        &self,
        school_id: &str,
        user_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let limit: i64 = tx
            .query_row(
                "SELECT license_limit FROM schools WHERE id = ?1",
                params![school_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound("Escola não encontrada".into()))?;

        let user = get_user_tx(&tx, school_id, user_email)?
            .ok_or_else(|| Error::NotFound("Usuário não encontrado na escola".into()))?;

        if user.has_canva {
            return Err(Error::Conflict("Usuário já possui licença Canva".into()));
        }
        if !user.is_compliant {
            return Err(Error::Conflict(
                "Email do usuário não pertence a domínio autorizado".into(),
            ));
        }

        let used = used_count_tx(&tx, school_id)?;
        if used >= limit {
            return Err(Error::Conflict(
                "Limite de licenças atingido para a escola".into(),
            ));
        }

        tx.execute(
            "UPDATE users SET has_canva = 1 WHERE id = ?1",
            params![user.id],
        )?;
        insert_audit(
            &tx,
            "assign",
            Some(school_id),
            actor,
            &json!({ "user_email": user_email, "motivo": reason, "ticket": ticket }),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn revoke_license(
        &self,
        school_id: &str,
        user_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let user = get_user_tx(&tx, school_id, user_email)?
            .ok_or_else(|| Error::NotFound("Usuário não encontrado na escola".into()))?;

        if !user.has_canva {
            return Err(Error::Conflict("Usuário não possui licença Canva".into()));
        }

        tx.execute(
            "UPDATE users SET has_canva = 0 WHERE id = ?1",
            params![user.id],
        )?;
        insert_audit(
            &tx,
            "revoke",
            Some(school_id),
            actor,
            &json!({ "user_email": user_email, "motivo": reason, "ticket": ticket }),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn transfer_license(
        &self,
        school_id: &str,
        from_email: &str,
        to_email: &str,
        reason: &str,
        ticket: &str,
        actor: &str,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let from_user = get_user_tx(&tx, school_id, from_email)?
            .ok_or_else(|| Error::NotFound("Usuário de origem não encontrado na escola".into()))?;
        let to_user = get_user_tx(&tx, school_id, to_email)?
            .ok_or_else(|| Error::NotFound("Usuário de destino não encontrado na escola".into()))?;

        if !from_user.has_canva {
            return Err(Error::Conflict(
                "Usuário de origem não possui licença Canva".into(),
            ));
        }
        if to_user.has_canva {
            return Err(Error::Conflict(
                "Usuário de destino já possui licença Canva".into(),
            ));
        }
        if !to_user.is_compliant {
            return Err(Error::Conflict(
                "Email do usuário de destino não é de domínio autorizado".into(),
            ));
        }

        tx.execute(
            "UPDATE users SET has_canva = 0 WHERE id = ?1",
            params![from_user.id],
        )?;
        tx.execute(
            "UPDATE users SET has_canva = 1 WHERE id = ?1",
            params![to_user.id],
        )?;
        insert_audit(
            &tx,
            "transfer",
            Some(school_id),
            actor,
            &json!({
                "from_email": from_email,
                "to_email": to_email,
                "motivo": reason,
                "ticket": ticket,
            }),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn set_school_limit(
        &self,
        school_id: &str,
        new_limit: i64,
        reason: &str,
        actor: &str,
    ) -> Result<()> {
        if new_limit < 0 {
            return Err(Error::BadRequest(
                "Limite deve ser maior ou igual a zero".into(),
            ));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let old_limit: i64 = tx
            .query_row(
                "SELECT license_limit FROM schools WHERE id = ?1",
                params![school_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound("Escola não encontrada".into()))?;

        tx.execute(
            "UPDATE schools SET license_limit = ?1 WHERE id = ?2",
            params![new_limit, school_id],
        )?;
        tx.execute(
            "INSERT INTO school_limits (school_id, limit_value, updated_at) VALUES (?1, ?2, ?3)",
            params![school_id, new_limit, format_datetime(&Utc::now())],
        )?;
        insert_audit(
            &tx,
            "alter_limit",
            Some(school_id),
            actor,
            &json!({ "old_limit": old_limit, "new_limit": new_limit, "motivo": reason }),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn set_all_school_limits(&self, new_limit: i64, reason: &str, actor: &str) -> Result<usize> {
        if new_limit < 0 {
            return Err(Error::BadRequest(
                "Limite deve ser maior ou igual a zero".into(),
            ));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let old_limits: Vec<(String, i64)> = {
            let mut stmt = tx.prepare("SELECT id, license_limit FROM schools")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let now = format_datetime(&Utc::now());
        for (school_id, old_limit) in &old_limits {
            tx.execute(
                "UPDATE schools SET license_limit = ?1 WHERE id = ?2",
                params![new_limit, school_id],
            )?;
            tx.execute(
                "INSERT INTO school_limits (school_id, limit_value, updated_at) VALUES (?1, ?2, ?3)",
                params![school_id, new_limit, now],
            )?;
            insert_audit(
                &tx,
                "alter_limit",
                Some(school_id),
                actor,
                &json!({ "old_limit": old_limit, "new_limit": new_limit, "motivo": reason }),
            )?;
        }

        tx.commit()?;
        Ok(old_limits.len())
    }

    fn record_reload(&self, actor: &str) -> Result<()> {
        insert_audit(&self.conn(), "reload_data", None, actor, &json!({}))
    }

    // Audit log reader

    fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let mut sql = String::from(
            "SELECT a.id, a.action, a.school_id, s.name, a.actor, a.payload, a.ts
             FROM audit_logs a LEFT JOIN schools s ON s.id = a.school_id",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(start) = &filter.start {
            clauses.push("a.ts >= ?");
            args.push(Box::new(format_datetime(start)));
        }
        if let Some(end) = &filter.end {
            clauses.push("a.ts <= ?");
            args.push(Box::new(format_datetime(end)));
        }
        if let Some(school_id) = &filter.school_id {
            clauses.push("a.school_id = ?");
            args.push(Box::new(school_id.clone()));
        }
        if let Some(action) = &filter.action {
            clauses.push("a.action = ?");
            args.push(Box::new(action.clone()));
        }
        if let Some(actor) = &filter.actor {
            clauses.push("lower(a.actor) LIKE '%' || lower(?) || '%'");
            args.push(Box::new(actor.clone()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY a.ts DESC, a.id DESC");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            let payload: String = row.get(5)?;
            let ts: String = row.get(6)?;
            Ok(AuditRecord {
                id: row.get(0)?,
                action: row.get(1)?,
                school_id: row.get(2)?,
                school_name: row.get(3)?,
                actor: row.get(4)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                ts: parse_datetime(&ts),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Credential operations

    fn create_credential(&self, cred: &Credential) -> Result<()> {
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO credentials (username, name, role, password_hash, created_at, updated_at)
             VALUES (lower(?1), ?2, ?3, ?4, ?5, ?6)",
            params![
                cred.username,
                cred.name,
                cred.role.as_str(),
                cred.password_hash,
                format_datetime(&cred.created_at),
                format_datetime(&cred.updated_at),
            ],
        )?;

        if rows == 0 {
            return Err(Error::AlreadyExists("Usuário já existe".into()));
        }
        Ok(())
    }

    fn get_credential(&self, username: &str) -> Result<Option<Credential>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT username, name, role, password_hash, created_at, updated_at
                 FROM credentials WHERE username = lower(?1)",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(credential_from_parts).transpose()
    }

    fn list_credentials(&self) -> Result<Vec<Credential>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT username, name, role, password_hash, created_at, updated_at
             FROM credentials ORDER BY username",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut creds = Vec::new();
        for row in rows {
            creds.push(credential_from_parts(row?)?);
        }
        Ok(creds)
    }

    fn update_credential_password(&self, username: &str, password_hash: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE credentials SET password_hash = ?1, updated_at = ?2 WHERE username = lower(?3)",
            params![password_hash, format_datetime(&Utc::now()), username],
        )?;

        if rows == 0 {
            return Err(Error::NotFound("Usuário não encontrado".into()));
        }
        Ok(())
    }

    fn update_credential_role(&self, username: &str, role: Role) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE credentials SET role = ?1, updated_at = ?2 WHERE username = lower(?3)",
            params![role.as_str(), format_datetime(&Utc::now()), username],
        )?;

        if rows == 0 {
            return Err(Error::NotFound("Usuário não encontrado".into()));
        }
        Ok(())
    }

    fn has_admin_credential(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM credentials WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

fn credential_from_parts(
    (username, name, role, password_hash, created_at, updated_at): (
        String,
        String,
        String,
        String,
        String,
        String,
    ),
) -> Result<Credential> {
    let role =
        Role::parse(&role).ok_or_else(|| Error::Config(format!("invalid role in database: {role}")))?;
    Ok(Credential {
        username,
        name,
        role,
        password_hash,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}
