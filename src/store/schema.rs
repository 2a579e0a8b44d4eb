pub const SCHEMA: &str = r#"
-- Schools own license limits and users
CREATE TABLE IF NOT EXISTS schools (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT DEFAULT '',
    state TEXT DEFAULT '',
    region TEXT DEFAULT '',
    cluster TEXT DEFAULT '',
    carteira_saf TEXT DEFAULT '',

    -- Authoritative current limit; history lives in school_limits
    license_limit INTEGER NOT NULL DEFAULT 2 CHECK (license_limit >= 0),

    status TEXT DEFAULT '',
    contact_email TEXT DEFAULT '',
    contact_phone TEXT DEFAULT '',
    address TEXT DEFAULT '',
    neighborhood TEXT DEFAULT ''
);

-- License subjects; a user belongs to exactly one school for the lifetime
-- of the record
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    school_id TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    email TEXT NOT NULL,
    name TEXT DEFAULT '',
    has_canva INTEGER NOT NULL DEFAULT 0,
    is_compliant INTEGER NOT NULL DEFAULT 1
);

-- History of limit changes, append-only
CREATE TABLE IF NOT EXISTS school_limits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    limit_value INTEGER NOT NULL DEFAULT 0 CHECK (limit_value >= 0),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Append-only audit trail; one row per state-changing action
CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,              -- assign|revoke|transfer|alter_limit|reload_data
    school_id TEXT REFERENCES schools(id) ON DELETE SET NULL,
    actor TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',  -- action-specific JSON details
    ts TEXT NOT NULL
);

-- Staff logins; role is one of the canonical role names
CREATE TABLE IF NOT EXISTS credentials (
    username TEXT PRIMARY KEY,           -- stored lowercased
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    password_hash TEXT NOT NULL,         -- argon2id hash with embedded salt
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS uq_users_email_lower ON users(lower(email));
CREATE INDEX IF NOT EXISTS idx_users_school ON users(school_id);
CREATE INDEX IF NOT EXISTS idx_users_has_canva ON users(has_canva);
CREATE INDEX IF NOT EXISTS idx_school_limits_school ON school_limits(school_id);
CREATE INDEX IF NOT EXISTS idx_audit_logs_school_ts ON audit_logs(school_id, ts DESC);
"#;
