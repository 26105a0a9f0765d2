//! Forward-only schema migrations tracked in `PRAGMA user_version`

use crate::error::{RepositoryError, Result};
use rusqlite::{Connection, TransactionBehavior};

/// Schema version this build expects
pub const SCHEMA_VERSION: i32 = 1;

const V1: &str = r"
CREATE TABLE IF NOT EXISTS reference_counters (
    prefix  TEXT    NOT NULL,
    year    INTEGER NOT NULL,
    value   INTEGER NOT NULL CHECK (value > 0),
    PRIMARY KEY (prefix, year)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS leads (
    id                        TEXT PRIMARY KEY,
    reference_number          TEXT NOT NULL UNIQUE,
    category_id               TEXT NOT NULL,
    category                  TEXT NOT NULL,
    form_data                 TEXT NOT NULL,
    customer_name             TEXT,
    customer_email            TEXT,
    customer_phone            TEXT,
    source                    TEXT NOT NULL,
    referral_code             TEXT,
    created_by_id             TEXT NOT NULL,
    created_by_role           TEXT NOT NULL,
    status                    TEXT NOT NULL CHECK (status IN
        ('draft', 'submitted', 'in_progress', 'approved', 'rejected', 'converted')),
    document_ref              TEXT,
    document_attempts         INTEGER NOT NULL DEFAULT 0,
    next_document_attempt_at  TEXT,
    created_at                TEXT NOT NULL,
    updated_at                TEXT NOT NULL,
    converted_at              TEXT
);

CREATE INDEX IF NOT EXISTS leads_status_created ON leads (status, created_at DESC);
CREATE INDEX IF NOT EXISTS leads_category ON leads (category_id, created_at DESC);
CREATE INDEX IF NOT EXISTS leads_created_by ON leads (created_by_id, created_at DESC);
CREATE INDEX IF NOT EXISTS leads_missing_document ON leads (next_document_attempt_at)
    WHERE document_ref IS NULL;

CREATE TRIGGER IF NOT EXISTS leads_reference_immutable
BEFORE UPDATE OF reference_number ON leads
WHEN NEW.reference_number IS NOT OLD.reference_number
BEGIN
    SELECT RAISE(ABORT, 'reference_number is immutable');
END;

CREATE TRIGGER IF NOT EXISTS leads_id_immutable
BEFORE UPDATE OF id ON leads
WHEN NEW.id IS NOT OLD.id
BEGIN
    SELECT RAISE(ABORT, 'lead id is immutable');
END;

CREATE TABLE IF NOT EXISTS lead_activities (
    lead_id      TEXT    NOT NULL REFERENCES leads (id),
    seq          INTEGER NOT NULL,
    kind         TEXT    NOT NULL,
    actor_id     TEXT    NOT NULL,
    actor_role   TEXT    NOT NULL,
    description  TEXT    NOT NULL,
    metadata     TEXT    NOT NULL,
    created_at   TEXT    NOT NULL,
    prev_hash    TEXT,
    hash         TEXT    NOT NULL,
    PRIMARY KEY (lead_id, seq)
) WITHOUT ROWID;

CREATE TRIGGER IF NOT EXISTS lead_activities_no_update
BEFORE UPDATE ON lead_activities
BEGIN
    SELECT RAISE(ABORT, 'lead activities are append-only');
END;

CREATE TRIGGER IF NOT EXISTS lead_activities_no_delete
BEFORE DELETE ON lead_activities
BEGIN
    SELECT RAISE(ABORT, 'lead activities are append-only');
END;
";

fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply pending migrations
///
/// # Errors
/// Returns `Migration` if the database is newer than this build, or the SQL error
pub fn migrate_to_latest(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(RepositoryError::Migration(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    }
    if current == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // another process may have migrated while we waited for the write lock
    let current: i32 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current < 1 {
        tx.execute_batch(V1)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    tracing::info!(from = current, to = SCHEMA_VERSION, "schema migrated");
    Ok(())
}
