//! SQLite-backed lead store

use crate::allocator::{allocate_in, current_in};
use crate::chain::{ChainReport, LinkInput};
use crate::error::{RepositoryError, Result};
use crate::pool::{in_transaction, open_pool, with_connection, DatabaseConfig, SqlitePool};
use crate::repository::{LeadFilter, LeadRepository, LeadStats, ReferenceAllocator};
use crate::rows::{
    activity_from_row, lead_from_row, truncate_micros, ts, ACTIVITY_COLUMNS, LEAD_COLUMNS,
};
use async_trait::async_trait;
use bridge_model::{
    validate_transition, ActivityRecord, Actor, CategoryPrefix, Lead, LeadId, LeadStatus, NewLead,
    ReferenceNumber,
};
use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params_from_iter, Connection, OptionalExtension, TransactionBehavior};

/// Rows returned by [`LeadRepository::list`] when no limit is given
pub const DEFAULT_LIST_LIMIT: u32 = 100;
/// Upper bound on a single listing page
pub const MAX_LIST_LIMIT: u32 = 1_000;

/// Lead repository and reference allocator over one SQLite file.
///
/// Cloning shares the pool. Several stores (or processes) may open the same
/// file; every write runs in an `IMMEDIATE` transaction so counters and
/// status changes serialize on the database lock.
#[derive(Clone)]
pub struct SqliteLeadStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteLeadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLeadStore")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl SqliteLeadStore {
    /// Open (and migrate) the database described by `config`
    ///
    /// # Errors
    /// Returns `Unavailable` or `Migration` if the database cannot be prepared
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::from_pool(open_pool(config)?))
    }

    #[inline]
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        with_connection(&self.pool, move |conn| {
            in_transaction(conn, TransactionBehavior::Immediate, |tx| f(tx))
        })
        .await
    }

    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        with_connection(&self.pool, move |conn| f(conn)).await
    }
}

fn load_lead(conn: &Connection, id: &str) -> Result<Option<Lead>> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))?;
    let mut rows = stmt.query([id])?;
    rows.next()?.map(lead_from_row).transpose()
}

fn require_lead(conn: &Connection, id: LeadId) -> Result<Lead> {
    load_lead(conn, &id.to_string())?.ok_or(RepositoryError::NotFound(id))
}

fn insert_lead(conn: &Connection, lead: &Lead) -> Result<()> {
    let category = serde_json::to_string(&lead.category)?;
    let form = serde_json::to_string(&lead.form_data)?;
    conn.prepare_cached(
        "INSERT INTO leads (id, reference_number, category_id, category, form_data,
             customer_name, customer_email, customer_phone, source, referral_code,
             created_by_id, created_by_role, status, document_ref, document_attempts,
             created_at, updated_at, converted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, 0, ?14, ?15, NULL)",
    )?
    .execute(rusqlite::params![
        lead.id.to_string(),
        lead.reference_number.to_string(),
        lead.category.id,
        category,
        form,
        lead.quick.customer_name,
        lead.quick.customer_email,
        lead.quick.customer_phone,
        lead.source.as_str(),
        lead.referral_code,
        lead.created_by.id,
        lead.created_by.role.as_str(),
        lead.status.as_str(),
        ts(lead.created_at),
        ts(lead.updated_at),
    ])?;
    Ok(())
}

/// Append `activity` to its lead's chain, assigning `seq` and hashes
fn append_in(conn: &Connection, mut activity: ActivityRecord) -> Result<ActivityRecord> {
    let lead_id = activity.lead_id.to_string();
    let tail: Option<(i64, String)> = conn
        .prepare_cached(
            "SELECT seq, hash FROM lead_activities WHERE lead_id = ?1 ORDER BY seq DESC LIMIT 1",
        )?
        .query_row([&lead_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    let (seq, prev_hash) = match tail {
        Some((seq, hash)) => (seq + 1, Some(hash)),
        None => (1, None),
    };

    activity.created_at = truncate_micros(activity.created_at);
    let created_at = ts(activity.created_at);
    let metadata = serde_json::to_string(&activity.metadata)?;
    let hash = LinkInput {
        prev_hash: prev_hash.as_deref(),
        lead_id: &lead_id,
        seq,
        kind: activity.kind.as_str(),
        actor_id: &activity.actor.id,
        actor_role: activity.actor.role.as_str(),
        description: &activity.description,
        metadata: &metadata,
        created_at: &created_at,
    }
    .hash();

    conn.prepare_cached(&format!(
        "INSERT INTO lead_activities ({ACTIVITY_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    ))?
    .execute(rusqlite::params![
        lead_id,
        seq,
        activity.kind.as_str(),
        activity.actor.id,
        activity.actor.role.as_str(),
        activity.description,
        metadata,
        created_at,
        prev_hash,
        hash,
    ])?;

    activity.seq = seq;
    activity.prev_hash = prev_hash;
    activity.hash = Some(hash);
    Ok(activity)
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn collect_leads(conn: &Connection, sql: &str, args: &[String]) -> Result<Vec<Lead>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    let mut leads = Vec::new();
    while let Some(row) = rows.next()? {
        leads.push(lead_from_row(row)?);
    }
    Ok(leads)
}

#[async_trait]
impl ReferenceAllocator for SqliteLeadStore {
    async fn allocate(&self, prefix: CategoryPrefix, year: i32) -> Result<ReferenceNumber> {
        self.write(move |tx| allocate_in(tx, prefix, year)).await
    }

    async fn current(&self, prefix: CategoryPrefix, year: i32) -> Result<Option<u64>> {
        self.read(move |conn| current_in(conn, prefix, year)).await
    }
}

#[async_trait]
impl LeadRepository for SqliteLeadStore {
    async fn create_with_reference(&self, new: NewLead) -> Result<(Lead, ActivityRecord)> {
        let (lead, created) = self
            .write(move |tx| {
                let created_at = truncate_micros(new.created_at);
                let reference = allocate_in(tx, new.category.prefix, created_at.year())?;
                let lead = new.with_created_at(created_at).into_lead(reference);
                insert_lead(tx, &lead)?;

                let mut created = ActivityRecord::created(
                    lead.id,
                    lead.created_by.clone(),
                    &reference.to_string(),
                    lead.status,
                );
                created.created_at = created_at;
                let created = append_in(tx, created)?;
                Ok((lead, created))
            })
            .await?;
        tracing::info!(
            lead_id = %lead.id,
            reference = %lead.reference_number,
            status = %lead.status,
            "lead created"
        );
        Ok((lead, created))
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>> {
        self.read(move |conn| load_lead(conn, &id.to_string())).await
    }

    async fn get_by_reference(&self, reference: &ReferenceNumber) -> Result<Option<Lead>> {
        let reference = reference.to_string();
        self.read(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads WHERE reference_number = ?1"
            ))?;
            let mut rows = stmt.query([&reference])?;
            rows.next()?.map(lead_from_row).transpose()
        })
        .await
    }

    async fn transition_status(
        &self,
        id: LeadId,
        to: LeadStatus,
        actor: Actor,
        note: Option<String>,
    ) -> Result<(Lead, ActivityRecord)> {
        self.write(move |tx| {
            let mut lead = require_lead(tx, id)?;
            let from = lead.status;
            validate_transition(from, to)?;

            let now = truncate_micros(Utc::now());
            if to == LeadStatus::Converted {
                lead.converted_at = Some(now);
            }
            let changed = tx
                .prepare_cached(
                    "UPDATE leads SET status = ?1, updated_at = ?2, converted_at = ?3
                     WHERE id = ?4 AND status = ?5",
                )?
                .execute(rusqlite::params![
                    to.as_str(),
                    ts(now),
                    lead.converted_at.map(ts),
                    id.to_string(),
                    from.as_str(),
                ])?;
            if changed == 0 {
                let actual = require_lead(tx, id)?.status;
                return Err(RepositoryError::StatusConflict {
                    id,
                    expected: from,
                    actual,
                });
            }
            lead.status = to;
            lead.updated_at = now;

            let mut activity = ActivityRecord::status_change(id, actor, from, to, note.as_deref());
            activity.created_at = now;
            let activity = append_in(tx, activity)?;
            tracing::info!(lead_id = %id, %from, %to, "lead status changed");
            Ok((lead, activity))
        })
        .await
    }

    async fn set_document_ref(
        &self,
        id: LeadId,
        location: String,
        activity: ActivityRecord,
    ) -> Result<Lead> {
        self.write(move |tx| {
            let changed = tx
                .prepare_cached(
                    "UPDATE leads SET document_ref = ?1, document_attempts = 0,
                         next_document_attempt_at = NULL, updated_at = ?2
                     WHERE id = ?3",
                )?
                .execute((&location, ts(Utc::now()), id.to_string()))?;
            if changed == 0 {
                return Err(RepositoryError::NotFound(id));
            }
            append_in(tx, activity)?;
            require_lead(tx, id)
        })
        .await
    }

    async fn record_document_failure(
        &self,
        id: LeadId,
        activity: ActivityRecord,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<Lead> {
        self.write(move |tx| {
            let changed = tx
                .prepare_cached(
                    "UPDATE leads SET document_attempts = document_attempts + 1,
                         next_document_attempt_at = ?1, updated_at = ?2
                     WHERE id = ?3",
                )?
                .execute((next_attempt_at.map(ts), ts(Utc::now()), id.to_string()))?;
            if changed == 0 {
                return Err(RepositoryError::NotFound(id));
            }
            append_in(tx, activity)?;
            require_lead(tx, id)
        })
        .await
    }

    async fn append_activity(&self, activity: ActivityRecord) -> Result<ActivityRecord> {
        self.write(move |tx| {
            require_lead(tx, activity.lead_id)?;
            append_in(tx, activity)
        })
        .await
    }

    async fn activities(&self, id: LeadId) -> Result<Vec<ActivityRecord>> {
        self.read(move |conn| {
            require_lead(conn, id)?;
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM lead_activities WHERE lead_id = ?1 ORDER BY seq"
            ))?;
            let mut rows = stmt.query([id.to_string()])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(activity_from_row(row)?.record);
            }
            Ok(out)
        })
        .await
    }

    async fn verify_activity_chain(&self, id: LeadId) -> Result<ChainReport> {
        self.read(move |conn| {
            require_lead(conn, id)?;
            let lead_id = id.to_string();
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM lead_activities WHERE lead_id = ?1 ORDER BY seq"
            ))?;
            let mut rows = stmt.query([&lead_id])?;

            let mut entries = 0usize;
            let mut prev: Option<String> = None;
            while let Some(row) = rows.next()? {
                let entry = activity_from_row(row)?;
                let record = &entry.record;
                entries += 1;

                let expected_seq = i64::try_from(entries).unwrap_or(i64::MAX);
                let recomputed = LinkInput {
                    prev_hash: record.prev_hash.as_deref(),
                    lead_id: &lead_id,
                    seq: record.seq,
                    kind: record.kind.as_str(),
                    actor_id: &record.actor.id,
                    actor_role: record.actor.role.as_str(),
                    description: &record.description,
                    metadata: &entry.raw_metadata,
                    created_at: &entry.raw_created_at,
                }
                .hash();

                let intact = record.seq == expected_seq
                    && record.prev_hash == prev
                    && record.hash.as_deref() == Some(recomputed.as_str());
                if !intact {
                    tracing::warn!(lead_id = %id, seq = record.seq, "activity chain broken");
                    return Ok(ChainReport {
                        entries,
                        broken_at: Some(record.seq),
                    });
                }
                prev.clone_from(&record.hash);
            }
            Ok(ChainReport {
                entries,
                broken_at: None,
            })
        })
        .await
    }

    async fn list(&self, filter: LeadFilter) -> Result<Vec<Lead>> {
        self.read(move |conn| {
            let mut clauses = Vec::new();
            let mut args = Vec::new();
            if let Some(status) = filter.status {
                args.push(status.as_str().to_string());
                clauses.push(format!("status = ?{}", args.len()));
            }
            if let Some(category) = filter.category_id {
                args.push(category);
                clauses.push(format!("category_id = ?{}", args.len()));
            }
            if let Some(actor) = filter.created_by {
                args.push(actor);
                clauses.push(format!("created_by_id = ?{}", args.len()));
            }
            let predicate = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };
            let sql = format!(
                "SELECT {LEAD_COLUMNS} FROM leads {predicate}
                 ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
                clamp_limit(filter.limit),
                filter.offset.unwrap_or(0),
            );
            collect_leads(conn, &sql, &args)
        })
        .await
    }

    async fn stats(&self, created_by: Option<String>) -> Result<LeadStats> {
        self.read(move |conn| {
            let (sql, args) = match created_by {
                Some(actor) => (
                    "SELECT status, COUNT(*), SUM(document_ref IS NOT NULL) FROM leads
                     WHERE created_by_id = ?1 GROUP BY status",
                    vec![actor],
                ),
                None => (
                    "SELECT status, COUNT(*), SUM(document_ref IS NOT NULL) FROM leads
                     GROUP BY status",
                    Vec::new(),
                ),
            };
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params_from_iter(args.iter()))?;
            let mut stats = LeadStats::default();
            for status in LeadStatus::ALL {
                stats.by_status.insert(status.as_str().to_string(), 0);
            }
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let count = u64::try_from(row.get::<_, i64>(1)?).unwrap_or(0);
                let with_document = u64::try_from(row.get::<_, i64>(2)?).unwrap_or(0);
                stats.total += count;
                stats.with_document += with_document;
                stats.by_status.insert(status, count);
            }
            Ok(stats)
        })
        .await
    }

    async fn leads_missing_document(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<Lead>> {
        self.read(move |conn| {
            let sql = format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE document_ref IS NULL
                   AND status NOT IN ('draft', 'rejected')
                   AND document_attempts < {max_attempts}
                   AND (next_document_attempt_at IS NULL OR next_document_attempt_at <= ?1)
                 ORDER BY created_at LIMIT {}",
                clamp_limit(Some(limit)),
            );
            collect_leads(conn, &sql, &[ts(now)])
        })
        .await
    }
}
