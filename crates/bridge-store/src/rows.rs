//! Row encoding and decoding

use crate::error::{RepositoryError, Result};
use bridge_model::{
    ActivityKind, ActivityRecord, Actor, FormData, Lead, LeadId, LeadSource, LeadStatus,
    ProductCategory, QuickReference, ReferenceNumber,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use std::str::FromStr;

pub(crate) const LEAD_COLUMNS: &str = "id, reference_number, category, form_data, \
    customer_name, customer_email, customer_phone, source, referral_code, \
    created_by_id, created_by_role, status, document_ref, document_attempts, \
    created_at, updated_at, converted_at";

pub(crate) const ACTIVITY_COLUMNS: &str =
    "lead_id, seq, kind, actor_id, actor_role, description, metadata, created_at, prev_hash, hash";

/// Fixed-width UTC timestamp; sorts lexicographically in time order
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

/// Drop sub-microsecond precision so a value survives a store/load cycle unchanged
pub(crate) fn truncate_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    parse_ts(&ts(at)).unwrap_or(at)
}

fn parse<T>(raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| RepositoryError::Corrupt(format!("{raw:?}: {e}")))
}

pub(crate) fn lead_from_row(row: &Row<'_>) -> Result<Lead> {
    let id: String = row.get(0)?;
    let reference: String = row.get(1)?;
    let category: String = row.get(2)?;
    let form: String = row.get(3)?;
    let source: String = row.get(7)?;
    let role: String = row.get(10)?;
    let status: String = row.get(11)?;
    let attempts: i64 = row.get(13)?;
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;
    let converted_at: Option<String> = row.get(16)?;

    Ok(Lead {
        id: parse::<LeadId>(&id)?,
        reference_number: parse::<ReferenceNumber>(&reference)?,
        category: serde_json::from_str::<ProductCategory>(&category)?,
        form_data: serde_json::from_str::<FormData>(&form)?,
        quick: QuickReference {
            customer_name: row.get(4)?,
            customer_email: row.get(5)?,
            customer_phone: row.get(6)?,
        },
        source: parse::<LeadSource>(&source)?,
        referral_code: row.get(8)?,
        created_by: Actor::new(row.get::<_, String>(9)?, parse(&role)?),
        status: parse::<LeadStatus>(&status)?,
        document_ref: row.get(12)?,
        document_attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        converted_at: converted_at.as_deref().map(parse_ts).transpose()?,
    })
}

/// Activity row with the raw text the chain hash was computed over
pub(crate) struct ActivityRow {
    pub(crate) record: ActivityRecord,
    pub(crate) raw_metadata: String,
    pub(crate) raw_created_at: String,
}

pub(crate) fn activity_from_row(row: &Row<'_>) -> Result<ActivityRow> {
    let lead_id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let role: String = row.get(4)?;
    let raw_metadata: String = row.get(6)?;
    let raw_created_at: String = row.get(7)?;

    let record = ActivityRecord {
        seq: row.get(1)?,
        lead_id: parse::<LeadId>(&lead_id)?,
        kind: parse::<ActivityKind>(&kind)?,
        actor: Actor::new(row.get::<_, String>(3)?, parse(&role)?),
        description: row.get(5)?,
        metadata: serde_json::from_str(&raw_metadata)?,
        created_at: parse_ts(&raw_created_at)?,
        prev_hash: row.get(8)?,
        hash: row.get(9)?,
    };
    Ok(ActivityRow {
        record,
        raw_metadata,
        raw_created_at,
    })
}
