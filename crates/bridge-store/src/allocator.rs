//! Reference counter statements

use crate::error::{RepositoryError, Result};
use bridge_model::{CategoryPrefix, ReferenceNumber};
use rusqlite::{Connection, OptionalExtension};

const NEXT_VALUE: &str = "INSERT INTO reference_counters (prefix, year, value) VALUES (?1, ?2, 1)
     ON CONFLICT (prefix, year) DO UPDATE SET value = value + 1
     RETURNING value";

/// Increment and read the `(prefix, year)` counter in one statement.
///
/// Must run inside a write transaction so the number is only visible once
/// the caller commits.
pub(crate) fn allocate_in(
    conn: &Connection,
    prefix: CategoryPrefix,
    year: i32,
) -> Result<ReferenceNumber> {
    let value: i64 = conn
        .prepare_cached(NEXT_VALUE)?
        .query_row((prefix.as_str(), year), |row| row.get(0))?;
    let sequence = u64::try_from(value)
        .map_err(|_| RepositoryError::Corrupt(format!("counter {prefix}-{year} = {value}")))?;
    tracing::debug!(%prefix, year, sequence, "reference allocated");
    Ok(ReferenceNumber::new(prefix, year, sequence))
}

pub(crate) fn current_in(conn: &Connection, prefix: CategoryPrefix, year: i32) -> Result<Option<u64>> {
    let value: Option<i64> = conn
        .prepare_cached("SELECT value FROM reference_counters WHERE prefix = ?1 AND year = ?2")?
        .query_row((prefix.as_str(), year), |row| row.get(0))
        .optional()?;
    Ok(value.and_then(|v| u64::try_from(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::migrate_to_latest;

    fn db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to_latest(&mut conn).unwrap();
        conn
    }

    fn prefix(s: &str) -> CategoryPrefix {
        CategoryPrefix::new(s).unwrap()
    }

    #[test]
    fn counters_start_at_one_per_prefix_and_year() {
        let conn = db();
        assert_eq!(current_in(&conn, prefix("HI"), 2025).unwrap(), None);

        let first = allocate_in(&conn, prefix("HI"), 2025).unwrap();
        let second = allocate_in(&conn, prefix("HI"), 2025).unwrap();
        assert_eq!(first.to_string(), "HI-2025-1");
        assert_eq!(second.to_string(), "HI-2025-2");

        assert_eq!(allocate_in(&conn, prefix("LI"), 2025).unwrap().to_string(), "LI-2025-1");
        assert_eq!(allocate_in(&conn, prefix("HI"), 2026).unwrap().to_string(), "HI-2026-1");
        assert_eq!(current_in(&conn, prefix("HI"), 2025).unwrap(), Some(2));
    }

    #[test]
    fn uncommitted_allocation_leaves_counter_unchanged() {
        let mut conn = db();
        allocate_in(&conn, prefix("CI"), 2025).unwrap();
        {
            let tx = conn.transaction().unwrap();
            assert_eq!(allocate_in(&tx, prefix("CI"), 2025).unwrap().sequence(), 2);
            // dropped without commit
        }
        assert_eq!(current_in(&conn, prefix("CI"), 2025).unwrap(), Some(1));
        assert_eq!(allocate_in(&conn, prefix("CI"), 2025).unwrap().sequence(), 2);
    }
}
