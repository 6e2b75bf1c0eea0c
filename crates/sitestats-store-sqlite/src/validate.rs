//! Insert-time validation of staged `records` rows.
//!
//! Runs inside the write transaction after the candidate row has been
//! inserted, so the singleton check counts the candidate itself: exactly one
//! row of the (site, kind) pair must survive. Returning an error drops the
//! transaction and rolls everything back.

use rusqlite::{Connection, OptionalExtension as _};
use sitestats_core::{Error as CoreError, kind::RecordKind};

use crate::error::domain;

/// Validate the staged row `record_id` and return its decoded kind.
pub fn validate_staged(
  conn: &Connection,
  record_id: &str,
) -> Result<RecordKind, tokio_rusqlite::Error> {
  let staged: Option<(i64, i16, Option<String>)> = conn
    .query_row(
      "SELECT site_id, kind_code, date FROM records WHERE record_id = ?1",
      rusqlite::params![record_id],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .optional()?;

  let Some((site_id, kind_code, date)) = staged else {
    return Err(rusqlite::Error::QueryReturnedNoRows.into());
  };

  let kind = RecordKind::from_code(kind_code).map_err(domain)?;

  if kind.requires_date() {
    if date.is_none() {
      return Err(domain(CoreError::MissingDate(kind)));
    }
  } else {
    let existing: i64 = conn.query_row(
      "SELECT COUNT(*) FROM records WHERE site_id = ?1 AND kind_code = ?2",
      rusqlite::params![site_id, kind_code],
      |r| r.get(0),
    )?;
    if existing != 1 {
      return Err(domain(CoreError::SingleEntryViolation(kind)));
    }
  }

  Ok(kind)
}
