//! [`SqliteStore`], the SQLite implementation of [`StatsStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, types::Value};
use sitestats_core::{
  Error as CoreError,
  calendar::Calendar,
  kind::RecordKind,
  query::RecordQuery,
  record::{NewRecord, RecordEntry, StoredValue},
  store::StatsStore,
  value::RecordValue,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawEntry, RawRecord, RawValue, dated_kinds_clause, encode_dt, encode_uuid, query_clause,
    storable_dt,
  },
  error::domain,
  schema::SCHEMA,
  validate::validate_staged,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A stats record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, so their writes are serialized.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  calendar: Calendar,
}

/// What to do with rows already matching the new record's scope.
enum WriteMode {
  /// Plain validated insert.
  Insert,
  /// Delete everything in scope first.
  Replace(RecordQuery),
  /// Return the first entry in scope instead of inserting, if there is one.
  Upsert(RecordQuery),
}

enum WriteOutcome {
  Inserted {
    kind:   RecordKind,
    values: Vec<StoredValue>,
  },
  Located(RawEntry),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, calendar: Calendar::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, calendar: Calendar::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Use `calendar` for day boundaries instead of the system time zone.
  pub fn with_calendar(mut self, calendar: Calendar) -> Self {
    self.calendar = calendar;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The rows a new record of `kind` on `date` would collide with, if that is
  /// computable. Dated kinds without a date have no scope; validation rejects
  /// them anyway.
  fn scope_of(
    &self,
    site_id: i64,
    kind: RecordKind,
    date: Option<DateTime<Utc>>,
  ) -> Option<RecordQuery> {
    if kind.requires_date() && date.is_none() {
      return None;
    }
    Some(RecordQuery::for_kind(kind, site_id, date, &self.calendar))
  }

  /// Stage, attach, validate and commit `record` in a single transaction.
  async fn write(&self, record: NewRecord, mode: WriteMode) -> Result<RecordEntry> {
    // Returned timestamps must equal what a later read decodes.
    let record_id   = record.record_id;
    let site_id     = record.site_id;
    let kind_code   = record.kind_code;
    let date        = record.date.map(storable_dt).transpose()?;
    let recorded_at = storable_dt(Utc::now())?;
    let values      = record.into_values();

    let id_str   = encode_uuid(record_id);
    let date_str = date.map(encode_dt);
    let at_str   = encode_dt(recorded_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        match &mode {
          WriteMode::Insert => {}
          WriteMode::Replace(scope) => {
            let (clause, params) = query_clause(scope);
            let removed = tx.execute(
              &format!("DELETE FROM records WHERE {clause}"),
              rusqlite::params_from_iter(params),
            )?;
            tracing::debug!(removed, "cleared records superseded by replacement");
          }
          WriteMode::Upsert(scope) => {
            let (clause, params) = query_clause(scope);
            if let Some(existing) = select_entries(&tx, clause, params)?.into_iter().next() {
              return Ok(WriteOutcome::Located(existing));
            }
          }
        }

        tx.execute(
          "INSERT INTO records (record_id, site_id, kind_code, date, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, site_id, kind_code, date_str, at_str],
        )?;

        let values = values
          .into_iter()
          .enumerate()
          .map(|(position, value)| {
            insert_value_tree(&tx, &id_str, None, position as i64, value)
          })
          .collect::<Result<Vec<_>, tokio_rusqlite::Error>>()?;

        let kind = validate_staged(&tx, &id_str)?;
        tx.commit()?;

        Ok(WriteOutcome::Inserted { kind, values })
      })
      .await
      .map_err(Error::from)
      .inspect_err(|err| {
        if let Some(rejection) = err.domain() {
          tracing::warn!(site_id, kind_code, error = %rejection, "record rejected");
        }
      })?;

    match outcome {
      WriteOutcome::Located(raw) => raw.into_entry(),
      WriteOutcome::Inserted { kind, values } => {
        tracing::debug!(%record_id, %kind, site_id, values = values.len(), "record committed");
        Ok(RecordEntry { record_id, site_id, kind, date, recorded_at, values })
      }
    }
  }

  async fn delete_where(&self, clause: String, params: Vec<Value>) -> Result<usize> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!("DELETE FROM records WHERE {clause}"),
          rusqlite::params_from_iter(params),
        )?)
      })
      .await?;
    Ok(removed)
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

/// Insert `value` and, recursively, its children. Children are stored as
/// separate rows pointing at their parent, numbered in order from zero.
fn insert_value_tree(
  conn: &Connection,
  record_id: &str,
  parent: Option<&str>,
  position: i64,
  value: RecordValue,
) -> Result<StoredValue, tokio_rusqlite::Error> {
  let (node, children) = value.clone().split_children();
  let value_id = Uuid::new_v4();
  let id_str = encode_uuid(value_id);
  let json = node.to_json().map_err(domain)?.to_string();

  conn.execute(
    "INSERT INTO record_values (
       value_id, record_id, parent_value_id, position, value_type, value_json
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![id_str, record_id, parent, position, node.discriminant(), json],
  )?;

  let children = children
    .into_iter()
    .enumerate()
    .map(|(index, child)| insert_value_tree(conn, record_id, Some(&id_str), index as i64, child))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(StoredValue { value_id, value, children })
}

/// Next free sibling position under `parent` (top level when `None`).
fn next_position(
  conn: &Connection,
  record_id: &str,
  parent: Option<&str>,
) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COALESCE(MAX(position) + 1, 0) FROM record_values
     WHERE record_id = ?1 AND parent_value_id IS ?2",
    rusqlite::params![record_id, parent],
    |r| r.get(0),
  )
}

/// Load matching `records` rows and all of their value rows.
fn select_entries(
  conn: &Connection,
  clause: &str,
  params: Vec<Value>,
) -> rusqlite::Result<Vec<RawEntry>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT record_id, site_id, kind_code, date, recorded_at
     FROM records
     WHERE {clause}
     ORDER BY date, recorded_at, rowid"
  ))?;
  let records = stmt
    .query_map(rusqlite::params_from_iter(params), |row| {
      Ok(RawRecord {
        record_id:   row.get(0)?,
        site_id:     row.get(1)?,
        kind_code:   row.get(2)?,
        date:        row.get(3)?,
        recorded_at: row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut values_stmt = conn.prepare(
    "SELECT value_id, parent_value_id, value_type, value_json
     FROM record_values
     WHERE record_id = ?1
     ORDER BY position, rowid",
  )?;

  records
    .into_iter()
    .map(|record| {
      let values = values_stmt
        .query_map(rusqlite::params![record.record_id], |row| {
          Ok(RawValue {
            value_id:        row.get(0)?,
            parent_value_id: row.get(1)?,
            value_type:      row.get(2)?,
            value_json:      row.get(3)?,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(RawEntry { record, values })
    })
    .collect()
}

// ─── StatsStore impl ─────────────────────────────────────────────────────────

impl StatsStore for SqliteStore {
  type Error = Error;

  fn calendar(&self) -> Calendar { self.calendar }

  // ── Producer ──────────────────────────────────────────────────────────────

  async fn insert_record(&self, record: NewRecord) -> Result<RecordEntry> {
    self.write(record, WriteMode::Insert).await
  }

  async fn replace_record(&self, record: NewRecord) -> Result<RecordEntry> {
    // An unknown kind has no scope to clear; the insert path reports it.
    let mode = match record.kind() {
      Ok(kind) => self
        .scope_of(record.site_id, kind, record.date)
        .map_or(WriteMode::Insert, WriteMode::Replace),
      Err(_) => WriteMode::Insert,
    };
    self.write(record, mode).await
  }

  async fn upsert_record(
    &self,
    site_id: i64,
    kind:    RecordKind,
    date:    Option<DateTime<Utc>>,
  ) -> Result<RecordEntry> {
    let mode = self
      .scope_of(site_id, kind, date)
      .map_or(WriteMode::Insert, WriteMode::Upsert);
    self.write(NewRecord::new(site_id, kind, date), mode).await
  }

  async fn attach_value(&self, record_id: Uuid, value: RecordValue) -> Result<StoredValue> {
    let id_str = encode_uuid(record_id);

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM records WHERE record_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Err(domain(CoreError::NoOwningContext(record_id)));
        }

        let position = next_position(&tx, &id_str, None)?;
        let stored = insert_value_tree(&tx, &id_str, None, position, value)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    tracing::debug!(
      %record_id,
      value_id = %stored.value_id,
      value_type = stored.value.discriminant(),
      "value attached"
    );
    Ok(stored)
  }

  async fn attach_children(
    &self,
    value_id: Uuid,
    children: Vec<RecordValue>,
  ) -> Result<Vec<StoredValue>> {
    let parent_str = encode_uuid(value_id);

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let parent: Option<(String, String, String)> = tx
          .query_row(
            "SELECT record_id, value_type, value_json FROM record_values WHERE value_id = ?1",
            rusqlite::params![parent_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        let Some((record_id, value_type, value_json)) = parent else {
          return Err(domain(CoreError::NoOwningContext(value_id)));
        };

        // Rebuild the parent node to type-check the children against it.
        let json: serde_json::Value = serde_json::from_str(&value_json)
          .map_err(|e| domain(CoreError::Serialization(e)))?;
        let mut node = RecordValue::from_parts(&value_type, json).map_err(domain)?;
        node.push_children(children.clone()).map_err(domain)?;

        let start = next_position(&tx, &record_id, Some(&parent_str))?;
        let stored = children
          .into_iter()
          .enumerate()
          .map(|(offset, child)| {
            insert_value_tree(&tx, &record_id, Some(&parent_str), start + offset as i64, child)
          })
          .collect::<Result<Vec<_>, tokio_rusqlite::Error>>()?;

        tx.commit()?;
        Ok(stored)
      })
      .await?;

    tracing::debug!(%value_id, children = stored.len(), "children attached");
    Ok(stored)
  }

  // ── Consumer ──────────────────────────────────────────────────────────────

  async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RecordEntry>> {
    let (clause, params) = query_clause(query);

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| Ok(select_entries(conn, clause, params)?))
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn get_record(&self, record_id: Uuid) -> Result<Option<RecordEntry>> {
    let params = vec![Value::Text(encode_uuid(record_id))];

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(select_entries(conn, "record_id = ?1", params)?.into_iter().next())
      })
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn delete_record(&self, record_id: Uuid) -> Result<bool> {
    let removed = self
      .delete_where("record_id = ?1".into(), vec![Value::Text(encode_uuid(record_id))])
      .await?;
    Ok(removed > 0)
  }

  async fn clear_kind(&self, site_id: i64, kind: RecordKind) -> Result<usize> {
    let scope = RecordQuery { site_id, kind, window: None };
    let (clause, params) = query_clause(&scope);
    let removed = self.delete_where(clause.into(), params).await?;
    tracing::info!(site_id, %kind, removed, "cleared records");
    Ok(removed)
  }

  async fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let removed = self
      .delete_where(
        format!("{} AND date IS NOT NULL AND date < ?1", dated_kinds_clause()),
        vec![Value::Text(encode_dt(storable_dt(cutoff)?))],
      )
      .await?;
    tracing::info!(%cutoff, removed, "evicted dated records");
    Ok(removed)
  }
}
