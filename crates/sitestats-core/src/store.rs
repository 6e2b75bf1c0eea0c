//! The `StatsStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `sitestats-store-sqlite`). Producers (sync services) and consumers
//! (presentation code) receive a store handle explicitly; there is no
//! process-wide "current store".

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  calendar::Calendar,
  kind::RecordKind,
  query::RecordQuery,
  record::{NewRecord, RecordEntry, StoredValue},
  value::RecordValue,
};

/// Abstraction over a stats record store backend.
///
/// Every write runs as one transaction: staging the entry, attaching values
/// and validating either all commit or none do.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait StatsStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The calendar that defines day boundaries for dated kinds.
  fn calendar(&self) -> Calendar;

  // ── Producer ──────────────────────────────────────────────────────────

  /// Validate and commit a new entry with its values.
  ///
  /// Fails with `UnrecognizedKind`, `MissingDate` (dated kind without a
  /// date) or `SingleEntryViolation` (a singleton kind already has an entry
  /// for the site). Callers wanting replace semantics must delete the old
  /// entry first, or use [`StatsStore::replace_record`].
  fn insert_record(
    &self,
    record: NewRecord,
  ) -> impl Future<Output = Result<RecordEntry, Self::Error>> + Send + '_;

  /// Atomically delete the entries `record` supersedes, then insert it.
  ///
  /// For singleton kinds that is every entry of the kind for the site; for
  /// dated kinds, those on the same calendar day.
  fn replace_record(
    &self,
    record: NewRecord,
  ) -> impl Future<Output = Result<RecordEntry, Self::Error>> + Send + '_;

  /// Return the entry matching (site, kind, day-of-`date`), inserting an
  /// empty one if none exists.
  fn upsert_record(
    &self,
    site_id: i64,
    kind: RecordKind,
    date: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<RecordEntry, Self::Error>> + Send + '_;

  /// Append a value to a committed entry. Fails with `NoOwningContext` if the
  /// entry does not exist.
  fn attach_value(
    &self,
    record_id: Uuid,
    value: RecordValue,
  ) -> impl Future<Output = Result<StoredValue, Self::Error>> + Send + '_;

  /// Append children, in order, under a committed value. Returns the stored
  /// children. Fails with `NoOwningContext` if the value does not exist.
  fn attach_children(
    &self,
    value_id: Uuid,
    children: Vec<RecordValue>,
  ) -> impl Future<Output = Result<Vec<StoredValue>, Self::Error>> + Send + '_;

  // ── Consumer ──────────────────────────────────────────────────────────

  /// Execute `query`. Each call re-runs it; no matches is an empty vec.
  fn fetch<'a>(
    &'a self,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<RecordEntry>, Self::Error>> + Send + 'a;

  /// Fetch `kind` for `site_id` on the day containing `day` (default: now),
  /// using [`StatsStore::calendar`].
  fn fetch_for(
    &self,
    kind: RecordKind,
    site_id: i64,
    day: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<RecordEntry>, Self::Error>> + Send + '_ {
    let query = RecordQuery::for_kind(kind, site_id, day, &self.calendar());
    async move { self.fetch(&query).await }
  }

  /// Retrieve one entry by id. Returns `None` if not found.
  fn get_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Option<RecordEntry>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Delete an entry and, by cascade, its values. Returns `false` if it did
  /// not exist.
  fn delete_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every entry of `kind` for `site_id`. Returns the number removed.
  fn clear_kind(
    &self,
    site_id: i64,
    kind: RecordKind,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete dated entries older than `cutoff`. Returns the number removed.
  fn evict_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
