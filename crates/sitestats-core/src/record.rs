//! Record index entries and their attached values.
//!
//! A [`RecordEntry`] only states that a fact of some kind exists for a site
//! (and, for dated kinds, a day). The data itself lives in the ordered
//! [`StoredValue`]s the entry owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, kind::RecordKind, value::RecordValue};

// ─── Persisted ───────────────────────────────────────────────────────────────

/// A value as read back from the store.
///
/// `value` holds the whole subtree, children nested in the order they were
/// attached. `children` mirrors that nesting with the persisted id of each
/// child, so later children can be hung off any node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
  pub value_id: Uuid,
  pub value:    RecordValue,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<StoredValue>,
}

impl StoredValue {
  /// Find `value_id` in this node or any descendant.
  pub fn find(&self, value_id: Uuid) -> Option<&StoredValue> {
    if self.value_id == value_id {
      return Some(self);
    }
    self.children.iter().find_map(|child| child.find(value_id))
  }
}

/// One fact occurrence: (site, kind, date?) plus its owned values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
  pub record_id:   Uuid,
  pub site_id:     i64,
  pub kind:        RecordKind,
  /// Present for dated kinds; `None` for singleton snapshots.
  pub date:        Option<DateTime<Utc>>,
  /// Server-assigned timestamp of the insert.
  pub recorded_at: DateTime<Utc>,
  /// Top-level values in insertion order.
  pub values:      Vec<StoredValue>,
}

impl RecordEntry {
  pub fn first_value(&self) -> Option<&RecordValue> {
    self.values.first().map(|v| &v.value)
  }

  pub fn iter_values(&self) -> impl Iterator<Item = &RecordValue> {
    self.values.iter().map(|v| &v.value)
  }
}

// ─── NewRecord ───────────────────────────────────────────────────────────────

/// Handle to a value attached to a [`NewRecord`], used to hang children off
/// it before the record is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSlot {
  record_id: Uuid,
  index:     usize,
}

/// Input to [`crate::store::StatsStore::insert_record`].
///
/// The entry, its values and their children are committed as one unit; if
/// validation fails nothing is written. `recorded_at` is always set by the
/// store.
#[derive(Debug, Clone)]
pub struct NewRecord {
  /// Identity of the entry once committed; assigned here so values can be
  /// bound to it before the insert.
  pub record_id: Uuid,
  pub site_id:   i64,
  /// Raw persisted kind tag. Decoded and checked at insert time.
  pub kind_code: i16,
  pub date:      Option<DateTime<Utc>>,
  values:        Vec<RecordValue>,
}

impl NewRecord {
  pub fn new(site_id: i64, kind: RecordKind, date: Option<DateTime<Utc>>) -> Self {
    Self::from_code(site_id, kind.code(), date)
  }

  /// Build from a kind code as received from a producer. Unknown codes are
  /// rejected by the store with [`Error::UnrecognizedKind`].
  pub fn from_code(site_id: i64, kind_code: i16, date: Option<DateTime<Utc>>) -> Self {
    Self {
      record_id: Uuid::new_v4(),
      site_id,
      kind_code,
      date,
      values: Vec::new(),
    }
  }

  pub fn kind(&self) -> Result<RecordKind> { RecordKind::from_code(self.kind_code) }

  /// Append `value` after any previously attached values.
  pub fn attach(&mut self, value: RecordValue) -> ValueSlot {
    self.values.push(value);
    ValueSlot {
      record_id: self.record_id,
      index:     self.values.len() - 1,
    }
  }

  /// Builder form of [`NewRecord::attach`].
  pub fn with_value(mut self, value: RecordValue) -> Self {
    self.attach(value);
    self
  }

  /// Append `children`, in order, under the value behind `slot`.
  ///
  /// A slot taken from a different record fails with
  /// [`Error::NoOwningContext`].
  pub fn attach_children(
    &mut self,
    slot: ValueSlot,
    children: Vec<RecordValue>,
  ) -> Result<()> {
    if slot.record_id != self.record_id {
      return Err(Error::NoOwningContext(slot.record_id));
    }
    let parent = self
      .values
      .get_mut(slot.index)
      .ok_or(Error::NoOwningContext(slot.record_id))?;
    parent.push_children(children)
  }

  pub fn values(&self) -> &[RecordValue] { &self.values }

  pub fn into_values(self) -> Vec<RecordValue> { self.values }
}
