//! Fetch predicates over the record index.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  calendar::{Calendar, DayWindow},
  kind::RecordKind,
};

/// "The record(s) of kind K for site S on day D."
///
/// Built by [`RecordQuery::for_kind`]; executed by
/// [`crate::store::StatsStore::fetch`]. For singleton kinds `window` is always
/// `None` and the day is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
  pub site_id: i64,
  pub kind:    RecordKind,
  /// Inclusive bounds on the entry date; only set for dated kinds.
  pub window:  Option<DayWindow>,
}

impl RecordQuery {
  /// Build the query for `kind` on the calendar day containing `day`
  /// (defaults to now).
  pub fn for_kind(
    kind: RecordKind,
    site_id: i64,
    day: Option<DateTime<Utc>>,
    calendar: &Calendar,
  ) -> Self {
    let window = kind
      .requires_date()
      .then(|| calendar.day_window(day.unwrap_or_else(Utc::now)));
    Self { site_id, kind, window }
  }

  /// Build the query for `kind` on an explicit calendar date.
  pub fn for_date(
    kind: RecordKind,
    site_id: i64,
    date: NaiveDate,
    calendar: &Calendar,
  ) -> Self {
    let window = kind.requires_date().then(|| calendar.date_window(date));
    Self { site_id, kind, window }
  }

  /// Evaluate the predicate against one entry's identifying columns.
  pub fn matches(
    &self,
    site_id: i64,
    kind: RecordKind,
    date: Option<DateTime<Utc>>,
  ) -> bool {
    if self.site_id != site_id || self.kind != kind {
      return false;
    }
    match (&self.window, date) {
      (None, _) => true,
      (Some(window), Some(date)) => window.contains(date),
      (Some(_), None) => false,
    }
  }
}
