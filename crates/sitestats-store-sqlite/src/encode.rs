//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that SQL
//! string comparison orders them chronologically. Fixed width only holds for
//! four-digit years, so instants outside 0000-9999 are refused before they
//! reach a column. UUIDs are stored as hyphenated lowercase strings. Value
//! payloads are compact JSON.

use std::collections::HashMap;

use chrono::{DateTime, Datelike as _, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::types::Value;
use sitestats_core::{
  kind::RecordKind,
  query::RecordQuery,
  record::{RecordEntry, StoredValue},
  value::RecordValue,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reduce `dt` to what a column can hold: microsecond precision and a
/// four-digit year.
pub fn storable_dt(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
  if !(0..=9999).contains(&dt.year()) {
    return Err(Error::DateOutOfRange(dt));
  }
  Ok(dt.trunc_subsecs(6))
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Translate a [`RecordQuery`] into a `WHERE` clause over `records` plus its
/// positional parameters.
pub fn query_clause(query: &RecordQuery) -> (&'static str, Vec<Value>) {
  let mut params = vec![
    Value::Integer(query.site_id),
    Value::Integer(i64::from(query.kind.code())),
  ];
  match &query.window {
    None => ("site_id = ?1 AND kind_code = ?2", params),
    Some(window) => {
      params.push(Value::Text(encode_dt(window.start)));
      params.push(Value::Text(encode_dt(window.end)));
      (
        "site_id = ?1 AND kind_code = ?2 AND date >= ?3 AND date <= ?4",
        params,
      )
    }
  }
}

/// `kind_code IN (...)` over every kind bucketed by day. Singletons never
/// match, even when stored with a date.
pub fn dated_kinds_clause() -> String {
  let codes = RecordKind::all()
    .filter(|kind| kind.requires_date())
    .map(|kind| kind.code().to_string())
    .collect::<Vec<_>>()
    .join(", ");
  format!("kind_code IN ({codes})")
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns read directly from a `records` row.
pub struct RawRecord {
  pub record_id:   String,
  pub site_id:     i64,
  pub kind_code:   i16,
  pub date:        Option<String>,
  pub recorded_at: String,
}

/// Raw columns read directly from a `record_values` row.
pub struct RawValue {
  pub value_id:        String,
  pub parent_value_id: Option<String>,
  pub value_type:      String,
  pub value_json:      String,
}

/// A `records` row together with all of its value rows, ordered by
/// `position` within each sibling group.
pub struct RawEntry {
  pub record: RawRecord,
  pub values: Vec<RawValue>,
}

impl RawEntry {
  pub fn into_entry(self) -> Result<RecordEntry> {
    let record = self.record;
    Ok(RecordEntry {
      record_id:   decode_uuid(&record.record_id)?,
      site_id:     record.site_id,
      kind:        RecordKind::from_code(record.kind_code)?,
      date:        record.date.as_deref().map(decode_dt).transpose()?,
      recorded_at: decode_dt(&record.recorded_at)?,
      values:      assemble_values(self.values)?,
    })
  }
}

/// Rebuild the value forest from flat rows.
///
/// Rows arrive sorted by position, so grouping them by parent keeps sibling
/// order. Each sibling group is consumed once, which also bounds the walk if
/// the table were ever to contain a cycle.
fn assemble_values(rows: Vec<RawValue>) -> Result<Vec<StoredValue>> {
  let mut groups: HashMap<Option<String>, Vec<RawValue>> = HashMap::new();
  for row in rows {
    groups.entry(row.parent_value_id.clone()).or_default().push(row);
  }

  let roots = groups.remove(&None).unwrap_or_default();
  roots
    .into_iter()
    .map(|row| build_value(row, &mut groups))
    .collect()
}

fn build_value(
  row: RawValue,
  groups: &mut HashMap<Option<String>, Vec<RawValue>>,
) -> Result<StoredValue> {
  let value_id = decode_uuid(&row.value_id)?;
  let json: serde_json::Value = serde_json::from_str(&row.value_json)?;
  let mut value = RecordValue::from_parts(&row.value_type, json)?;

  let children = groups
    .remove(&Some(row.value_id))
    .unwrap_or_default()
    .into_iter()
    .map(|child| build_value(child, groups))
    .collect::<Result<Vec<_>>>()?;
  value.push_children(children.iter().map(|c| c.value.clone()).collect())?;

  Ok(StoredValue { value_id, value, children })
}

#[cfg(test)]
mod tests {
  use sitestats_core::calendar::Calendar;

  use super::*;

  #[test]
  fn timestamps_sort_as_text() {
    let earlier = encode_dt("2023-06-01T09:00:00Z".parse().unwrap());
    let later = encode_dt("2023-06-01T09:00:00.5Z".parse().unwrap());
    assert_eq!(earlier.len(), later.len());
    assert!(earlier < later);
    assert_eq!(decode_dt(&later).unwrap().timestamp_subsec_millis(), 500);
  }

  #[test]
  fn singleton_query_has_no_date_bounds() {
    let q = RecordQuery::for_kind(
      RecordKind::Followers,
      9,
      None,
      &Calendar::default(),
    );
    let (clause, params) = query_clause(&q);
    assert!(!clause.contains("date"));
    assert_eq!(params.len(), 2);
  }

  #[test]
  fn children_are_nested_in_row_order() {
    let row = |id: &str, parent: Option<&str>, label: &str| RawValue {
      value_id:        id.into(),
      parent_value_id: parent.map(Into::into),
      value_type:      "referrer".into(),
      value_json:      format!(r#"{{"label":"{label}","views_count":1,"url_string":null,"icon_url_string":null}}"#),
    };
    let root_id = encode_uuid(Uuid::new_v4());
    let rows = vec![
      row(&root_id, None, "root"),
      row(&encode_uuid(Uuid::new_v4()), Some(&root_id), "a"),
      row(&encode_uuid(Uuid::new_v4()), Some(&root_id), "b"),
    ];

    let values = assemble_values(rows).unwrap();
    assert_eq!(values.len(), 1);
    let RecordValue::Referrer(root) = &values[0].value else { panic!("not a referrer") };
    let labels: Vec<_> = root.children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["a", "b"]);

    // Child ids come back in the same order as the nested payloads.
    assert_eq!(values[0].children.len(), 2);
    assert_eq!(
      values[0].children[1].value,
      RecordValue::Referrer(root.children[1].clone())
    );
  }

  #[test]
  fn dated_clause_lists_only_dated_kinds() {
    let clause = dated_kinds_clause();
    assert_eq!(clause, "kind_code IN (8, 9, 10, 11, 12)");
  }

  #[test]
  fn storable_dt_truncates_and_bounds() {
    let precise: DateTime<Utc> = "2023-06-01T15:00:00.123456789Z".parse().unwrap();
    let stored = storable_dt(precise).unwrap();
    assert_eq!(decode_dt(&encode_dt(precise)).unwrap(), stored);
    assert_eq!(stored.timestamp_subsec_nanos(), 123_456_000);

    let far = chrono::NaiveDate::from_ymd_opt(10_000, 1, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap()
      .and_utc();
    assert!(matches!(storable_dt(far), Err(Error::DateOutOfRange(_))));
  }
}
