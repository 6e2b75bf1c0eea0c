//! Command-line surface and argument parsers.

use std::{path::PathBuf, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sitestats_core::{
  calendar::Calendar,
  kind::RecordKind,
  query::RecordQuery,
  value::RecordValue,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Per-site stats record store")]
pub struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sitestats.toml")]
  pub config: PathBuf,

  /// Use this store file instead of the configured one.
  #[arg(long, global = true)]
  pub store: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
  /// List every record kind with its code and date policy.
  Kinds,

  /// Insert a new entry. Fails if it breaks the kind's policy.
  Insert(WriteArgs),

  /// Insert a new entry, first removing whatever it would collide with.
  Replace(WriteArgs),

  /// Print the entries of a kind for one site and day.
  Fetch {
    #[arg(long)]
    site: i64,
    #[arg(long)]
    kind: KindArg,
    /// `YYYY-MM-DD` or an RFC 3339 instant. Defaults to now.
    #[arg(long)]
    day:  Option<DayArg>,
  },

  /// Delete one entry and its values.
  Delete { record_id: Uuid },

  /// Delete every entry of a kind for a site.
  Clear {
    #[arg(long)]
    site: i64,
    #[arg(long)]
    kind: KindArg,
  },

  /// Delete dated entries older than the given day or instant.
  Evict {
    #[arg(long)]
    before: DayArg,
  },
}

#[derive(clap::Args)]
pub struct WriteArgs {
  #[arg(long)]
  pub site:   i64,
  #[arg(long)]
  pub kind:   KindArg,
  /// `YYYY-MM-DD` (start of that day) or an RFC 3339 instant.
  #[arg(long)]
  pub date:   Option<DayArg>,
  /// A JSON value such as `{"type":"referrer","data":{"label":"a","views_count":1}}`.
  /// Repeat for several values.
  #[arg(long = "value", value_parser = parse_value)]
  pub values: Vec<RecordValue>,
}

// ─── Argument types ──────────────────────────────────────────────────────────

/// A kind given by snake_case name or numeric code.
///
/// Codes are passed through unchecked so that the store reports unknown ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindArg(pub i16);

impl KindArg {
  pub fn kind(self) -> sitestats_core::Result<RecordKind> { RecordKind::from_code(self.0) }
}

impl FromStr for KindArg {
  type Err = sitestats_core::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Ok(code) = s.parse::<i16>() {
      return Ok(Self(code));
    }
    s.parse::<RecordKind>().map(|k| Self(k.code()))
  }
}

/// A calendar date or an exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayArg {
  Date(NaiveDate),
  Instant(DateTime<Utc>),
}

impl DayArg {
  /// The instant this argument names. A bare date means the first instant of
  /// that day in `calendar`.
  pub fn instant(self, calendar: &Calendar) -> DateTime<Utc> {
    match self {
      Self::Date(date) => calendar.date_window(date).start,
      Self::Instant(at) => at,
    }
  }

  pub fn query(self, kind: RecordKind, site_id: i64, calendar: &Calendar) -> RecordQuery {
    match self {
      Self::Date(date) => RecordQuery::for_date(kind, site_id, date, calendar),
      Self::Instant(at) => RecordQuery::for_kind(kind, site_id, Some(at), calendar),
    }
  }
}

impl FromStr for DayArg {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
      return Ok(Self::Date(date));
    }
    DateTime::parse_from_rfc3339(s)
      .map(|dt| Self::Instant(dt.with_timezone(&Utc)))
      .map_err(|_| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got {s:?}"))
  }
}

fn parse_value(s: &str) -> Result<RecordValue, String> {
  serde_json::from_str(s).map_err(|e| format!("invalid value: {e}"))
}

#[cfg(test)]
mod tests {
  use chrono::FixedOffset;
  use sitestats_core::value::ReferrerValue;

  use super::*;

  #[test]
  fn kinds_parse_by_name_or_code() {
    assert_eq!("referrers".parse::<KindArg>().unwrap().kind().unwrap(), RecordKind::Referrers);
    assert_eq!("0".parse::<KindArg>().unwrap().kind().unwrap(), RecordKind::LastPostInsight);
    assert!("99".parse::<KindArg>().unwrap().kind().is_err());
    assert!("visitors".parse::<KindArg>().is_err());
  }

  #[test]
  fn bare_date_starts_at_calendar_midnight() {
    let cal = Calendar::Fixed(FixedOffset::east_opt(9 * 3600).unwrap());
    let day: DayArg = "2023-06-01".parse().unwrap();
    assert_eq!(day.instant(&cal), "2023-05-31T15:00:00Z".parse::<DateTime<Utc>>().unwrap());

    let at: DayArg = "2023-06-01T10:00:00+02:00".parse().unwrap();
    assert_eq!(at.instant(&cal), "2023-06-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap());

    assert!("June 1st".parse::<DayArg>().is_err());
  }

  #[test]
  fn values_are_tagged_json() {
    let value = parse_value(r#"{"type":"referrer","data":{"label":"wordpress.com","views_count":9001}}"#)
      .unwrap();
    assert_eq!(value, RecordValue::Referrer(ReferrerValue::new("wordpress.com", 9001)));
    assert!(parse_value(r#"{"type":"visitor","data":{}}"#).is_err());
  }

  #[test]
  fn write_args_collect_repeated_values() {
    let cli = Cli::try_parse_from([
      "sitestats",
      "insert",
      "--site",
      "42",
      "--kind",
      "search_terms",
      "--date",
      "2023-06-01",
      "--value",
      r#"{"type":"search_term","data":{"term":"rust","views_count":3}}"#,
      "--value",
      r#"{"type":"search_term","data":{"term":"sqlite","views_count":1}}"#,
    ])
    .unwrap();

    let Command::Insert(args) = cli.command else { panic!("expected insert") };
    assert_eq!(args.site, 42);
    assert_eq!(args.kind.kind().unwrap(), RecordKind::SearchTerms);
    assert_eq!(args.values.len(), 2);
  }
}
