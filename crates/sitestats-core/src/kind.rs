//! Record kinds and the dated/singleton policy table.
//!
//! Every fact held by the store is tagged with exactly one [`RecordKind`]. The
//! kind decides whether records are bucketed by calendar day or kept as a
//! single per-site snapshot, and both validation and query construction read
//! that decision from [`RecordKind::requires_date`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{Error, Result};

/// The closed set of stats fact shapes.
///
/// The explicit discriminants are the persisted `kind_code`; never renumber
/// an existing variant.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(i16)]
pub enum RecordKind {
  // ── Insights (singleton) ────────────────────────────────────────────────
  LastPostInsight     = 0,
  AllTimeStatsInsight = 1,
  StreakInsight       = 2,
  TagsAndCategories   = 3,
  TopCommentedPosts   = 4,
  TopCommentAuthors   = 5,
  PublicizeConnection = 6,
  Followers           = 7,

  // ── Time-bucketed ───────────────────────────────────────────────────────
  SearchTerms         = 8,
  PostingStreak       = 9,
  PostStats           = 10,
  BlogStats           = 11,
  Referrers           = 12,
}

impl RecordKind {
  /// Whether records of this kind are bucketed by calendar day.
  ///
  /// Singleton kinds only ever keep the latest snapshot. No wildcard arm: a
  /// new variant must be placed on one side.
  pub fn requires_date(self) -> bool {
    match self {
      Self::LastPostInsight
      | Self::AllTimeStatsInsight
      | Self::StreakInsight
      | Self::TagsAndCategories
      | Self::TopCommentedPosts
      | Self::TopCommentAuthors
      | Self::PublicizeConnection
      | Self::Followers => false,

      Self::SearchTerms
      | Self::PostingStreak
      | Self::PostStats
      | Self::BlogStats
      | Self::Referrers => true,
    }
  }

  /// At most one record per site may exist for singleton kinds.
  pub fn is_singleton(self) -> bool { !self.requires_date() }

  /// The integer tag stored in the `kind_code` column.
  pub fn code(self) -> i16 { self as i16 }

  /// Decode a persisted or producer-supplied kind code.
  pub fn from_code(code: i16) -> Result<Self> {
    Self::iter()
      .find(|kind| kind.code() == code)
      .ok_or(Error::UnrecognizedKind(code))
  }

  /// The snake_case name, e.g. `"all_time_stats_insight"`.
  pub fn name(self) -> &'static str { self.into() }

  /// Every kind, in code order.
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }
}

impl TryFrom<i16> for RecordKind {
  type Error = Error;

  fn try_from(code: i16) -> Result<Self> { Self::from_code(code) }
}

impl FromStr for RecordKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::iter()
      .find(|kind| kind.name() == s)
      .ok_or_else(|| Error::UnknownKindName(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_round_trip_through_the_table() {
    for kind in RecordKind::all() {
      assert_eq!(RecordKind::from_code(kind.code()).unwrap(), kind);
      assert_eq!(kind.name().parse::<RecordKind>().unwrap(), kind);
    }
  }

  #[test]
  fn unknown_code_is_unrecognized() {
    assert!(matches!(
      RecordKind::from_code(99),
      Err(Error::UnrecognizedKind(99))
    ));
    assert!(matches!(
      RecordKind::try_from(-1),
      Err(Error::UnrecognizedKind(-1))
    ));
  }

  #[test]
  fn unknown_name_is_rejected() {
    let err = "page_views".parse::<RecordKind>().unwrap_err();
    assert!(matches!(err, Error::UnknownKindName(ref n) if n == "page_views"));
  }

  #[test]
  fn policy_split() {
    let dated: Vec<_> =
      RecordKind::all().filter(|k| k.requires_date()).collect();
    assert_eq!(dated, vec![
      RecordKind::SearchTerms,
      RecordKind::PostingStreak,
      RecordKind::PostStats,
      RecordKind::BlogStats,
      RecordKind::Referrers,
    ]);
    assert!(RecordKind::AllTimeStatsInsight.is_singleton());
    assert_eq!(RecordKind::Referrers.to_string(), "referrers");
  }
}
