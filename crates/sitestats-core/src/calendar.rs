//! Calendar-relative day bucketing.
//!
//! Dated records are grouped by the calendar day they fall on in the ambient
//! calendar, not by fixed 24-hour UTC windows. A record stamped at 23:59 local
//! time belongs to that local day even though it is already the next day in
//! UTC.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The calendar used to compute day boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Calendar {
  /// The system time zone, re-read on every computation.
  #[default]
  Local,
  /// A fixed UTC offset; used by configuration overrides and tests.
  Fixed(FixedOffset),
}

impl Calendar {
  /// A fixed-offset calendar `minutes` east of UTC. `None` if the offset is
  /// out of range (more than a day).
  pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
    FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::Fixed)
  }

  /// The `[start, end]` interval of the calendar day containing `instant`.
  pub fn day_window(&self, instant: DateTime<Utc>) -> DayWindow {
    match self {
      Self::Local => window_for_date(&chrono::Local, local_date(&chrono::Local, instant)),
      Self::Fixed(offset) => window_for_date(offset, local_date(offset, instant)),
    }
  }

  /// The `[start, end]` interval of the given calendar date.
  pub fn date_window(&self, date: NaiveDate) -> DayWindow {
    match self {
      Self::Local => window_for_date(&chrono::Local, date),
      Self::Fixed(offset) => window_for_date(offset, date),
    }
  }

  /// The calendar date `instant` falls on.
  pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
    match self {
      Self::Local => local_date(&chrono::Local, instant),
      Self::Fixed(offset) => local_date(offset, instant),
    }
  }
}

/// A closed instant interval covering one calendar day.
///
/// `end` is the first instant of the following day and is included, so an
/// instant exactly at local midnight matches both adjacent days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl DayWindow {
  pub fn contains(&self, instant: DateTime<Utc>) -> bool {
    self.start <= instant && instant <= self.end
  }
}

fn local_date<Tz: TimeZone>(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
  instant.with_timezone(tz).date_naive()
}

fn window_for_date<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DayWindow {
  let next = date.succ_opt().unwrap_or(date);
  DayWindow {
    start: start_of_day(tz, date),
    end:   start_of_day(tz, next),
  }
}

/// First instant of `date` in `tz`.
///
/// Some zones skip local midnight at a DST change; the day then starts at the
/// first local time that exists. Offsets and transitions are multiples of 15
/// minutes, so probing in 15 minute steps finds it exactly.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
  let midnight = date.and_time(NaiveTime::MIN);
  (0..24 * 60)
    .step_by(15)
    .find_map(|minutes| {
      tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
        .earliest()
    })
    .map(|start| start.with_timezone(&Utc))
    .unwrap_or_else(|| midnight.and_utc())
}
