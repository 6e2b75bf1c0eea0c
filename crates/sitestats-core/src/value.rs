//! Value types: the kind-specific payloads attached to a record entry.
//!
//! Stats data points look alike (most have a label, many a count, some a URL)
//! but differ enough that one umbrella struct would end up with dozens of
//! loosely related optional fields. Each kind instead gets its own payload
//! struct, and [`RecordValue`] is the tagged union over them. Callers match on
//! the variant they expect for the kind they fetched.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result, kind::RecordKind};

// ─── URLs ────────────────────────────────────────────────────────────────────

/// Lenient URL parsing for auxiliary link fields.
///
/// Stats payloads frequently carry host-only strings such as
/// `www.wordpress.com`; those resolve against `https://`. Anything that still
/// fails to parse yields `None`.
pub fn parse_url(raw: &str) -> Option<Url> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  match Url::parse(raw) {
    Ok(url) => Some(url),
    Err(url::ParseError::RelativeUrlWithoutBase) => {
      Url::parse(&format!("https://{raw}")).ok()
    }
    Err(_) => None,
  }
}

fn lazy_url(raw: &Option<String>) -> Option<Url> {
  raw.as_deref().and_then(parse_url)
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

/// A value type that may own an ordered list of children of its own type
/// (e.g. a referrer domain with per-page breakdowns).
///
/// Children keep insertion order. Nothing prevents a producer from building
/// the same breakdown twice; the store only ever sees trees.
pub trait Hierarchical: Sized {
  fn children(&self) -> &[Self];

  fn children_mut(&mut self) -> &mut Vec<Self>;

  /// This node's own views.
  fn own_views(&self) -> u64;

  /// Own views plus the views of every descendant.
  fn total_views(&self) -> u64 {
    self.own_views()
      + self.children().iter().map(Hierarchical::total_views).sum::<u64>()
  }
}

// ─── Insight payloads ────────────────────────────────────────────────────────

/// Snapshot of the most recently published post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastPostValue {
  pub post_id:                   i64,
  pub title:                     String,
  pub url_string:                Option<String>,
  pub published_date:            Option<DateTime<Utc>>,
  pub likes_count:               u64,
  pub comments_count:            u64,
  pub views_count:               u64,
  pub featured_image_url_string: Option<String>,
}

impl LastPostValue {
  pub fn url(&self) -> Option<Url> { lazy_url(&self.url_string) }

  pub fn featured_image_url(&self) -> Option<Url> {
    lazy_url(&self.featured_image_url_string)
  }
}

/// Lifetime totals for a site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllTimeValue {
  pub posts_count:              u64,
  pub views_count:              u64,
  pub visitors_count:           u64,
  pub best_views_per_day_count: u64,
  pub best_views_day:           Option<NaiveDate>,
}

/// Current and longest posting streaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreakValue {
  pub current_streak_length: u32,
  pub current_streak_start:  Option<NaiveDate>,
  pub current_streak_end:    Option<NaiveDate>,
  pub longest_streak_length: u32,
  pub longest_streak_start:  Option<NaiveDate>,
  pub longest_streak_end:    Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
  #[default]
  Tag,
  Category,
  /// A group of tags/categories reported together; its members are children.
  Folder,
}

/// One entry of the "tags & categories" insight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCategoryValue {
  pub name:        String,
  pub kind:        TaxonomyKind,
  pub url_string:  Option<String>,
  pub views_count: u64,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children:    Vec<TagCategoryValue>,
}

impl TagCategoryValue {
  pub fn url(&self) -> Option<Url> { lazy_url(&self.url_string) }
}

impl Hierarchical for TagCategoryValue {
  fn children(&self) -> &[Self] { &self.children }

  fn children_mut(&mut self) -> &mut Vec<Self> { &mut self.children }

  fn own_views(&self) -> u64 { self.views_count }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentedPostValue {
  pub post_id:        i64,
  pub title:          String,
  pub comments_count: u64,
  pub url_string:     Option<String>,
}

impl CommentedPostValue {
  pub fn url(&self) -> Option<Url> { lazy_url(&self.url_string) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthorValue {
  pub name:              String,
  pub comments_count:    u64,
  pub avatar_url_string: Option<String>,
}

impl CommentAuthorValue {
  pub fn avatar_url(&self) -> Option<Url> { lazy_url(&self.avatar_url_string) }
}

/// Followers reached through one connected publicize service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicizeServiceValue {
  pub name:            String,
  pub followers_count: u64,
  pub icon_url_string: Option<String>,
}

impl PublicizeServiceValue {
  pub fn icon_url(&self) -> Option<Url> { lazy_url(&self.icon_url_string) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowerValue {
  pub name:              String,
  pub subscription_date: Option<DateTime<Utc>>,
  pub avatar_url_string: Option<String>,
}

impl FollowerValue {
  pub fn avatar_url(&self) -> Option<Url> { lazy_url(&self.avatar_url_string) }
}

// ─── Dated payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTermValue {
  pub term:        String,
  pub views_count: u64,
}

/// Number of posts published on one day of a posting streak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakDayValue {
  pub date:       NaiveDate,
  pub post_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostStatsValue {
  pub post_id:        i64,
  pub title:          String,
  pub views_count:    u64,
  pub likes_count:    u64,
  pub comments_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogStatsValue {
  pub views_count:    u64,
  pub visitors_count: u64,
  pub likes_count:    u64,
  pub comments_count: u64,
  pub posts_count:    u64,
}

/// A referrer source. Domains nest their per-page breakdowns as children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferrerValue {
  pub label:           String,
  pub views_count:     u64,
  pub url_string:      Option<String>,
  pub icon_url_string: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children:        Vec<ReferrerValue>,
}

impl ReferrerValue {
  pub fn new(label: impl Into<String>, views_count: u64) -> Self {
    Self {
      label: label.into(),
      views_count,
      ..Self::default()
    }
  }

  pub fn referrer_url(&self) -> Option<Url> { lazy_url(&self.url_string) }

  pub fn icon_url(&self) -> Option<Url> { lazy_url(&self.icon_url_string) }
}

impl Hierarchical for ReferrerValue {
  fn children(&self) -> &[Self] { &self.children }

  fn children_mut(&mut self) -> &mut Vec<Self> { &mut self.children }

  fn own_views(&self) -> u64 { self.views_count }
}

// ─── RecordValue ─────────────────────────────────────────────────────────────

/// Every `value_type` discriminant, in variant order.
pub const VALUE_TYPES: [&str; 13] = [
  "last_post",
  "all_time",
  "streak",
  "tag_category",
  "commented_post",
  "comment_author",
  "publicize_service",
  "follower",
  "search_term",
  "streak_day",
  "post_stats",
  "blog_stats",
  "referrer",
];

/// The typed payload of a record value. The variant name serves as the
/// `value_type` discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RecordValue {
  // ── Insights ────────────────────────────────────────────────────────────
  LastPost(LastPostValue),
  AllTime(AllTimeValue),
  Streak(StreakValue),
  TagCategory(TagCategoryValue),
  CommentedPost(CommentedPostValue),
  CommentAuthor(CommentAuthorValue),
  PublicizeService(PublicizeServiceValue),
  Follower(FollowerValue),

  // ── Dated ───────────────────────────────────────────────────────────────
  SearchTerm(SearchTermValue),
  StreakDay(StreakDayValue),
  PostStats(PostStatsValue),
  BlogStats(BlogStatsValue),
  Referrer(ReferrerValue),
}

impl RecordValue {
  /// The discriminant string stored in the `value_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::LastPost(_) => "last_post",
      Self::AllTime(_) => "all_time",
      Self::Streak(_) => "streak",
      Self::TagCategory(_) => "tag_category",
      Self::CommentedPost(_) => "commented_post",
      Self::CommentAuthor(_) => "comment_author",
      Self::PublicizeService(_) => "publicize_service",
      Self::Follower(_) => "follower",
      Self::SearchTerm(_) => "search_term",
      Self::StreakDay(_) => "streak_day",
      Self::PostStats(_) => "post_stats",
      Self::BlogStats(_) => "blog_stats",
      Self::Referrer(_) => "referrer",
    }
  }

  /// The record kind this payload is normally stored under.
  ///
  /// Informational only: the store does not reject a value attached to an
  /// entry of a different kind.
  pub fn kind(&self) -> RecordKind {
    match self {
      Self::LastPost(_) => RecordKind::LastPostInsight,
      Self::AllTime(_) => RecordKind::AllTimeStatsInsight,
      Self::Streak(_) => RecordKind::StreakInsight,
      Self::TagCategory(_) => RecordKind::TagsAndCategories,
      Self::CommentedPost(_) => RecordKind::TopCommentedPosts,
      Self::CommentAuthor(_) => RecordKind::TopCommentAuthors,
      Self::PublicizeService(_) => RecordKind::PublicizeConnection,
      Self::Follower(_) => RecordKind::Followers,
      Self::SearchTerm(_) => RecordKind::SearchTerms,
      Self::StreakDay(_) => RecordKind::PostingStreak,
      Self::PostStats(_) => RecordKind::PostStats,
      Self::BlogStats(_) => RecordKind::BlogStats,
      Self::Referrer(_) => RecordKind::Referrers,
    }
  }

  pub fn is_hierarchical(&self) -> bool {
    matches!(self, Self::Referrer(_) | Self::TagCategory(_))
  }

  /// Detach the direct children, returning this node (now childless) and the
  /// children wrapped in the same variant, in order.
  pub fn split_children(self) -> (Self, Vec<Self>) {
    match self {
      Self::Referrer(mut v) => {
        let children = std::mem::take(&mut v.children);
        (
          Self::Referrer(v),
          children.into_iter().map(Self::Referrer).collect(),
        )
      }
      Self::TagCategory(mut v) => {
        let children = std::mem::take(&mut v.children);
        (
          Self::TagCategory(v),
          children.into_iter().map(Self::TagCategory).collect(),
        )
      }
      other => (other, Vec::new()),
    }
  }

  /// Append `children` after any existing children, preserving their order.
  ///
  /// Every child must be the same variant as `self`, and `self` must be a
  /// hierarchical variant. Nothing is appended if any child is rejected.
  pub fn push_children(&mut self, children: Vec<RecordValue>) -> Result<()> {
    let parent = self.discriminant();
    match self {
      Self::Referrer(v) => {
        let typed = same_variant(parent, children, |c| match c {
          Self::Referrer(r) => Ok(r),
          other => Err(other),
        })?;
        v.children.extend(typed);
        Ok(())
      }
      Self::TagCategory(v) => {
        let typed = same_variant(parent, children, |c| match c {
          Self::TagCategory(t) => Ok(t),
          other => Err(other),
        })?;
        v.children.extend(typed);
        Ok(())
      }
      _ if children.is_empty() => Ok(()),
      _ => Err(Error::NotHierarchical(parent)),
    }
  }

  /// Serialise the inner payload (without the type tag) for the `value_json`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    // The full serialised form is `{"type": "...", "data": <payload>}`.
    // We want only the payload.
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in the
  /// database.
  pub fn from_parts(discriminant: &str, data: serde_json::Value) -> Result<Self> {
    if !VALUE_TYPES.contains(&discriminant) {
      return Err(Error::UnknownValueType(discriminant.to_owned()));
    }
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

fn same_variant<T>(
  parent: &'static str,
  children: Vec<RecordValue>,
  pick: impl Fn(RecordValue) -> std::result::Result<T, RecordValue>,
) -> Result<Vec<T>> {
  children
    .into_iter()
    .map(|child| {
      pick(child).map_err(|other| Error::ChildTypeMismatch {
        parent,
        child: other.discriminant(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_conversion_accepts_bare_hosts() {
    let mut referrer = ReferrerValue::new("wp", 1);
    referrer.url_string = Some("www.wordpress.com".into());
    referrer.icon_url_string = Some("https://s.wp.com/icon.png".into());

    let url = referrer.referrer_url().unwrap();
    assert_eq!(url.host_str(), Some("www.wordpress.com"));
    assert_eq!(referrer.icon_url().unwrap().scheme(), "https");
  }

  #[test]
  fn malformed_url_degrades_to_none() {
    assert!(parse_url("not a url").is_none());
    assert!(parse_url("   ").is_none());
    assert!(parse_url("http://[::1").is_none());

    let referrer = ReferrerValue::new("no link", 3);
    assert!(referrer.referrer_url().is_none());
  }

  #[test]
  fn children_keep_insertion_order() {
    let mut parent = RecordValue::Referrer(ReferrerValue::new("parent", 5000));
    parent
      .push_children(vec![
        RecordValue::Referrer(ReferrerValue::new("A", 1)),
        RecordValue::Referrer(ReferrerValue::new("B", 2)),
      ])
      .unwrap();
    parent
      .push_children(vec![RecordValue::Referrer(ReferrerValue::new("C", 3))])
      .unwrap();

    let RecordValue::Referrer(r) = &parent else { panic!("not a referrer") };
    let labels: Vec<_> = r.children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["A", "B", "C"]);
    assert_eq!(r.total_views(), 5006);
  }

  #[test]
  fn mismatched_child_is_rejected_without_partial_append() {
    let mut parent = RecordValue::Referrer(ReferrerValue::new("parent", 1));
    let err = parent
      .push_children(vec![
        RecordValue::Referrer(ReferrerValue::new("ok", 1)),
        RecordValue::SearchTerm(SearchTermValue {
          term:        "rust".into(),
          views_count: 1,
        }),
      ])
      .unwrap_err();
    assert!(matches!(
      err,
      Error::ChildTypeMismatch { parent: "referrer", child: "search_term" }
    ));

    let RecordValue::Referrer(r) = &parent else { panic!("not a referrer") };
    assert!(r.children.is_empty());
  }

  #[test]
  fn flat_values_refuse_children() {
    let mut value = RecordValue::AllTime(AllTimeValue::default());
    let err = value
      .push_children(vec![RecordValue::AllTime(AllTimeValue::default())])
      .unwrap_err();
    assert!(matches!(err, Error::NotHierarchical("all_time")));
  }

  #[test]
  fn split_children_strips_one_level() {
    let mut tag = TagCategoryValue {
      name: "folder".into(),
      kind: TaxonomyKind::Folder,
      ..TagCategoryValue::default()
    };
    tag.children.push(TagCategoryValue {
      name: "rust".into(),
      views_count: 7,
      ..TagCategoryValue::default()
    });

    let (node, children) = RecordValue::TagCategory(tag).split_children();
    let RecordValue::TagCategory(node) = node else { panic!("variant changed") };
    assert!(node.children.is_empty());
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].discriminant(), "tag_category");
  }

  #[test]
  fn payload_json_omits_type_tag_and_empty_children() {
    let value = RecordValue::Referrer(ReferrerValue::new("wordpress.com", 9001));
    let json = value.to_json().unwrap();
    assert_eq!(json["label"], "wordpress.com");
    assert!(json.get("type").is_none());
    assert!(json.get("children").is_none());

    let back = RecordValue::from_parts("referrer", json).unwrap();
    assert_eq!(back, value);
  }

  #[test]
  fn unknown_discriminant_is_reported() {
    let err =
      RecordValue::from_parts("page_view", serde_json::json!({})).unwrap_err();
    assert!(matches!(err, Error::UnknownValueType(ref d) if d == "page_view"));
  }
}
