//! Error types for `sitestats-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::kind::RecordKind;

#[derive(Debug, Error)]
pub enum Error {
  /// The stored or supplied kind code is outside the closed kind table.
  #[error("unrecognized record kind code: {0}")]
  UnrecognizedKind(i16),

  #[error("unrecognized record kind name: {0:?}")]
  UnknownKindName(String),

  #[error("record of kind {0} requires a date")]
  MissingDate(RecordKind),

  /// A second entry of a singleton kind would exist for the same site.
  #[error("only one record of kind {0} may exist per site")]
  SingleEntryViolation(RecordKind),

  /// The entry or value a payload was attached to is not in the store.
  #[error("no owning record or value: {0}")]
  NoOwningContext(Uuid),

  /// Children were attached to a value kind that has no child relationship.
  #[error("value type {0} does not support children")]
  NotHierarchical(&'static str),

  /// Children must share the concrete type of their parent value.
  #[error("cannot attach a {child} value as a child of a {parent} value")]
  ChildTypeMismatch {
    parent: &'static str,
    child:  &'static str,
  },

  #[error("unknown value type discriminant: {0:?}")]
  UnknownValueType(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
