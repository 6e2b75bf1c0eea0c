//! SQL schema for the sitestats SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per (site, kind, date?) fact occurrence.
-- Singleton kinds are kept unique by insert-time validation, not by an index.
CREATE TABLE IF NOT EXISTS records (
    record_id   TEXT PRIMARY KEY,
    site_id     INTEGER NOT NULL,
    kind_code   INTEGER NOT NULL,   -- RecordKind discriminant
    date        TEXT,               -- RFC 3339 UTC, fixed width; NULL for singletons
    recorded_at TEXT NOT NULL       -- RFC 3339 UTC; server-assigned
);

-- Typed payloads. Top-level values have parent_value_id NULL; children of
-- hierarchical values point at their parent and share its record_id.
CREATE TABLE IF NOT EXISTS record_values (
    value_id        TEXT PRIMARY KEY,
    record_id       TEXT NOT NULL REFERENCES records(record_id) ON DELETE CASCADE,
    parent_value_id TEXT REFERENCES record_values(value_id) ON DELETE CASCADE,
    position        INTEGER NOT NULL,  -- insertion order among siblings
    value_type      TEXT NOT NULL,     -- discriminant of RecordValue variant
    value_json      TEXT NOT NULL      -- JSON payload without children
);

CREATE INDEX IF NOT EXISTS records_lookup_idx ON records(site_id, kind_code, date);
CREATE INDEX IF NOT EXISTS records_date_idx   ON records(date);
CREATE INDEX IF NOT EXISTS values_record_idx  ON record_values(record_id);
CREATE INDEX IF NOT EXISTS values_parent_idx  ON record_values(parent_value_id);

PRAGMA user_version = 1;
";
