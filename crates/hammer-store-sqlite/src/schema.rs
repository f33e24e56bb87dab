//! SQL schema for the Hammer SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Events are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  INTEGER NOT NULL,               -- Unix seconds; ledger-assigned
    subject     TEXT    NOT NULL COLLATE NOCASE,
    issued_by   TEXT    NOT NULL,
    kind        TEXT    NOT NULL,               -- 'ban' | 'unban'
    reason      TEXT    NOT NULL DEFAULT '',
    expires_at  INTEGER NOT NULL DEFAULT 0      -- Unix seconds; 0 = never
);

CREATE INDEX IF NOT EXISTS events_active_idx
    ON events(subject COLLATE NOCASE, expires_at, id);

PRAGMA user_version = 1;
";
