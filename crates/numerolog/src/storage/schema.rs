//! `SQLite` schema definitions for numerolog.
//!
//! All records share one key-value table addressed by a partition key and a
//! sort key; see [`super::keys`] for the key layout.

/// SQL statement to create the items table.
pub const CREATE_ITEMS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS items (
    pk TEXT NOT NULL,
    sk TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (pk, sk)
)
";

/// SQL statement to create an index on the sort key, used by scans across users.
pub const CREATE_SK_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_items_sk ON items(sk)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Base schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_ITEMS_TABLE, CREATE_METADATA_TABLE];
