/// MIGRATION 0001: Key-value table backing the persisted gallery slices.
pub const MIGRATION_0001: &str = r#"
-- One row per storage key; values are JSON documents.
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
"#;
