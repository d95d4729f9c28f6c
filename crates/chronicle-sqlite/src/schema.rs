use chronicle_core::error::{ChronicleError, Result};
use rusqlite::Connection;

/// Prefix for statement tables, so `list` can tell them apart from
/// anything else living in the database file.
const TABLE_PREFIX: &str = "statements_";

/// Map a logical target name to its table name.
///
/// Targets are restricted to identifier-safe characters; anything else is
/// rejected before it can reach SQL text.
pub fn table_name(target: &str) -> Result<String> {
    if target.is_empty()
        || !target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ChronicleError::ValidationFailure(format!(
            "invalid target name {target:?}"
        )));
    }
    Ok(format!("{TABLE_PREFIX}{}", target.replace('-', "_")))
}

/// Map a table name back to the logical target it backs.
pub fn target_of(table: &str) -> Option<&str> {
    table.strip_prefix(TABLE_PREFIX)
}

/// Create a target's table and indices if needed.
///
/// Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`),
/// so `ORDER BY` and range comparisons over the text columns match
/// chronological order.
pub fn init_target(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            actor TEXT NOT NULL,
            verb TEXT NOT NULL,
            object TEXT NOT NULL,
            authority TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            stored TEXT NOT NULL,
            void_target TEXT,
            doc TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {table}_stored ON {table} (stored, id);
        CREATE INDEX IF NOT EXISTS {table}_actor ON {table} (actor);
        CREATE INDEX IF NOT EXISTS {table}_verb ON {table} (verb);
        CREATE INDEX IF NOT EXISTS {table}_object ON {table} (object);
        CREATE INDEX IF NOT EXISTS {table}_timestamp ON {table} (timestamp);
        CREATE INDEX IF NOT EXISTS {table}_void ON {table} (void_target);"
    ))
    .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
    Ok(())
}

/// Whether a target's table exists.
pub fn target_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
    Ok(count > 0)
}
