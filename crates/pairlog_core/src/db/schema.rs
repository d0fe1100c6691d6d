//! Slot table layout, versioned through `PRAGMA user_version`.

use super::{DbError, DbResult};
use rusqlite::Connection;

/// Schema version this build writes.
pub const SCHEMA_VERSION: u32 = 1;

/// v1: one JSON document per slot key.
const KV_SLOTS_V1: &str = "
CREATE TABLE IF NOT EXISTS kv_slots (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);";

/// Brings `conn` up to `SCHEMA_VERSION`; no-op when already current.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(DbError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(KV_SLOTS_V1)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}
