use rusqlite::Connection;
use tracing::info;

use crate::error::AppResult;

const USER_VERSION: i32 = 1;

/// Forward-only migrations gated on `PRAGMA user_version`, same shape as the
/// reference implementation's `db::migrations::run`. There is exactly one
/// migration today; new ones append another `if current_version < N` block.
pub fn run(conn: &Connection) -> AppResult<()> {
    let mut current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version < 1 {
        info!(target: "taskflow::store", version = current_version, "running migration v1");
        migrate_to_v1(conn)?;
        current_version = 1;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
    }

    debug_assert_eq!(current_version, USER_VERSION);
    Ok(())
}

fn migrate_to_v1(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks (status);",
    )?;
    Ok(())
}
