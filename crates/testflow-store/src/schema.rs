//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
///
/// Also enables foreign-key enforcement for the connection; cascade deletes
/// depend on it.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- One row per natural-language automation run
CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    task TEXT NOT NULL,
    framework TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    duration_ms INTEGER,
    error TEXT
);

-- Tracked instruction attempts within an execution
CREATE TABLE IF NOT EXISTS steps (
    execution_id TEXT NOT NULL,
    step_number INTEGER NOT NULL,
    instruction TEXT NOT NULL,
    success INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    screenshot_path TEXT,
    error TEXT,
    PRIMARY KEY (execution_id, step_number),
    FOREIGN KEY (execution_id) REFERENCES executions(id) ON DELETE CASCADE
);

-- Files produced during an execution
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    execution_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    file_path TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (execution_id) REFERENCES executions(id) ON DELETE CASCADE
);

-- Caller-supplied requirement traceability links
CREATE TABLE IF NOT EXISTS requirements (
    execution_id TEXT NOT NULL,
    requirement_id TEXT NOT NULL,
    name TEXT,
    coverage TEXT NOT NULL,
    PRIMARY KEY (execution_id, requirement_id),
    FOREIGN KEY (execution_id) REFERENCES executions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status);
CREATE INDEX IF NOT EXISTS idx_executions_framework ON executions(framework);
CREATE INDEX IF NOT EXISTS idx_executions_started ON executions(started_at);
CREATE INDEX IF NOT EXISTS idx_steps_execution ON steps(execution_id);
CREATE INDEX IF NOT EXISTS idx_artifacts_execution ON artifacts(execution_id);
CREATE INDEX IF NOT EXISTS idx_artifacts_kind ON artifacts(execution_id, kind);
CREATE INDEX IF NOT EXISTS idx_requirements_execution ON requirements(execution_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in ["executions", "steps", "artifacts", "requirements"] {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
                .unwrap();
            assert!(stmt.exists([table]).unwrap(), "missing table {}", table);
        }
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
