//! Execution store implementation.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use tokio_rusqlite::Connection;
use tracing::debug;

use testflow_core::{
    Artifact, ArtifactKind, CoverageStatus, Execution, ExecutionStatus, Framework,
    RequirementMapping, Step,
};

use crate::error::StoreError;
use crate::schema::init_schema;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Aggregate statistics over stored executions.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    pub total: i64,
    pub running: i64,
    pub passed: i64,
    pub failed: i64,
    pub errors: i64,
    pub stopped: i64,
    /// Mean duration over finished executions, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_duration_ms: Option<f64>,
    pub frameworks: Vec<FrameworkStats>,
}

/// Per-framework slice of the statistics.
#[derive(Debug, Clone, Serialize)]
pub struct FrameworkStats {
    pub framework: String,
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
}

/// Outcome of a guarded status update, resolved inside the DB closure.
enum FinishOutcome {
    Updated,
    NotFound,
    AlreadyTerminal(String),
}

/// SQLite-backed store for executions and their children.
pub struct ExecutionStore {
    conn: Connection,
}

impl ExecutionStore {
    /// Create a new in-memory database. Used by tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection(e.to_string()))?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| init_schema(conn))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(Self { conn })
    }

    // ========================================================================
    // Executions
    // ========================================================================

    /// Insert a new execution row.
    pub async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let exec = execution.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO executions (id, task, framework, status, started_at, finished_at, duration_ms, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        exec.id,
                        exec.task,
                        exec.framework.as_str(),
                        exec.status.as_str(),
                        exec.started_at.to_rfc3339(),
                        exec.finished_at.map(|t| t.to_rfc3339()),
                        exec.duration_ms,
                        exec.error,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        debug!(execution_id = %execution.id, "execution created");
        Ok(())
    }

    /// Fetch one execution.
    pub async fn get_execution(&self, id: &str) -> Result<Option<Execution>, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, task, framework, status, started_at, finished_at, duration_ms, error
                     FROM executions WHERE id = ?1",
                )?;
                match stmt.query_row([&id], map_execution_row) {
                    Ok(exec) => Ok(Some(exec)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// List executions, newest first.
    pub async fn list_executions(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Execution>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, task, framework, status, started_at, finished_at, duration_ms, error
                     FROM executions ORDER BY started_at DESC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![limit, offset], map_execution_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Move an execution from `running` to a terminal status.
    ///
    /// Rejects the update when the execution is unknown or already terminal.
    pub async fn finish_execution(
        &self,
        id: &str,
        status: ExecutionStatus,
        duration_ms: i64,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: ExecutionStatus::Running.to_string(),
                to: status.to_string(),
            });
        }

        let exec_id = id.to_string();
        let outcome = self
            .conn
            .call(move |conn| {
                let current: Option<String> = conn
                    .query_row(
                        "SELECT status FROM executions WHERE id = ?1",
                        [&exec_id],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                let Some(current) = current else {
                    return Ok(FinishOutcome::NotFound);
                };
                if current != ExecutionStatus::Running.as_str() {
                    return Ok(FinishOutcome::AlreadyTerminal(current));
                }

                conn.execute(
                    "UPDATE executions
                     SET status = ?1, finished_at = ?2, duration_ms = ?3, error = ?4
                     WHERE id = ?5 AND status = 'running'",
                    params![
                        status.as_str(),
                        Utc::now().to_rfc3339(),
                        duration_ms,
                        error,
                        exec_id,
                    ],
                )?;
                Ok(FinishOutcome::Updated)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match outcome {
            FinishOutcome::Updated => {
                debug!(execution_id = %id, status = %status, "execution finished");
                Ok(())
            }
            FinishOutcome::NotFound => Err(StoreError::ExecutionNotFound(id.to_string())),
            FinishOutcome::AlreadyTerminal(from) => Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from,
                to: status.to_string(),
            }),
        }
    }

    /// Delete an execution. Steps, artifacts, and requirement mappings cascade;
    /// files on disk stay where they are.
    pub async fn delete_execution(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let rows = conn.execute("DELETE FROM executions WHERE id = ?1", [&id])?;
                Ok(rows > 0)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(deleted)
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Insert the steps collected for an execution in one transaction.
    pub async fn insert_steps(&self, steps: Vec<Step>) -> Result<(), StoreError> {
        if steps.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for step in &steps {
                    tx.execute(
                        "INSERT INTO steps (execution_id, step_number, instruction, success, duration_ms, screenshot_path, error)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            step.execution_id,
                            step.step_number,
                            step.instruction,
                            step.success,
                            step.duration_ms,
                            step.screenshot_path,
                            step.error,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Steps of an execution, ordered by step number.
    pub async fn steps_for(&self, execution_id: &str) -> Result<Vec<Step>, StoreError> {
        let execution_id = execution_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT execution_id, step_number, instruction, success, duration_ms, screenshot_path, error
                     FROM steps WHERE execution_id = ?1 ORDER BY step_number",
                )?;
                let rows = stmt
                    .query_map([&execution_id], |row| {
                        Ok(Step {
                            execution_id: row.get(0)?,
                            step_number: row.get(1)?,
                            instruction: row.get(2)?,
                            success: row.get(3)?,
                            duration_ms: row.get(4)?,
                            screenshot_path: row.get(5)?,
                            error: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    // ========================================================================
    // Artifacts
    // ========================================================================

    /// Insert one artifact row. Artifacts are immutable once written.
    pub async fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let artifact = artifact.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO artifacts (id, execution_id, kind, file_path, mime_type, description, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        artifact.id,
                        artifact.execution_id,
                        artifact.kind.as_str(),
                        artifact.file_path,
                        artifact.mime_type,
                        artifact.description,
                        artifact.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// All artifacts of an execution.
    pub async fn artifacts_for(&self, execution_id: &str) -> Result<Vec<Artifact>, StoreError> {
        let execution_id = execution_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, kind, file_path, mime_type, description, created_at
                     FROM artifacts WHERE execution_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt
                    .query_map([&execution_id], map_artifact_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Artifacts of a given kind for an execution.
    pub async fn artifacts_by_kind(
        &self,
        execution_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<Artifact>, StoreError> {
        let execution_id = execution_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, kind, file_path, mime_type, description, created_at
                     FROM artifacts WHERE execution_id = ?1 AND kind = ?2 ORDER BY created_at",
                )?;
                let rows = stmt
                    .query_map(params![execution_id, kind.as_str()], map_artifact_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Fetch one artifact by its own ID, scoped to an execution.
    pub async fn get_artifact(
        &self,
        execution_id: &str,
        artifact_id: &str,
    ) -> Result<Option<Artifact>, StoreError> {
        let execution_id = execution_id.to_string();
        let artifact_id = artifact_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, kind, file_path, mime_type, description, created_at
                     FROM artifacts WHERE execution_id = ?1 AND id = ?2",
                )?;
                match stmt.query_row(params![execution_id, artifact_id], map_artifact_row) {
                    Ok(artifact) => Ok(Some(artifact)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    // ========================================================================
    // Requirements
    // ========================================================================

    /// Insert requirement mappings for an execution in one transaction.
    pub async fn insert_requirements(
        &self,
        execution_id: &str,
        mappings: Vec<RequirementMapping>,
    ) -> Result<(), StoreError> {
        if mappings.is_empty() {
            return Ok(());
        }
        let execution_id = execution_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for mapping in &mappings {
                    tx.execute(
                        "INSERT OR REPLACE INTO requirements (execution_id, requirement_id, name, coverage)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            execution_id,
                            mapping.requirement_id,
                            mapping.name,
                            mapping.coverage.as_str(),
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Requirement mappings of an execution.
    pub async fn requirements_for(
        &self,
        execution_id: &str,
    ) -> Result<Vec<RequirementMapping>, StoreError> {
        let execution_id = execution_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT requirement_id, name, coverage
                     FROM requirements WHERE execution_id = ?1 ORDER BY requirement_id",
                )?;
                let rows = stmt
                    .query_map([&execution_id], |row| {
                        let coverage: String = row.get(2)?;
                        Ok(RequirementMapping {
                            requirement_id: row.get(0)?,
                            name: row.get(1)?,
                            coverage: CoverageStatus::from_str(&coverage)
                                .map_err(|e| text_conversion_error(2, e))?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Aggregate pass/fail counts, mean duration, and per-framework totals.
    pub async fn stats(&self) -> Result<ExecutionStats, StoreError> {
        self.conn
            .call(|conn| {
                let (total, running, passed, failed, errors, stopped, avg_duration_ms) = conn
                    .query_row(
                        "SELECT COUNT(*),
                                SUM(status = 'running'),
                                SUM(status = 'passed'),
                                SUM(status = 'failed'),
                                SUM(status = 'error'),
                                SUM(status = 'stopped'),
                                AVG(duration_ms)
                         FROM executions",
                        [],
                        |row| {
                            Ok((
                                row.get::<_, i64>(0)?,
                                row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                                row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                                row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                                row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                                row.get::<_, Option<f64>>(6)?,
                            ))
                        },
                    )?;

                let mut stmt = conn.prepare(
                    "SELECT framework,
                            COUNT(*),
                            SUM(status = 'passed'),
                            SUM(status = 'failed')
                     FROM executions GROUP BY framework ORDER BY framework",
                )?;
                let frameworks = stmt
                    .query_map([], |row| {
                        Ok(FrameworkStats {
                            framework: row.get(0)?,
                            total: row.get(1)?,
                            passed: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                            failed: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(ExecutionStats {
                    total,
                    running,
                    passed,
                    failed,
                    errors,
                    stopped,
                    avg_duration_ms,
                    frameworks,
                })
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}

fn map_execution_row(row: &rusqlite::Row<'_>) -> Result<Execution, rusqlite::Error> {
    let framework: String = row.get(2)?;
    let status: String = row.get(3)?;
    let started_at: String = row.get(4)?;
    let finished_at: Option<String> = row.get(5)?;

    Ok(Execution {
        id: row.get(0)?,
        task: row.get(1)?,
        framework: Framework::from_str(&framework).map_err(|e| text_conversion_error(2, e))?,
        status: ExecutionStatus::from_str(&status).map_err(|e| text_conversion_error(3, e))?,
        started_at: parse_timestamp(4, &started_at)?,
        finished_at: finished_at
            .map(|t| parse_timestamp(5, &t))
            .transpose()?,
        duration_ms: row.get(6)?,
        error: row.get(7)?,
    })
}

fn map_artifact_row(row: &rusqlite::Row<'_>) -> Result<Artifact, rusqlite::Error> {
    let kind: String = row.get(2)?;
    let created_at: String = row.get(6)?;
    Ok(Artifact {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        kind: ArtifactKind::from_str(&kind).map_err(|e| text_conversion_error(2, e))?,
        file_path: row.get(3)?,
        mime_type: row.get(4)?,
        description: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_conversion_error(column, e.to_string()))
}

fn text_conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, message.into())
}
