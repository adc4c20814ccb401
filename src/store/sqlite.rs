//! `rusqlite`-backed `PersistenceStore`, grounded on the reference
//! implementation's `DbPool`/`TaskRepository` split (§6): a thin pool that
//! opens a configured connection per call, a row type that (de)serializes to
//! flat columns, and a schema applied with `include_str!` plus forward-only
//! migrations.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Utc;
use rusqlite::{named_params, Connection, Row};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::task::{
    Priority, ScheduledTask, Task, TaskHeader, TaskStatus, UnscheduledTask,
};
use crate::time::Instant;

use super::migrations;
use super::PersistenceStore;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Clone, Debug)]
pub struct SqliteTaskStore {
    path: PathBuf,
}

impl SqliteTaskStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        let path = path.into();
        info!(db_path = %path.display(), "initializing sqlite task store");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self { path };
        store.get_connection()?;
        Ok(store)
    }

    fn get_connection(&self) -> AppResult<Connection> {
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&mut conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        migrations::run(&conn)?;
        debug!(db_path = %self.path.display(), "sqlite connection ready");
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn configure_connection(conn: &mut Connection) -> AppResult<()> {
    conn.busy_timeout(StdDuration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(())
}

#[derive(Debug, Clone)]
struct TaskRow {
    id: String,
    kind: String,
    description: String,
    status: String,
    start_at: Option<String>,
    end_at: Option<String>,
    duration: Option<i64>,
    locked: Option<bool>,
    priority: Option<String>,
    est_duration: Option<i64>,
    rank: Option<i64>,
}

impl TaskRow {
    fn from_task(task: &Task) -> Self {
        match task {
            Task::Scheduled(t) => TaskRow {
                id: t.header.id.clone(),
                kind: "scheduled".to_string(),
                description: t.header.description.clone(),
                status: status_str(t.header.status).to_string(),
                start_at: Some(t.start.to_rfc3339()),
                end_at: Some(t.end.to_rfc3339()),
                duration: Some(t.duration),
                locked: Some(t.locked),
                priority: None,
                est_duration: None,
                rank: None,
            },
            Task::Unscheduled(t) => TaskRow {
                id: t.header.id.clone(),
                kind: "unscheduled".to_string(),
                description: t.header.description.clone(),
                status: status_str(t.header.status).to_string(),
                start_at: None,
                end_at: None,
                duration: None,
                locked: None,
                priority: Some(priority_str(t.priority).to_string()),
                est_duration: t.est_duration,
                rank: Some(t.rank),
            },
        }
    }

    fn into_task(self) -> AppResult<Task> {
        let status = parse_status(&self.status)?;
        let header = TaskHeader {
            id: self.id.clone(),
            description: self.description,
            status,
            flags: Default::default(),
        };

        match self.kind.as_str() {
            "scheduled" => {
                let start = parse_instant(self.start_at)?;
                let end = parse_instant(self.end_at)?;
                Ok(Task::Scheduled(ScheduledTask {
                    header,
                    start,
                    end,
                    duration: self.duration.unwrap_or(0),
                    locked: self.locked.unwrap_or(false),
                }))
            }
            "unscheduled" => {
                let priority = self
                    .priority
                    .as_deref()
                    .and_then(Priority::parse)
                    .unwrap_or_default();
                Ok(Task::Unscheduled(UnscheduledTask {
                    header,
                    priority,
                    est_duration: self.est_duration,
                    rank: self.rank.unwrap_or(0),
                }))
            }
            other => Err(AppError::database(format!("unknown task kind in row: {other}"))),
        }
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(TaskRow {
            id: row.get("id")?,
            kind: row.get("kind")?,
            description: row.get("description")?,
            status: row.get("status")?,
            start_at: row.get("start_at")?,
            end_at: row.get("end_at")?,
            duration: row.get("duration")?,
            locked: row.get::<_, Option<i64>>("locked")?.map(|v| v != 0),
            priority: row.get("priority")?,
            est_duration: row.get("est_duration")?,
            rank: row.get("rank")?,
        })
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Incomplete => "incomplete",
        TaskStatus::Completed => "completed",
    }
}

fn parse_status(raw: &str) -> AppResult<TaskStatus> {
    match raw {
        "incomplete" => Ok(TaskStatus::Incomplete),
        "completed" => Ok(TaskStatus::Completed),
        other => Err(AppError::database(format!("unknown task status in row: {other}"))),
    }
}

fn priority_str(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

fn parse_instant(raw: Option<String>) -> AppResult<Instant> {
    let raw = raw.ok_or_else(|| AppError::database("scheduled row missing a timestamp column"))?;
    raw.parse::<chrono::DateTime<chrono::FixedOffset>>()
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| AppError::database(format!("malformed timestamp {raw:?}: {e}")))
}

impl PersistenceStore for SqliteTaskStore {
    fn load_all(&self) -> AppResult<Vec<Task>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, description, status, start_at, end_at, duration, locked, priority, est_duration, rank FROM tasks",
        )?;
        let rows = stmt
            .query_map([], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    fn put(&self, task: &Task) -> AppResult<()> {
        let conn = self.get_connection()?;
        let row = TaskRow::from_task(task);
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id, kind, description, status, start_at, end_at, duration,
                    locked, priority, est_duration, rank, created_at, updated_at
                ) VALUES (
                    :id, :kind, :description, :status, :start_at, :end_at, :duration,
                    :locked, :priority, :est_duration, :rank, :created_at, :updated_at
                )
                ON CONFLICT(id) DO UPDATE SET
                    kind = excluded.kind,
                    description = excluded.description,
                    status = excluded.status,
                    start_at = excluded.start_at,
                    end_at = excluded.end_at,
                    duration = excluded.duration,
                    locked = excluded.locked,
                    priority = excluded.priority,
                    est_duration = excluded.est_duration,
                    rank = excluded.rank,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":id": &row.id,
                ":kind": &row.kind,
                ":description": &row.description,
                ":status": &row.status,
                ":start_at": &row.start_at,
                ":end_at": &row.end_at,
                ":duration": &row.duration,
                ":locked": row.locked.map(|v| v as i64),
                ":priority": &row.priority,
                ":est_duration": &row.est_duration,
                ":rank": &row.rank,
                ":created_at": &now,
                ":updated_at": &now,
            },
        )?;
        Ok(())
    }

    fn remove(&self, id: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        Ok(())
    }

    fn clear_all_then_bulk_put(&self, tasks: &[Task]) -> AppResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        for task in tasks {
            let row = TaskRow::from_task(task);
            let now = Utc::now().to_rfc3339();
            tx.execute(
                r#"
                    INSERT INTO tasks (
                        id, kind, description, status, start_at, end_at, duration,
                        locked, priority, est_duration, rank, created_at, updated_at
                    ) VALUES (
                        :id, :kind, :description, :status, :start_at, :end_at, :duration,
                        :locked, :priority, :est_duration, :rank, :created_at, :updated_at
                    )
                "#,
                named_params! {
                    ":id": &row.id,
                    ":kind": &row.kind,
                    ":description": &row.description,
                    ":status": &row.status,
                    ":start_at": &row.start_at,
                    ":end_at": &row.end_at,
                    ":duration": &row.duration,
                    ":locked": row.locked.map(|v| v as i64),
                    ":priority": &row.priority,
                    ":est_duration": &row.est_duration,
                    ":rank": &row.rank,
                    ":created_at": &now,
                    ":updated_at": &now,
                },
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::time_to_datetime;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn scheduled(id: &str) -> Task {
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let start = time_to_datetime("09:00", date).unwrap();
        Task::Scheduled(ScheduledTask {
            header: TaskHeader::new(id.to_string(), "demo".to_string()),
            start,
            end: crate::time::calculate_end_datetime(start, 30),
            duration: 30,
            locked: false,
        })
    }

    #[test]
    fn round_trips_scheduled_task() {
        let dir = tempdir().unwrap();
        let store = SqliteTaskStore::new(dir.path().join("test.sqlite")).unwrap();
        store.put(&scheduled("t1")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "t1");
    }

    #[test]
    fn remove_deletes_row() {
        let dir = tempdir().unwrap();
        let store = SqliteTaskStore::new(dir.path().join("test.sqlite")).unwrap();
        store.put(&scheduled("t1")).unwrap();
        store.remove("t1").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn bulk_put_replaces_everything() {
        let dir = tempdir().unwrap();
        let store = SqliteTaskStore::new(dir.path().join("test.sqlite")).unwrap();
        store.put(&scheduled("t1")).unwrap();
        store.clear_all_then_bulk_put(&[scheduled("t2")]).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "t2");
    }
}
