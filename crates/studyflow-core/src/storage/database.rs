//! SQLite persistence.
//!
//! One connection guarded by a mutex; rusqlite's bundled SQLite keeps
//! the crate self-contained. Plans, preferences, and sync configs are
//! stored as JSON documents; tasks and event mappings use typed columns
//! so sync queries can filter without deserializing.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{DatabaseError, Result};
use crate::model::{Preferences, StressSignal, Task, TaskPriority, TaskStatus};
use crate::plan::StudyPlan;
use crate::storage::{
    MappingStore, PlanStore, PreferenceStore, StressStore, SyncConfigStore, TaskStore,
};
use crate::sync::types::{CalendarSyncConfig, EntityKind, EventMapping, SyncState};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    user_id             TEXT NOT NULL,
    id                  TEXT NOT NULL,
    title               TEXT NOT NULL,
    description         TEXT,
    deadline            TEXT,
    priority            TEXT NOT NULL DEFAULT 'medium',
    complexity_score    INTEGER NOT NULL DEFAULT 5,
    estimated_hours     REAL NOT NULL DEFAULT 2.0,
    status              TEXT NOT NULL DEFAULT 'todo',
    time_spent_minutes  INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);

CREATE TABLE IF NOT EXISTS preferences (
    user_id  TEXT PRIMARY KEY,
    data     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stress_signals (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          TEXT NOT NULL,
    objective_score  REAL NOT NULL,
    timestamp        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stress_user_time
    ON stress_signals (user_id, timestamp DESC);

CREATE TABLE IF NOT EXISTS study_plans (
    user_id  TEXT NOT NULL,
    date     TEXT NOT NULL,
    data     TEXT NOT NULL,
    PRIMARY KEY (user_id, date)
);

CREATE TABLE IF NOT EXISTS event_mappings (
    id                    TEXT PRIMARY KEY,
    user_id               TEXT NOT NULL,
    entity_kind           TEXT NOT NULL,
    entity_id             TEXT NOT NULL,
    google_event_id       TEXT NOT NULL,
    google_calendar_id    TEXT NOT NULL,
    last_synced_at        TEXT NOT NULL,
    last_modified_local   TEXT NOT NULL,
    last_modified_google  TEXT,
    sync_state            TEXT NOT NULL DEFAULT 'synced',
    version_hash          TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    UNIQUE (user_id, entity_kind, entity_id)
);
CREATE INDEX IF NOT EXISTS idx_mappings_event
    ON event_mappings (user_id, google_event_id);

CREATE TABLE IF NOT EXISTS sync_configs (
    user_id  TEXT PRIMARY KEY,
    data     TEXT NOT NULL
);
";

/// SQLite-backed implementation of every store trait.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source: e,
        })?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only happens after a panic in another thread; at
        // that point continuing with the connection is still sound.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{s}': {e}")).into())
}

fn parse_priority(s: &str) -> TaskPriority {
    match s {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        "urgent" => TaskPriority::Urgent,
        _ => TaskPriority::Medium,
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        _ => TaskStatus::Todo,
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<(Task, Option<String>, String, String)> {
    Ok((
        Task {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            deadline: None,
            priority: parse_priority(&row.get::<_, String>("priority")?),
            complexity_score: row.get("complexity_score")?,
            estimated_hours: row.get("estimated_hours")?,
            status: parse_status(&row.get::<_, String>("status")?),
            time_spent_minutes: row.get("time_spent_minutes")?,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        row.get("deadline")?,
        row.get("created_at")?,
        row.get("updated_at")?,
    ))
}

fn finish_task(parts: (Task, Option<String>, String, String)) -> Result<Task> {
    let (mut task, deadline, created, updated) = parts;
    task.deadline = deadline.as_deref().map(parse_ts).transpose()?;
    task.created_at = parse_ts(&created)?;
    task.updated_at = parse_ts(&updated)?;
    Ok(task)
}

impl TaskStore for Database {
    fn put_task(&self, user_id: &str, task: &Task) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO tasks
             (user_id, id, title, description, deadline, priority, complexity_score,
              estimated_hours, status, time_spent_minutes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                user_id,
                task.id,
                task.title,
                task.description,
                task.deadline.map(ts),
                task.priority.as_str(),
                task.complexity_score,
                task.estimated_hours,
                task.status.as_str(),
                task.time_spent_minutes,
                ts(task.created_at),
                ts(task.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let conn = self.lock();
        let parts = conn
            .query_row(
                "SELECT * FROM tasks WHERE user_id = ?1 AND id = ?2",
                params![user_id, task_id],
                task_from_row,
            )
            .optional()?;
        parts.map(finish_task).transpose()
    }

    fn active_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM tasks
             WHERE user_id = ?1 AND status != 'completed'
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![user_id], task_from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(finish_task(row?)?);
        }
        Ok(tasks)
    }

    fn accrue_time(&self, user_id: &str, task_id: &str, minutes: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE tasks
             SET time_spent_minutes = time_spent_minutes + ?3, updated_at = ?4
             WHERE user_id = ?1 AND id = ?2",
            params![user_id, task_id, minutes, ts(Utc::now())],
        )?;
        Ok(())
    }
}

impl PreferenceStore for Database {
    fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        let conn = self.lock();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM preferences WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(Into::into))
            .transpose()
    }

    fn put_preferences(&self, user_id: &str, prefs: &Preferences) -> Result<()> {
        let conn = self.lock();
        let data = serde_json::to_string(prefs)?;
        conn.execute(
            "INSERT OR REPLACE INTO preferences (user_id, data) VALUES (?1, ?2)",
            params![user_id, data],
        )?;
        Ok(())
    }
}

impl StressStore for Database {
    fn record_stress(&self, user_id: &str, signal: &StressSignal) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO stress_signals (user_id, objective_score, timestamp)
             VALUES (?1, ?2, ?3)",
            params![user_id, signal.objective_score, ts(signal.timestamp)],
        )?;
        Ok(())
    }

    fn latest_stress(&self, user_id: &str) -> Result<Option<StressSignal>> {
        let conn = self.lock();
        let row: Option<(f64, String)> = conn
            .query_row(
                "SELECT objective_score, timestamp FROM stress_signals
                 WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT 1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(score, when)| {
            Ok(StressSignal {
                objective_score: score,
                timestamp: parse_ts(&when)?,
            })
        })
        .transpose()
    }
}

impl PlanStore for Database {
    fn get_plan(&self, user_id: &str, date: NaiveDate) -> Result<Option<StudyPlan>> {
        let conn = self.lock();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM study_plans WHERE user_id = ?1 AND date = ?2",
                params![user_id, date.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(Into::into))
            .transpose()
    }

    fn upsert_plan(&self, plan: &StudyPlan) -> Result<()> {
        let conn = self.lock();
        let data = serde_json::to_string(plan)?;
        conn.execute(
            "INSERT OR REPLACE INTO study_plans (user_id, date, data) VALUES (?1, ?2, ?3)",
            params![plan.user_id, plan.date.to_string(), data],
        )?;
        Ok(())
    }

    fn delete_plan(&self, user_id: &str, date: NaiveDate) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM study_plans WHERE user_id = ?1 AND date = ?2",
            params![user_id, date.to_string()],
        )?;
        Ok(())
    }

    fn plans_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StudyPlan>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT data FROM study_plans
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![user_id, from.to_string(), to.to_string()],
            |row| row.get::<_, String>(0),
        )?;
        let mut plans = Vec::new();
        for row in rows {
            plans.push(serde_json::from_str(&row?)?);
        }
        Ok(plans)
    }

    fn find_plan_by_block(&self, user_id: &str, block_id: &str) -> Result<Option<StudyPlan>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT data FROM study_plans WHERE user_id = ?1 ORDER BY date")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            let plan: StudyPlan = serde_json::from_str(&row?)?;
            if plan.study_blocks.iter().any(|b| b.id == block_id) {
                return Ok(Some(plan));
            }
        }
        Ok(None)
    }
}

fn mapping_from_row(
    row: &Row<'_>,
) -> rusqlite::Result<(
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
)> {
    Ok((
        row.get("id")?,
        row.get("user_id")?,
        row.get("entity_kind")?,
        row.get("entity_id")?,
        row.get("google_event_id")?,
        row.get("google_calendar_id")?,
        row.get("last_synced_at")?,
        row.get("last_modified_local")?,
        row.get("last_modified_google")?,
        row.get("sync_state")?,
        row.get("version_hash")?,
        row.get("created_at")?,
    ))
}

#[allow(clippy::type_complexity)]
fn finish_mapping(
    parts: (
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        Option<String>,
        String,
        String,
        String,
    ),
) -> Result<EventMapping> {
    let (
        id,
        user_id,
        kind,
        entity_id,
        event_id,
        calendar_id,
        synced,
        local,
        google,
        state,
        hash,
        created,
    ) = parts;
    Ok(EventMapping {
        id,
        user_id,
        entity_kind: EntityKind::parse(&kind)?,
        entity_id,
        google_event_id: event_id,
        google_calendar_id: calendar_id,
        last_synced_at: parse_ts(&synced)?,
        last_modified_local: parse_ts(&local)?,
        last_modified_google: google.as_deref().map(parse_ts).transpose()?,
        sync_state: SyncState::parse(&state)?,
        version_hash: hash,
        created_at: parse_ts(&created)?,
    })
}

impl MappingStore for Database {
    fn get_mapping(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<EventMapping>> {
        let conn = self.lock();
        let parts = conn
            .query_row(
                "SELECT * FROM event_mappings
                 WHERE user_id = ?1 AND entity_kind = ?2 AND entity_id = ?3",
                params![user_id, kind.as_str(), entity_id],
                mapping_from_row,
            )
            .optional()?;
        parts.map(finish_mapping).transpose()
    }

    fn get_mapping_by_id(&self, mapping_id: &str) -> Result<Option<EventMapping>> {
        let conn = self.lock();
        let parts = conn
            .query_row(
                "SELECT * FROM event_mappings WHERE id = ?1",
                params![mapping_id],
                mapping_from_row,
            )
            .optional()?;
        parts.map(finish_mapping).transpose()
    }

    fn get_mapping_by_event(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Option<EventMapping>> {
        let conn = self.lock();
        let parts = conn
            .query_row(
                "SELECT * FROM event_mappings
                 WHERE user_id = ?1 AND google_event_id = ?2",
                params![user_id, event_id],
                mapping_from_row,
            )
            .optional()?;
        parts.map(finish_mapping).transpose()
    }

    fn upsert_mapping(&self, mapping: &EventMapping) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO event_mappings
             (id, user_id, entity_kind, entity_id, google_event_id, google_calendar_id,
              last_synced_at, last_modified_local, last_modified_google, sync_state,
              version_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (user_id, entity_kind, entity_id) DO UPDATE SET
                google_event_id = excluded.google_event_id,
                google_calendar_id = excluded.google_calendar_id,
                last_synced_at = excluded.last_synced_at,
                last_modified_local = excluded.last_modified_local,
                last_modified_google = excluded.last_modified_google,
                sync_state = excluded.sync_state,
                version_hash = excluded.version_hash",
            params![
                mapping.id,
                mapping.user_id,
                mapping.entity_kind.as_str(),
                mapping.entity_id,
                mapping.google_event_id,
                mapping.google_calendar_id,
                ts(mapping.last_synced_at),
                ts(mapping.last_modified_local),
                mapping.last_modified_google.map(ts),
                mapping.sync_state.as_str(),
                mapping.version_hash,
                ts(mapping.created_at),
            ],
        )?;
        Ok(())
    }

    fn delete_mapping(&self, mapping_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM event_mappings WHERE id = ?1",
            params![mapping_id],
        )?;
        Ok(())
    }

    fn delete_all_mappings(&self, user_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM event_mappings WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    fn list_mappings(&self, user_id: &str) -> Result<Vec<EventMapping>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM event_mappings WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![user_id], mapping_from_row)?;
        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(finish_mapping(row?)?);
        }
        Ok(mappings)
    }

    fn list_conflicts(&self, user_id: &str) -> Result<Vec<EventMapping>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM event_mappings
             WHERE user_id = ?1 AND sync_state = 'conflict'
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![user_id], mapping_from_row)?;
        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(finish_mapping(row?)?);
        }
        Ok(mappings)
    }

    fn count_mappings(&self, user_id: &str) -> Result<u64> {
        let conn = self.lock();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM event_mappings WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn count_conflicts(&self, user_id: &str) -> Result<u64> {
        let conn = self.lock();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM event_mappings
             WHERE user_id = ?1 AND sync_state = 'conflict'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl SyncConfigStore for Database {
    fn get_sync_config(&self, user_id: &str) -> Result<Option<CalendarSyncConfig>> {
        let conn = self.lock();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM sync_configs WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(Into::into))
            .transpose()
    }

    fn upsert_sync_config(&self, config: &CalendarSyncConfig) -> Result<()> {
        let conn = self.lock();
        let data = serde_json::to_string(config)?;
        conn.execute(
            "INSERT OR REPLACE INTO sync_configs (user_id, data) VALUES (?1, ?2)",
            params![config.user_id, data],
        )?;
        Ok(())
    }

    fn delete_sync_config(&self, user_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM sync_configs WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{DeadlineUrgency, SessionType, StudyBlock};

    fn sample_task(id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: Some("desc".to_string()),
            deadline: Some(now + chrono::Duration::days(3)),
            priority: TaskPriority::High,
            complexity_score: 7,
            estimated_hours: 2.5,
            status: TaskStatus::Todo,
            time_spent_minutes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_mapping(user: &str, entity_id: &str) -> EventMapping {
        let now = Utc::now();
        EventMapping {
            id: format!("map-{user}-{entity_id}"),
            user_id: user.to_string(),
            entity_kind: EntityKind::Task,
            entity_id: entity_id.to_string(),
            google_event_id: format!("evt-{entity_id}"),
            google_calendar_id: "primary".to_string(),
            last_synced_at: now,
            last_modified_local: now,
            last_modified_google: None,
            sync_state: SyncState::Synced,
            version_hash: "abc123".to_string(),
            created_at: now,
        }
    }

    #[test]
    fn open_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studyflow.db");
        {
            let db = Database::open(&path).unwrap();
            db.put_task("u1", &sample_task("t1")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.get_task("u1", "t1").unwrap().is_some());
    }

    #[test]
    fn task_round_trip() {
        let db = Database::open_memory().unwrap();
        let task = sample_task("t1");
        db.put_task("u1", &task).unwrap();

        let loaded = db.get_task("u1", "t1").unwrap().unwrap();
        assert_eq!(loaded.title, "Task t1");
        assert_eq!(loaded.priority, TaskPriority::High);
        assert_eq!(loaded.complexity_score, 7);
        assert!(loaded.deadline.is_some());

        assert!(db.get_task("u2", "t1").unwrap().is_none());
    }

    #[test]
    fn active_tasks_excludes_completed() {
        let db = Database::open_memory().unwrap();
        let mut a = sample_task("a");
        let mut b = sample_task("b");
        b.status = TaskStatus::Completed;
        a.status = TaskStatus::InProgress;
        db.put_task("u1", &a).unwrap();
        db.put_task("u1", &b).unwrap();

        let active = db.active_tasks("u1").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");
    }

    #[test]
    fn accrue_time_adds_minutes() {
        let db = Database::open_memory().unwrap();
        db.put_task("u1", &sample_task("t1")).unwrap();
        db.accrue_time("u1", "t1", 25).unwrap();
        db.accrue_time("u1", "t1", 30).unwrap();
        let task = db.get_task("u1", "t1").unwrap().unwrap();
        assert_eq!(task.time_spent_minutes, 55);
    }

    #[test]
    fn preferences_round_trip() {
        let db = Database::open_memory().unwrap();
        assert!(db.get_preferences("u1").unwrap().is_none());

        let mut prefs = Preferences::default();
        prefs.max_daily_study_hours = 6.0;
        db.put_preferences("u1", &prefs).unwrap();
        let loaded = db.get_preferences("u1").unwrap().unwrap();
        assert_eq!(loaded.max_daily_study_hours, 6.0);
    }

    #[test]
    fn latest_stress_wins() {
        let db = Database::open_memory().unwrap();
        let earlier = StressSignal {
            objective_score: 3.0,
            timestamp: Utc::now() - chrono::Duration::hours(2),
        };
        let later = StressSignal {
            objective_score: 7.5,
            timestamp: Utc::now(),
        };
        db.record_stress("u1", &earlier).unwrap();
        db.record_stress("u1", &later).unwrap();
        let latest = db.latest_stress("u1").unwrap().unwrap();
        assert_eq!(latest.objective_score, 7.5);
    }

    #[test]
    fn plan_round_trip_and_block_lookup() {
        let db = Database::open_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut plan = StudyPlan::empty("u1", date, 5.0, "test");
        plan.study_blocks.push(StudyBlock {
            id: "b1".to_string(),
            task_id: "t1".to_string(),
            task_title: "Algebra".to_string(),
            start_time: "09:00".to_string(),
            end_time: "09:25".to_string(),
            duration_minutes: 25,
            session_type: SessionType::Pomodoro,
            complexity: 5,
            priority: TaskPriority::Medium,
            deadline_urgency: DeadlineUrgency::Flexible,
            completed: false,
            notes: None,
        });
        db.upsert_plan(&plan).unwrap();

        let loaded = db.get_plan("u1", date).unwrap().unwrap();
        assert_eq!(loaded.study_blocks.len(), 1);

        let by_block = db.find_plan_by_block("u1", "b1").unwrap().unwrap();
        assert_eq!(by_block.date, date);
        assert!(db.find_plan_by_block("u1", "missing").unwrap().is_none());

        db.delete_plan("u1", date).unwrap();
        assert!(db.get_plan("u1", date).unwrap().is_none());
    }

    #[test]
    fn plans_in_range_is_inclusive_and_ordered() {
        let db = Database::open_memory().unwrap();
        for day in [1, 3, 5] {
            let date = NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
            db.upsert_plan(&StudyPlan::empty("u1", date, 5.0, "test"))
                .unwrap();
        }
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let plans = db.plans_in_range("u1", from, to).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].date.to_string(), "2026-03-01");
        assert_eq!(plans[1].date.to_string(), "2026-03-03");
    }

    #[test]
    fn mapping_upsert_replaces_by_entity_key() {
        let db = Database::open_memory().unwrap();
        let mut mapping = sample_mapping("u1", "t1");
        db.upsert_mapping(&mapping).unwrap();

        mapping.version_hash = "def456".to_string();
        mapping.sync_state = SyncState::Conflict;
        db.upsert_mapping(&mapping).unwrap();

        assert_eq!(db.count_mappings("u1").unwrap(), 1);
        assert_eq!(db.count_conflicts("u1").unwrap(), 1);
        let loaded = db
            .get_mapping("u1", EntityKind::Task, "t1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version_hash, "def456");
        assert_eq!(loaded.sync_state, SyncState::Conflict);
    }

    #[test]
    fn mapping_lookups_and_disconnect() {
        let db = Database::open_memory().unwrap();
        db.upsert_mapping(&sample_mapping("u1", "t1")).unwrap();
        db.upsert_mapping(&sample_mapping("u1", "t2")).unwrap();
        db.upsert_mapping(&sample_mapping("u2", "t1")).unwrap();

        let by_event = db.get_mapping_by_event("u1", "evt-t1").unwrap().unwrap();
        assert_eq!(by_event.entity_id, "t1");
        let by_id = db.get_mapping_by_id("map-u1-t2").unwrap();
        assert!(by_id.is_some());

        db.delete_all_mappings("u1").unwrap();
        assert_eq!(db.count_mappings("u1").unwrap(), 0);
        assert_eq!(db.count_mappings("u2").unwrap(), 1);
    }

    #[test]
    fn sync_config_round_trip() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let config = CalendarSyncConfig {
            user_id: "u1".to_string(),
            sync_enabled: true,
            google_calendar_id: "primary".to_string(),
            encrypted_credentials: "ciphertext".to_string(),
            preferences: Default::default(),
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        };
        db.upsert_sync_config(&config).unwrap();
        let loaded = db.get_sync_config("u1").unwrap().unwrap();
        assert!(loaded.sync_enabled);
        assert_eq!(loaded.google_calendar_id, "primary");

        db.delete_sync_config("u1").unwrap();
        assert!(db.get_sync_config("u1").unwrap().is_none());
    }
}
