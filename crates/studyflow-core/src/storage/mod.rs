//! Persistence traits and the SQLite implementation.
//!
//! Higher layers depend on these traits so tests can run against an
//! in-memory database. [`Database`] implements every store.

mod database;

pub use database::Database;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{Preferences, StressSignal, Task};
use crate::plan::StudyPlan;
use crate::sync::types::{CalendarSyncConfig, EntityKind, EventMapping};

/// Task persistence.
pub trait TaskStore: Send + Sync {
    /// Insert or replace a task.
    fn put_task(&self, user_id: &str, task: &Task) -> Result<()>;

    /// Fetch one task.
    fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// All non-completed tasks for a user.
    fn active_tasks(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Add study minutes to a task's running total.
    fn accrue_time(&self, user_id: &str, task_id: &str, minutes: i64) -> Result<()>;
}

/// Scheduling preference persistence.
pub trait PreferenceStore: Send + Sync {
    fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>>;
    fn put_preferences(&self, user_id: &str, prefs: &Preferences) -> Result<()>;
}

/// Stress signal persistence.
pub trait StressStore: Send + Sync {
    fn record_stress(&self, user_id: &str, signal: &StressSignal) -> Result<()>;

    /// Most recent signal for a user, if any.
    fn latest_stress(&self, user_id: &str) -> Result<Option<StressSignal>>;
}

/// Study plan persistence, keyed by (user, date).
pub trait PlanStore: Send + Sync {
    fn get_plan(&self, user_id: &str, date: NaiveDate) -> Result<Option<StudyPlan>>;
    fn upsert_plan(&self, plan: &StudyPlan) -> Result<()>;
    fn delete_plan(&self, user_id: &str, date: NaiveDate) -> Result<()>;

    /// Plans for a user over an inclusive date range.
    fn plans_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StudyPlan>>;

    /// Locate the plan containing a study block.
    fn find_plan_by_block(&self, user_id: &str, block_id: &str) -> Result<Option<StudyPlan>>;
}

/// Event mapping persistence for calendar sync.
pub trait MappingStore: Send + Sync {
    fn get_mapping(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<EventMapping>>;

    fn get_mapping_by_id(&self, mapping_id: &str) -> Result<Option<EventMapping>>;

    fn get_mapping_by_event(&self, user_id: &str, event_id: &str)
        -> Result<Option<EventMapping>>;

    /// Insert or replace a mapping by its (user, kind, entity) key.
    fn upsert_mapping(&self, mapping: &EventMapping) -> Result<()>;

    fn delete_mapping(&self, mapping_id: &str) -> Result<()>;

    /// Remove every mapping for a user (disconnect).
    fn delete_all_mappings(&self, user_id: &str) -> Result<()>;

    fn list_mappings(&self, user_id: &str) -> Result<Vec<EventMapping>>;

    fn list_conflicts(&self, user_id: &str) -> Result<Vec<EventMapping>>;

    fn count_mappings(&self, user_id: &str) -> Result<u64>;

    fn count_conflicts(&self, user_id: &str) -> Result<u64>;
}

/// Calendar connection persistence.
pub trait SyncConfigStore: Send + Sync {
    fn get_sync_config(&self, user_id: &str) -> Result<Option<CalendarSyncConfig>>;
    fn upsert_sync_config(&self, config: &CalendarSyncConfig) -> Result<()>;
    fn delete_sync_config(&self, user_id: &str) -> Result<()>;
}
