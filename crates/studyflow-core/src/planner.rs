//! Study plan lifecycle: generation, mutation, quick rescheduling, and
//! statistics.
//!
//! All plan writes for one (user, date) pair go through a shared lock so
//! concurrent mutations never lose updates to read-modify-write races.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{NotFoundError, Result, ValidationError};
use crate::model::{Preferences, StressSignal, DEFAULT_STRESS_LEVEL};
use crate::plan::{
    duration_between, round_hours, ChangeType, SessionType, StudyBlock, StudyPlan,
};
use crate::scheduler::scoring::{classify_urgency, days_until_deadline};
use crate::scheduler::ScheduleAssembler;
use crate::storage::{PlanStore, PreferenceStore, StressStore, TaskStore};

/// Why a user wants a task moved off its current blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleReason {
    TooStressed,
    NoTime,
    PriorityChange,
    CompletedEarly,
}

impl RescheduleReason {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "too_stressed" => Ok(RescheduleReason::TooStressed),
            "no_time" => Ok(RescheduleReason::NoTime),
            "priority_change" => Ok(RescheduleReason::PriorityChange),
            "completed_early" => Ok(RescheduleReason::CompletedEarly),
            other => Err(ValidationError::InvalidValue {
                field: "reason".to_string(),
                message: format!("unknown reschedule reason '{other}'"),
            }
            .into()),
        }
    }
}

/// Manual block creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBlock {
    pub task_id: String,
    pub start_time: String,
    pub end_time: String,
    pub session_type: SessionType,
}

/// Partial block update; `None` fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockPatch {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub session_type: Option<SessionType>,
    pub completed: Option<bool>,
    pub notes: Option<String>,
}

/// Result of a quick reschedule.
#[derive(Debug, Clone, Serialize)]
pub struct RescheduleOutcome {
    pub rescheduled: bool,
    pub affected_blocks: usize,
    pub message: String,
}

/// Aggregate planner statistics over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerStats {
    pub days_analyzed: u32,
    pub plans_count: usize,
    pub total_planned_hours: f64,
    pub total_blocks: usize,
    pub completed_blocks: usize,
    pub completion_rate: f64,
    pub average_daily_hours: f64,
}

type PlanKey = (String, NaiveDate);

/// Orchestrates plan generation and mutation on top of the stores.
pub struct StudyPlanner {
    tasks: Arc<dyn TaskStore>,
    prefs: Arc<dyn PreferenceStore>,
    stress: Arc<dyn StressStore>,
    plans: Arc<dyn PlanStore>,
    assembler: ScheduleAssembler,
    plan_locks: Mutex<HashMap<PlanKey, Arc<Mutex<()>>>>,
}

impl StudyPlanner {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        prefs: Arc<dyn PreferenceStore>,
        stress: Arc<dyn StressStore>,
        plans: Arc<dyn PlanStore>,
        assembler: ScheduleAssembler,
    ) -> Self {
        Self {
            tasks,
            prefs,
            stress,
            plans,
            assembler,
            plan_locks: Mutex::new(HashMap::new()),
        }
    }

    fn plan_lock(&self, user_id: &str, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut locks = self.plan_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((user_id.to_string(), date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Preferences for a user, defaulting when none are stored.
    pub fn preferences(&self, user_id: &str) -> Result<Preferences> {
        Ok(self.prefs.get_preferences(user_id)?.unwrap_or_default())
    }

    pub fn update_preferences(&self, user_id: &str, prefs: &Preferences) -> Result<()> {
        self.prefs.put_preferences(user_id, prefs)
    }

    /// Record a stress signal for use by future generations.
    pub fn record_stress(&self, user_id: &str, objective_score: f64) -> Result<()> {
        if !(0.0..=10.0).contains(&objective_score) {
            return Err(ValidationError::InvalidValue {
                field: "objective_score".to_string(),
                message: format!("expected 0-10, got {objective_score}"),
            }
            .into());
        }
        self.stress.record_stress(
            user_id,
            &StressSignal {
                objective_score,
                timestamp: Utc::now(),
            },
        )
    }

    fn current_stress(&self, user_id: &str) -> Result<f64> {
        Ok(self
            .stress
            .latest_stress(user_id)?
            .map(|s| s.objective_score)
            .unwrap_or(DEFAULT_STRESS_LEVEL))
    }

    /// Generate (or return) the plan for a date.
    ///
    /// An existing plan is returned as-is unless `regenerate` is set,
    /// in which case it is rebuilt and replaced. Generation holds the
    /// per-(user, date) lock so concurrent calls produce one plan.
    pub fn generate(&self, user_id: &str, date: NaiveDate, regenerate: bool) -> Result<StudyPlan> {
        let lock = self.plan_lock(user_id, date);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        if !regenerate {
            if let Some(existing) = self.plans.get_plan(user_id, date)? {
                return Ok(existing);
            }
        }

        let tasks = self.tasks.active_tasks(user_id)?;
        let prefs = self.preferences(user_id)?;
        let stress = self.current_stress(user_id)?;

        let generated = self.assembler.assemble(&tasks, &prefs, stress, date);
        let plan = StudyPlan {
            user_id: user_id.to_string(),
            date,
            generated_at: Utc::now(),
            stress_level_at_generation: stress,
            study_blocks: generated.study_blocks,
            break_blocks: generated.break_blocks,
            total_study_hours: generated.total_study_hours,
            ai_reasoning: generated.ai_reasoning,
            user_approved: false,
            modifications: Vec::new(),
        };
        self.plans.upsert_plan(&plan)?;
        log::info!(
            "generated plan for {user_id} on {date}: {} blocks ({})",
            plan.study_blocks.len(),
            if generated.used_model { "model" } else { "fallback" },
        );
        Ok(plan)
    }

    /// Generate plans for consecutive days starting at `from`.
    pub fn generate_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        days: u32,
        regenerate: bool,
    ) -> Result<Vec<StudyPlan>> {
        let mut plans = Vec::with_capacity(days as usize);
        for offset in 0..days {
            let date = from + Duration::days(offset as i64);
            plans.push(self.generate(user_id, date, regenerate)?);
        }
        Ok(plans)
    }

    /// Fetch the stored plan for a date.
    pub fn get_plan(&self, user_id: &str, date: NaiveDate) -> Result<StudyPlan> {
        self.plans
            .get_plan(user_id, date)?
            .ok_or_else(|| NotFoundError::Plan {
                user_id: user_id.to_string(),
                date: date.to_string(),
            }
            .into())
    }

    /// Plans over an inclusive date range.
    pub fn plans_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StudyPlan>> {
        self.plans.plans_in_range(user_id, from, to)
    }

    /// Manually add a study block to an existing plan.
    ///
    /// The block's title is taken from the referenced task; blocks stay
    /// sorted by start time and the daily total is recomputed.
    pub fn add_block(&self, user_id: &str, date: NaiveDate, new: &NewBlock) -> Result<StudyBlock> {
        let duration = duration_between(&new.start_time, &new.end_time)?;
        let task = self
            .tasks
            .get_task(user_id, &new.task_id)?
            .ok_or_else(|| NotFoundError::Task(new.task_id.clone()))?;

        let lock = self.plan_lock(user_id, date);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut plan = self.get_plan(user_id, date)?;
        let block = StudyBlock {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            start_time: new.start_time.clone(),
            end_time: new.end_time.clone(),
            duration_minutes: duration,
            session_type: new.session_type,
            complexity: task.complexity_score,
            priority: task.priority,
            deadline_urgency: classify_urgency(days_until_deadline(task.deadline, Utc::now())),
            completed: false,
            notes: None,
        };
        plan.study_blocks.push(block.clone());
        plan.sort_blocks();
        plan.recompute_total_hours();
        plan.log_modification(
            ChangeType::Add,
            &block.id,
            Some(format!("Added block for {}", task.title)),
        );
        self.plans.upsert_plan(&plan)?;
        Ok(block)
    }

    /// Apply a partial update to a block.
    pub fn update_block(
        &self,
        user_id: &str,
        date: NaiveDate,
        block_id: &str,
        patch: &BlockPatch,
    ) -> Result<StudyPlan> {
        let lock = self.plan_lock(user_id, date);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut plan = self.get_plan(user_id, date)?;
        {
            let block = plan
                .block_mut(block_id)
                .ok_or_else(|| NotFoundError::Block(block_id.to_string()))?;
            if let Some(start) = &patch.start_time {
                block.start_time = start.clone();
            }
            if let Some(end) = &patch.end_time {
                block.end_time = end.clone();
            }
            block.duration_minutes = duration_between(&block.start_time, &block.end_time)?;
            if let Some(session_type) = patch.session_type {
                block.session_type = session_type;
            }
            if let Some(completed) = patch.completed {
                // Completion via patch does not credit task time; use
                // complete_block for that.
                block.completed = completed;
            }
            if let Some(notes) = &patch.notes {
                block.notes = Some(notes.clone());
            }
        }
        plan.sort_blocks();
        plan.recompute_total_hours();
        plan.log_modification(ChangeType::Update, block_id, None);
        self.plans.upsert_plan(&plan)?;
        Ok(plan)
    }

    /// Mark a block completed, crediting its minutes to the linked task.
    pub fn complete_block(&self, user_id: &str, date: NaiveDate, block_id: &str) -> Result<u32> {
        let lock = self.plan_lock(user_id, date);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut plan = self.get_plan(user_id, date)?;
        let (task_id, duration) = {
            let block = plan
                .block_mut(block_id)
                .ok_or_else(|| NotFoundError::Block(block_id.to_string()))?;
            block.completed = true;
            (block.task_id.clone(), block.duration_minutes)
        };

        if !task_id.is_empty() {
            if let Err(e) = self.tasks.accrue_time(user_id, &task_id, duration as i64) {
                // The linked task may have been deleted since generation.
                log::warn!("could not credit {duration} minutes to task {task_id}: {e}");
            }
        }

        plan.recompute_total_hours();
        plan.log_modification(ChangeType::Complete, block_id, None);
        self.plans.upsert_plan(&plan)?;
        Ok(duration)
    }

    /// Remove a block from a plan.
    pub fn remove_block(&self, user_id: &str, date: NaiveDate, block_id: &str) -> Result<()> {
        let lock = self.plan_lock(user_id, date);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut plan = self.get_plan(user_id, date)?;
        let before = plan.study_blocks.len();
        plan.study_blocks.retain(|b| b.id != block_id);
        if plan.study_blocks.len() == before {
            return Err(NotFoundError::Block(block_id.to_string()).into());
        }
        plan.recompute_total_hours();
        plan.log_modification(ChangeType::Remove, block_id, None);
        self.plans.upsert_plan(&plan)
    }

    /// Rework today's pending blocks for a task based on the reason:
    /// stress removes them, lack of time pushes them to the end of the
    /// day, a priority change only records the signal, and early
    /// completion marks them done.
    pub fn quick_reschedule(
        &self,
        user_id: &str,
        date: NaiveDate,
        task_id: &str,
        reason: RescheduleReason,
    ) -> Result<RescheduleOutcome> {
        let lock = self.plan_lock(user_id, date);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut plan = self.get_plan(user_id, date)?;
        let affected: Vec<String> = plan
            .study_blocks
            .iter()
            .filter(|b| b.task_id == task_id && !b.completed)
            .map(|b| b.id.clone())
            .collect();

        if affected.is_empty() {
            return Ok(RescheduleOutcome {
                rescheduled: false,
                affected_blocks: 0,
                message: "No pending blocks found for this task today".to_string(),
            });
        }

        let message = match reason {
            RescheduleReason::TooStressed => {
                plan.study_blocks
                    .retain(|b| b.task_id != task_id || b.completed);
                "Removed from today's schedule. Consider scheduling for tomorrow.".to_string()
            }
            RescheduleReason::NoTime => {
                let mut latest_end = plan
                    .study_blocks
                    .iter()
                    .filter(|b| b.task_id != task_id)
                    .map(|b| b.end_time.clone())
                    .max()
                    .unwrap_or_else(|| "18:00".to_string());
                for block in plan
                    .study_blocks
                    .iter_mut()
                    .filter(|b| b.task_id == task_id && !b.completed)
                {
                    block.start_time = latest_end.clone();
                    block.end_time = crate::plan::add_minutes(
                        &block.start_time,
                        block.duration_minutes as i64,
                    )?;
                    latest_end = block.end_time.clone();
                }
                plan.sort_blocks();
                "Moved to end of schedule.".to_string()
            }
            RescheduleReason::PriorityChange => {
                "Task priority noted. Consider regenerating the schedule.".to_string()
            }
            RescheduleReason::CompletedEarly => {
                for block in plan
                    .study_blocks
                    .iter_mut()
                    .filter(|b| b.task_id == task_id && !b.completed)
                {
                    block.completed = true;
                }
                "All blocks marked as completed.".to_string()
            }
        };

        // Unlike other mutations, rescheduling reports only the work
        // still pending for the day.
        let pending: u32 = plan
            .study_blocks
            .iter()
            .filter(|b| !b.completed)
            .map(|b| b.duration_minutes)
            .sum();
        plan.total_study_hours = round_hours(pending);
        plan.log_modification(
            ChangeType::Reschedule,
            task_id,
            Some(format!("Quick reschedule: {reason:?}")),
        );
        self.plans.upsert_plan(&plan)?;
        Ok(RescheduleOutcome {
            rescheduled: true,
            affected_blocks: affected.len(),
            message,
        })
    }

    /// Planner statistics over the trailing `days` window ending today.
    pub fn stats(&self, user_id: &str, days: u32) -> Result<PlannerStats> {
        let today = Utc::now().date_naive();
        let from = today - Duration::days(days as i64);
        let plans = self.plans.plans_in_range(user_id, from, today)?;

        let mut total_planned_hours = 0.0;
        let mut total_blocks = 0usize;
        let mut completed_blocks = 0usize;
        for plan in &plans {
            total_planned_hours += plan.total_study_hours;
            total_blocks += plan.study_blocks.len();
            completed_blocks += plan.study_blocks.iter().filter(|b| b.completed).count();
        }

        let completion_rate = if total_blocks > 0 {
            (completed_blocks as f64 / total_blocks as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let average_daily_hours = if plans.is_empty() {
            0.0
        } else {
            (total_planned_hours / plans.len() as f64 * 10.0).round() / 10.0
        };

        Ok(PlannerStats {
            days_analyzed: days,
            plans_count: plans.len(),
            total_planned_hours: (total_planned_hours * 10.0).round() / 10.0,
            total_blocks,
            completed_blocks,
            completion_rate,
            average_daily_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Result as CoreResult, UpstreamError};
    use crate::model::{Task, TaskPriority, TaskStatus};
    use crate::scheduler::ScheduleModel;
    use crate::storage::Database;

    struct UnreachableModel;

    impl ScheduleModel for UnreachableModel {
        fn complete(&self, _prompt: &str) -> CoreResult<String> {
            Err(UpstreamError::Model("unreachable".to_string()).into())
        }
    }

    fn planner() -> (StudyPlanner, Arc<Database>) {
        let db = Arc::new(Database::open_memory().unwrap());
        let assembler = ScheduleAssembler::new(Arc::new(UnreachableModel));
        let planner = StudyPlanner::new(
            db.clone(),
            db.clone(),
            db.clone(),
            db.clone(),
            assembler,
        );
        (planner, db)
    }

    fn seed_task(db: &Database, id: &str, title: &str) {
        let now = Utc::now();
        let task = Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            deadline: Some(now + Duration::days(2)),
            priority: TaskPriority::High,
            complexity_score: 5,
            estimated_hours: 2.0,
            status: TaskStatus::Todo,
            time_spent_minutes: 0,
            created_at: now,
            updated_at: now,
        };
        db.put_task("u1", &task).unwrap();
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn no_tasks_yields_valid_empty_plan() {
        let (planner, _db) = planner();
        let plan = planner.generate("u1", date(), false).unwrap();
        assert!(plan.study_blocks.is_empty());
        assert_eq!(plan.total_study_hours, 0.0);
        assert!(!plan.ai_reasoning.is_empty());

        // The empty plan is persisted and returned on re-request.
        let again = planner.generate("u1", date(), false).unwrap();
        assert_eq!(again.generated_at, plan.generated_at);
    }

    #[test]
    fn generate_is_idempotent_until_regenerate() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");

        let first = planner.generate("u1", date(), false).unwrap();
        assert!(!first.study_blocks.is_empty());

        let cached = planner.generate("u1", date(), false).unwrap();
        assert_eq!(cached.generated_at, first.generated_at);

        let rebuilt = planner.generate("u1", date(), true).unwrap();
        assert!(rebuilt.generated_at > first.generated_at);
    }

    #[test]
    fn generate_range_covers_consecutive_days() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        let plans = planner.generate_range("u1", date(), 3, false).unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].date, date());
        assert_eq!(plans[2].date, date() + Duration::days(2));
    }

    #[test]
    fn add_block_keeps_totals_and_order_consistent() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        let plan = planner.generate("u1", date(), false).unwrap();
        let before_total = plan.total_study_hours;

        let block = planner
            .add_block(
                "u1",
                date(),
                &NewBlock {
                    task_id: "t1".to_string(),
                    start_time: "20:00".to_string(),
                    end_time: "20:30".to_string(),
                    session_type: SessionType::Pomodoro,
                },
            )
            .unwrap();
        assert_eq!(block.duration_minutes, 30);
        assert_eq!(block.task_title, "Algebra");

        let plan = planner.get_plan("u1", date()).unwrap();
        assert_eq!(plan.total_study_hours, before_total + 0.5);
        let starts: Vec<&str> = plan.study_blocks.iter().map(|b| b.start_time.as_str()).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(plan.modifications.last().unwrap().change_type, ChangeType::Add);
    }

    #[test]
    fn add_block_rejects_bad_input() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        planner.generate("u1", date(), false).unwrap();

        let inverted = NewBlock {
            task_id: "t1".to_string(),
            start_time: "20:30".to_string(),
            end_time: "20:00".to_string(),
            session_type: SessionType::Pomodoro,
        };
        assert!(matches!(
            planner.add_block("u1", date(), &inverted).unwrap_err(),
            CoreError::Validation(_)
        ));

        let missing_task = NewBlock {
            task_id: "nope".to_string(),
            start_time: "20:00".to_string(),
            end_time: "20:30".to_string(),
            session_type: SessionType::Pomodoro,
        };
        assert!(matches!(
            planner.add_block("u1", date(), &missing_task).unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn update_block_patches_window_and_logs_change() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        let plan = planner.generate("u1", date(), false).unwrap();
        let block_id = plan.study_blocks[0].id.clone();

        let patch = BlockPatch {
            start_time: Some("20:00".to_string()),
            end_time: Some("21:00".to_string()),
            notes: Some("moved to the evening".to_string()),
            ..BlockPatch::default()
        };
        let plan = planner.update_block("u1", date(), &block_id, &patch).unwrap();

        let block = plan.study_blocks.iter().find(|b| b.id == block_id).unwrap();
        assert_eq!(block.start_time, "20:00");
        assert_eq!(block.duration_minutes, 60);
        assert_eq!(block.notes.as_deref(), Some("moved to the evening"));
        assert_eq!(
            plan.modifications.last().unwrap().change_type,
            ChangeType::Update
        );

        // Marking completed through a patch does not credit task time.
        let patch = BlockPatch {
            completed: Some(true),
            ..BlockPatch::default()
        };
        planner.update_block("u1", date(), &block_id, &patch).unwrap();
        let task = db.get_task("u1", "t1").unwrap().unwrap();
        assert_eq!(task.time_spent_minutes, 0);
    }

    #[test]
    fn complete_block_credits_task_time() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        let plan = planner.generate("u1", date(), false).unwrap();
        let block = &plan.study_blocks[0];

        let credited = planner.complete_block("u1", date(), &block.id).unwrap();
        assert_eq!(credited, block.duration_minutes);

        let task = db.get_task("u1", "t1").unwrap().unwrap();
        assert_eq!(task.time_spent_minutes, block.duration_minutes as i64);

        // Completing a block leaves the daily total untouched.
        let plan = planner.get_plan("u1", date()).unwrap();
        let all: u32 = plan.study_blocks.iter().map(|b| b.duration_minutes).sum();
        assert_eq!(plan.total_study_hours, crate::plan::round_hours(all));
    }

    #[test]
    fn remove_block_updates_totals() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        let plan = planner.generate("u1", date(), false).unwrap();
        let block_id = plan.study_blocks[0].id.clone();

        planner.remove_block("u1", date(), &block_id).unwrap();
        let plan = planner.get_plan("u1", date()).unwrap();
        assert!(plan.study_blocks.iter().all(|b| b.id != block_id));
        assert!(planner.remove_block("u1", date(), &block_id).is_err());
    }

    #[test]
    fn quick_reschedule_no_time_moves_blocks_to_end() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        seed_task(&db, "t2", "Chemistry");
        let plan = planner.generate("u1", date(), false).unwrap();
        assert!(plan.study_blocks.iter().any(|b| b.task_id == "t1"));

        let outcome = planner
            .quick_reschedule("u1", date(), "t1", RescheduleReason::NoTime)
            .unwrap();
        assert!(outcome.rescheduled);

        let plan = planner.get_plan("u1", date()).unwrap();
        let other_max = plan
            .study_blocks
            .iter()
            .filter(|b| b.task_id != "t1")
            .map(|b| b.end_time.clone())
            .max()
            .unwrap();
        for block in plan.study_blocks.iter().filter(|b| b.task_id == "t1") {
            assert!(block.start_time >= other_max);
        }
    }

    #[test]
    fn quick_reschedule_too_stressed_removes_pending_blocks() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        planner.generate("u1", date(), false).unwrap();

        let outcome = planner
            .quick_reschedule("u1", date(), "t1", RescheduleReason::TooStressed)
            .unwrap();
        assert!(outcome.rescheduled);
        assert!(outcome.affected_blocks > 0);

        let plan = planner.get_plan("u1", date()).unwrap();
        assert!(plan.study_blocks.iter().all(|b| b.task_id != "t1"));
        assert_eq!(plan.total_study_hours, 0.0);

        // Second call finds nothing pending.
        let repeat = planner
            .quick_reschedule("u1", date(), "t1", RescheduleReason::TooStressed)
            .unwrap();
        assert!(!repeat.rescheduled);
    }

    #[test]
    fn quick_reschedule_completed_early_reports_pending_hours_only() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        planner.generate("u1", date(), false).unwrap();

        let outcome = planner
            .quick_reschedule("u1", date(), "t1", RescheduleReason::CompletedEarly)
            .unwrap();
        assert!(outcome.rescheduled);

        // All blocks stay in the plan, marked done, but the reschedule
        // total counts only pending work.
        let plan = planner.get_plan("u1", date()).unwrap();
        assert!(!plan.study_blocks.is_empty());
        assert!(plan.study_blocks.iter().all(|b| b.completed));
        assert_eq!(plan.total_study_hours, 0.0);
    }

    #[test]
    fn stress_signal_validation_and_effect() {
        let (planner, db) = planner();
        assert!(planner.record_stress("u1", 11.0).is_err());
        assert!(planner.record_stress("u1", -0.1).is_err());
        planner.record_stress("u1", 8.5).unwrap();

        seed_task(&db, "t1", "Algebra");
        let plan = planner.generate("u1", date(), false).unwrap();
        assert_eq!(plan.stress_level_at_generation, 8.5);
        // Severe stress caps session length.
        assert!(plan.study_blocks.iter().all(|b| b.duration_minutes <= 20));
    }

    #[test]
    fn stats_aggregate_over_window() {
        let (planner, db) = planner();
        seed_task(&db, "t1", "Algebra");
        let today = Utc::now().date_naive();
        let plan = planner.generate("u1", today, false).unwrap();
        planner
            .complete_block("u1", today, &plan.study_blocks[0].id)
            .unwrap();

        let stats = planner.stats("u1", 7).unwrap();
        assert_eq!(stats.plans_count, 1);
        assert_eq!(stats.total_blocks, plan.study_blocks.len());
        assert_eq!(stats.completed_blocks, 1);
        assert!(stats.completion_rate > 0.0);
    }
}
