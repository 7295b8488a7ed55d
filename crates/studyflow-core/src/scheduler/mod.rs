//! Schedule generation pipeline.
//!
//! Scoring, slot calculation, and session selection are pure functions;
//! [`ScheduleAssembler`] composes them, attempting the AI path first and
//! degrading silently to the deterministic fallback.

pub mod ai;
pub mod fallback;
pub mod scoring;
pub mod session;
pub mod slots;

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{Preferences, Task};
use crate::plan::{
    duration_between, round_hours, BreakBlock, BreakType, SessionType, StudyBlock,
};

pub use ai::{build_prompt, match_block_to_task, parse_model_schedule, OllamaModel, ParseError, ParsedSchedule, ScheduleModel};
pub use fallback::{fallback_schedule, FallbackSchedule};
pub use scoring::{score_task, score_tasks, ScoredTask};
pub use session::{select_session_type, session_duration};
pub use slots::{available_slots, TimeSlot, SLOT_MINUTES};

/// The output of one generation run, before persistence.
#[derive(Debug, Clone)]
pub struct GeneratedSchedule {
    pub study_blocks: Vec<StudyBlock>,
    pub break_blocks: Vec<BreakBlock>,
    pub total_study_hours: f64,
    pub ai_reasoning: String,
    /// Whether the model produced this schedule (false = fallback).
    pub used_model: bool,
}

impl GeneratedSchedule {
    fn empty(reasoning: &str) -> Self {
        Self {
            study_blocks: Vec::new(),
            break_blocks: Vec::new(),
            total_study_hours: 0.0,
            ai_reasoning: reasoning.to_string(),
            used_model: false,
        }
    }
}

/// Composes scoring, availability, and block assembly into a schedule.
pub struct ScheduleAssembler {
    model: Arc<dyn ScheduleModel>,
}

impl ScheduleAssembler {
    pub fn new(model: Arc<dyn ScheduleModel>) -> Self {
        Self { model }
    }

    /// Generate a schedule for `date`.
    ///
    /// Tries the model first; any transport or parse failure is logged
    /// and the deterministic fallback runs instead. Never errors on
    /// model problems.
    pub fn assemble(
        &self,
        tasks: &[Task],
        prefs: &Preferences,
        stress_level: f64,
        date: NaiveDate,
    ) -> GeneratedSchedule {
        if tasks.is_empty() {
            return GeneratedSchedule::empty("No active tasks to schedule.");
        }

        let slots = available_slots(prefs, date);
        if slots.is_empty() {
            return GeneratedSchedule::empty(
                "No available time slots within the configured study hours.",
            );
        }

        let scored = score_tasks(tasks, stress_level, Utc::now());

        match self.try_model(&scored, &slots, prefs, stress_level, date) {
            Ok(schedule) => schedule,
            Err(reason) => {
                log::warn!("model schedule unavailable ({reason}); using fallback");
                let fb = fallback_schedule(&scored, &slots, prefs, stress_level);
                let reasoning = format!(
                    "Schedule generated by deterministic fallback: {} study blocks \
                     placed by scheduling score within the available slots.",
                    fb.study_blocks.len()
                );
                GeneratedSchedule {
                    study_blocks: fb.study_blocks,
                    break_blocks: fb.break_blocks,
                    total_study_hours: fb.total_study_hours,
                    ai_reasoning: reasoning,
                    used_model: false,
                }
            }
        }
    }

    fn try_model(
        &self,
        scored: &[ScoredTask],
        slots: &[TimeSlot],
        prefs: &Preferences,
        stress_level: f64,
        date: NaiveDate,
    ) -> Result<GeneratedSchedule, String> {
        let prompt = build_prompt(scored, slots, prefs, stress_level, date);
        let raw = self.model.complete(&prompt).map_err(|e| e.to_string())?;
        let parsed = parse_model_schedule(&raw).map_err(|e| e.to_string())?;
        Ok(realize_parsed(parsed, scored))
    }
}

/// Turn a validated model schedule into persistable blocks: assign ids,
/// derive missing durations, and link titles back to task ids. Blocks
/// whose title matches no task stay unlinked with an empty task id.
fn realize_parsed(parsed: ParsedSchedule, scored: &[ScoredTask]) -> GeneratedSchedule {
    let mut study_blocks = Vec::with_capacity(parsed.study_blocks.len());
    for pb in parsed.study_blocks {
        let duration = pb.duration_minutes.or_else(|| {
            duration_between(&pb.start_time, &pb.end_time).ok()
        });
        let Some(duration) = duration else {
            log::warn!(
                "dropping model block '{}': unusable time range {}..{}",
                pb.task_title,
                pb.start_time,
                pb.end_time
            );
            continue;
        };
        let session_type = match pb.session_type.as_str() {
            "deep_work" => SessionType::DeepWork,
            "short_burst" => SessionType::ShortBurst,
            _ => SessionType::Pomodoro,
        };
        let task_id = match_block_to_task(&pb.task_title, scored).unwrap_or_default();
        let linked = scored.iter().find(|st| st.task.id == task_id);
        study_blocks.push(StudyBlock {
            id: pb.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            task_id,
            task_title: pb.task_title,
            start_time: pb.start_time,
            end_time: pb.end_time,
            duration_minutes: duration,
            session_type,
            complexity: linked.map_or(5, |st| st.task.complexity_score),
            priority: linked.map(|st| st.task.priority).unwrap_or_default(),
            deadline_urgency: linked.map(|st| st.deadline_urgency).unwrap_or_default(),
            completed: pb.completed.unwrap_or(false),
            notes: pb.notes,
        });
    }

    let mut break_blocks = Vec::with_capacity(parsed.break_blocks.len());
    for bb in parsed.break_blocks {
        let duration = bb.duration_minutes.or_else(|| {
            duration_between(&bb.start_time, &bb.end_time).ok()
        });
        let Some(duration) = duration else {
            continue;
        };
        let break_type = if bb.break_type == "long" {
            BreakType::Long
        } else {
            BreakType::Short
        };
        break_blocks.push(BreakBlock {
            id: bb.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            start_time: bb.start_time,
            end_time: bb.end_time,
            duration_minutes: duration,
            break_type,
        });
    }

    let minutes: u32 = study_blocks.iter().map(|b| b.duration_minutes).sum();

    GeneratedSchedule {
        study_blocks,
        break_blocks,
        total_study_hours: round_hours(minutes),
        ai_reasoning: parsed.ai_reasoning,
        used_model: true,
    }
}
