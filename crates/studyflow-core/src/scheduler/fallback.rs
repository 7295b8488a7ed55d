//! Deterministic fallback schedule assembly.
//!
//! Used whenever the AI path is unavailable or produces an unusable
//! response. Walks the availability slots with a cursor, placing each
//! scored task in order, inserting a break before every block after the
//! first, and stopping at the daily study budget.

use chrono::Timelike;
use uuid::Uuid;

use crate::model::Preferences;
use crate::plan::{
    add_minutes, round_hours, BreakBlock, BreakType, StudyBlock,
};
use crate::scheduler::scoring::ScoredTask;
use crate::scheduler::session::{select_session_type, session_duration};
use crate::scheduler::slots::{TimeSlot, SLOT_MINUTES};

/// Blocks shorter than this are not worth scheduling.
const MIN_BLOCK_MINUTES: u32 = 15;
/// Consecutive study blocks before a long break.
const LONG_BREAK_EVERY: u32 = 4;

/// Output of deterministic assembly.
#[derive(Debug, Clone, Default)]
pub struct FallbackSchedule {
    pub study_blocks: Vec<StudyBlock>,
    pub break_blocks: Vec<BreakBlock>,
    pub total_study_hours: f64,
}

/// Assemble a day's schedule without the model.
///
/// Tasks arrive sorted by score. Each task takes enough consecutive
/// slots to cover its session duration; when fewer slots remain the
/// block shrinks to fit, and blocks under 15 minutes are skipped.
pub fn fallback_schedule(
    scored: &[ScoredTask],
    slots: &[TimeSlot],
    prefs: &Preferences,
    stress_level: f64,
) -> FallbackSchedule {
    let mut out = FallbackSchedule::default();
    if scored.is_empty() || slots.is_empty() {
        return out;
    }

    let budget_minutes = (prefs.max_daily_study_hours * 60.0) as u32;
    let mut total_minutes: u32 = 0;
    let mut cursor: usize = 0;
    let mut consecutive: u32 = 0;

    for st in scored {
        if cursor >= slots.len() || total_minutes >= budget_minutes {
            break;
        }

        let hour = crate::plan::parse_hhmm(&slots[cursor].start)
            .map(|t| t.hour())
            .unwrap_or(12);
        let session_type = select_session_type(&st.task, stress_level, hour);
        let mut duration = session_duration(session_type, stress_level);

        let mut slots_needed = duration.div_ceil(SLOT_MINUTES) as usize;
        let remaining = slots.len() - cursor;
        if slots_needed > remaining {
            slots_needed = remaining;
            duration = (remaining as u32) * SLOT_MINUTES;
        }
        if budget_minutes - total_minutes < duration {
            duration = budget_minutes - total_minutes;
            slots_needed = duration.div_ceil(SLOT_MINUTES) as usize;
        }
        // Too short to be worth placing; a later task may still fit.
        if duration < MIN_BLOCK_MINUTES {
            continue;
        }

        // Break before every block after the first, inserted only once
        // the block itself is known to fit.
        if !out.study_blocks.is_empty() {
            let long = consecutive >= LONG_BREAK_EVERY;
            let break_minutes = if long {
                prefs.break_duration_long
            } else {
                prefs.break_duration_short
            };
            let break_slots = break_minutes.div_ceil(SLOT_MINUTES) as usize;
            if cursor + break_slots >= slots.len() {
                break;
            }
            let start = slots[cursor].start.clone();
            let Ok(end) = add_minutes(&start, break_minutes as i64) else {
                break;
            };
            out.break_blocks.push(BreakBlock {
                id: Uuid::new_v4().to_string(),
                start_time: start,
                end_time: end,
                duration_minutes: break_minutes,
                break_type: if long { BreakType::Long } else { BreakType::Short },
            });
            if long {
                consecutive = 0;
            }
            cursor += break_slots;
        }

        let start = slots[cursor].start.clone();
        let Ok(end) = add_minutes(&start, duration as i64) else {
            break;
        };
        out.study_blocks.push(StudyBlock {
            id: Uuid::new_v4().to_string(),
            task_id: st.task.id.clone(),
            task_title: st.task.title.clone(),
            start_time: start,
            end_time: end,
            duration_minutes: duration,
            session_type,
            complexity: st.task.complexity_score,
            priority: st.task.priority,
            deadline_urgency: st.deadline_urgency,
            completed: false,
            notes: None,
        });
        total_minutes += duration;
        consecutive += 1;
        cursor += slots_needed;
    }

    out.total_study_hours = round_hours(total_minutes);
    out
}
