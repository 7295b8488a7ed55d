//! Study plan structures and HH:MM time arithmetic.
//!
//! A [`StudyPlan`] is the unit of persistence for one user-day: study
//! blocks, break blocks, the computed daily total, and a modification
//! history appended by every mutation.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::model::TaskPriority;

/// Session style assigned to a study block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Pomodoro,
    DeepWork,
    ShortBurst,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Pomodoro => "pomodoro",
            SessionType::DeepWork => "deep_work",
            SessionType::ShortBurst => "short_burst",
        }
    }
}

/// Break length class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakType {
    Short,
    Long,
}

/// How soon a task's deadline presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineUrgency {
    Immediate,
    Soon,
    Upcoming,
    #[default]
    Flexible,
}

/// Kind of plan mutation recorded in the modification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Add,
    Update,
    Remove,
    Complete,
    Reschedule,
}

/// One entry of a plan's modification history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modification {
    pub change_type: ChangeType,
    pub block_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A scheduled study session within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyBlock {
    pub id: String,
    /// Task this block works toward, empty when unlinked.
    #[serde(default)]
    pub task_id: String,
    pub task_title: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub session_type: SessionType,
    /// Difficulty carried over from the task, 1-10.
    #[serde(default = "default_block_complexity")]
    pub complexity: u8,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub deadline_urgency: DeadlineUrgency,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_block_complexity() -> u8 {
    5
}

/// A scheduled rest period within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakBlock {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub break_type: BreakType,
}

/// A full day's schedule for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlan {
    pub user_id: String,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub stress_level_at_generation: f64,
    pub study_blocks: Vec<StudyBlock>,
    pub break_blocks: Vec<BreakBlock>,
    /// Hours across all study blocks, rounded to one decimal.
    pub total_study_hours: f64,
    pub ai_reasoning: String,
    #[serde(default)]
    pub user_approved: bool,
    #[serde(default)]
    pub modifications: Vec<Modification>,
}

impl StudyPlan {
    /// An empty plan carrying only a reasoning message.
    pub fn empty(user_id: &str, date: NaiveDate, stress_level: f64, reasoning: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            generated_at: Utc::now(),
            stress_level_at_generation: stress_level,
            study_blocks: Vec::new(),
            break_blocks: Vec::new(),
            total_study_hours: 0.0,
            ai_reasoning: reasoning.to_string(),
            user_approved: false,
            modifications: Vec::new(),
        }
    }

    /// Recompute `total_study_hours` over every study block, completed
    /// or not.
    pub fn recompute_total_hours(&mut self) {
        let minutes: u32 = self.study_blocks.iter().map(|b| b.duration_minutes).sum();
        self.total_study_hours = round_hours(minutes);
    }

    /// Append a modification entry.
    pub fn log_modification(
        &mut self,
        change_type: ChangeType,
        block_id: &str,
        description: Option<String>,
    ) {
        self.modifications.push(Modification {
            change_type,
            block_id: block_id.to_string(),
            timestamp: Utc::now(),
            description,
        });
    }

    /// Sort study and break blocks by start time.
    pub fn sort_blocks(&mut self) {
        self.study_blocks
            .sort_by(|a, b| a.start_time.cmp(&b.start_time));
        self.break_blocks
            .sort_by(|a, b| a.start_time.cmp(&b.start_time));
    }

    pub fn block_mut(&mut self, block_id: &str) -> Option<&mut StudyBlock> {
        self.study_blocks.iter_mut().find(|b| b.id == block_id)
    }
}

/// Minutes-to-hours with one decimal of precision.
pub fn round_hours(minutes: u32) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

/// Parse a `YYYY-MM-DD` date string.
///
/// # Errors
/// Returns a validation error when the string is not a calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()).into())
}

/// Parse an `HH:MM` string.
///
/// # Errors
/// Returns a validation error when the string is not a valid 24h time.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| ValidationError::InvalidTime(s.to_string()).into())
}

/// `HH:MM` to minutes since midnight.
pub fn hhmm_to_minutes(s: &str) -> Result<u32> {
    let time = parse_hhmm(s)?;
    use chrono::Timelike;
    Ok(time.hour() * 60 + time.minute())
}

/// Minutes since midnight to `HH:MM`, wrapping at 24h.
pub fn minutes_to_hhmm(minutes: i64) -> String {
    let m = minutes.rem_euclid(24 * 60);
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Add minutes to an `HH:MM` string.
pub fn add_minutes(s: &str, minutes: i64) -> Result<String> {
    let base = hhmm_to_minutes(s)? as i64;
    Ok(minutes_to_hhmm(base + minutes))
}

/// Whole minutes from `start` to `end`, both `HH:MM` on the same day.
///
/// # Errors
/// Returns a validation error when either string is malformed or when
/// `end` is not after `start`.
pub fn duration_between(start: &str, end: &str) -> Result<u32> {
    let s = hhmm_to_minutes(start)?;
    let e = hhmm_to_minutes(end)?;
    if e <= s {
        return Err(ValidationError::InvalidTimeRange {
            start: start.to_string(),
            end: end.to_string(),
        }
        .into());
    }
    Ok(e - s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, start: &str, end: &str, minutes: u32, completed: bool) -> StudyBlock {
        StudyBlock {
            id: id.to_string(),
            task_id: "t1".to_string(),
            task_title: "Algebra".to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            duration_minutes: minutes,
            session_type: SessionType::Pomodoro,
            complexity: 5,
            priority: TaskPriority::Medium,
            deadline_urgency: DeadlineUrgency::Flexible,
            completed,
            notes: None,
        }
    }

    #[test]
    fn hhmm_round_trip() {
        assert_eq!(hhmm_to_minutes("09:30").unwrap(), 570);
        assert_eq!(minutes_to_hhmm(570), "09:30");
        assert_eq!(add_minutes("23:45", 30).unwrap(), "00:15");
    }

    #[test]
    fn invalid_time_is_rejected() {
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("9am").is_err());
        assert!(duration_between("10:00", "10:00").is_err());
        assert!(duration_between("11:00", "10:00").is_err());
    }

    #[test]
    fn date_parsing() {
        assert!(parse_date("2026-03-02").is_ok());
        assert!(parse_date("2026-02-30").is_err());
        assert!(parse_date("03/02/2026").is_err());
    }

    #[test]
    fn total_hours_counts_completed_blocks() {
        let mut plan = StudyPlan::empty(
            "u1",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            5.0,
            "test",
        );
        plan.study_blocks.push(block("b1", "09:00", "09:25", 25, false));
        plan.study_blocks.push(block("b2", "09:30", "10:00", 30, true));
        plan.recompute_total_hours();
        // 25 + 30 = 55 minutes; completing a block leaves the total alone.
        assert_eq!(plan.total_study_hours, 0.9);
    }

    #[test]
    fn study_block_keeps_task_context_fields() {
        let value = serde_json::to_value(block("b1", "09:00", "09:25", 25, false)).unwrap();
        assert_eq!(value["complexity"], 5);
        assert_eq!(value["priority"], "medium");
        assert_eq!(value["deadline_urgency"], "flexible");

        // Legacy documents without the fields still read back.
        let legacy = serde_json::json!({
            "id": "b1",
            "task_title": "Algebra",
            "start_time": "09:00",
            "end_time": "09:25",
            "duration_minutes": 25,
            "session_type": "pomodoro",
        });
        let read: StudyBlock = serde_json::from_value(legacy).unwrap();
        assert_eq!(read.complexity, 5);
        assert_eq!(read.priority, TaskPriority::Medium);
        assert_eq!(read.deadline_urgency, DeadlineUrgency::Flexible);
    }

    #[test]
    fn sort_blocks_orders_by_start_time() {
        let mut plan = StudyPlan::empty(
            "u1",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            5.0,
            "test",
        );
        plan.study_blocks.push(block("b2", "14:00", "14:25", 25, false));
        plan.study_blocks.push(block("b1", "09:00", "09:25", 25, false));
        plan.sort_blocks();
        assert_eq!(plan.study_blocks[0].id, "b1");
        assert_eq!(plan.study_blocks[1].id, "b2");
    }

    #[test]
    fn modification_log_appends() {
        let mut plan = StudyPlan::empty(
            "u1",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            5.0,
            "test",
        );
        plan.log_modification(ChangeType::Add, "b1", None);
        plan.log_modification(ChangeType::Complete, "b1", Some("done".to_string()));
        assert_eq!(plan.modifications.len(), 2);
        assert_eq!(plan.modifications[1].change_type, ChangeType::Complete);
    }
}
