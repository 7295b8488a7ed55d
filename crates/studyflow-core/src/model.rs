//! Domain types for tasks, scheduling preferences, and stress signals.
//!
//! All persisted structures use serde defaults so that missing or legacy
//! fields never fail the read path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

/// Task completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

/// A pending work item owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Difficulty on a 1-10 scale.
    #[serde(default = "default_complexity")]
    pub complexity_score: u8,
    #[serde(default = "default_estimated_hours")]
    pub estimated_hours: f64,
    #[serde(default)]
    pub status: TaskStatus,
    /// Minutes accrued by completing study blocks linked to this task.
    #[serde(default)]
    pub time_spent_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_complexity() -> u8 {
    5
}

fn default_estimated_hours() -> f64 {
    2.0
}

/// Daily study window boundaries, HH:MM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyHours {
    #[serde(default = "default_study_start")]
    pub start: String,
    #[serde(default = "default_study_end")]
    pub end: String,
}

impl Default for StudyHours {
    fn default() -> Self {
        Self {
            start: default_study_start(),
            end: default_study_end(),
        }
    }
}

fn default_study_start() -> String {
    "09:00".to_string()
}

fn default_study_end() -> String {
    "21:00".to_string()
}

/// A recurring unavailable window.
///
/// `day` is a lowercase weekday name ("monday"...) or "daily".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTime {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub reason: String,
}

/// Ordering preference for task complexity within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityPattern {
    HardFirst,
    EasyFirst,
    #[default]
    Alternating,
}

impl ComplexityPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityPattern::HardFirst => "hard_first",
            ComplexityPattern::EasyFirst => "easy_first",
            ComplexityPattern::Alternating => "alternating",
        }
    }
}

/// How strongly stress should influence scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StressSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

/// Per-user scheduling preferences. Defaults apply when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub study_hours: StudyHours,
    #[serde(default = "default_session_length")]
    pub preferred_session_length: u32,
    #[serde(default = "default_short_break")]
    pub break_duration_short: u32,
    #[serde(default = "default_long_break")]
    pub break_duration_long: u32,
    #[serde(default = "default_max_daily_hours")]
    pub max_daily_study_hours: f64,
    #[serde(default)]
    pub complexity_pattern: ComplexityPattern,
    #[serde(default)]
    pub blocked_times: Vec<BlockedTime>,
    #[serde(default)]
    pub stress_sensitivity: StressSensitivity,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            study_hours: StudyHours::default(),
            preferred_session_length: default_session_length(),
            break_duration_short: default_short_break(),
            break_duration_long: default_long_break(),
            max_daily_study_hours: default_max_daily_hours(),
            complexity_pattern: ComplexityPattern::default(),
            blocked_times: Vec::new(),
            stress_sensitivity: StressSensitivity::default(),
        }
    }
}

fn default_session_length() -> u32 {
    25
}

fn default_short_break() -> u32 {
    5
}

fn default_long_break() -> u32 {
    15
}

fn default_max_daily_hours() -> f64 {
    8.0
}

/// A point-in-time stress measurement on a 0-10 scale.
/// The latest signal per user feeds scoring; 5.0 is assumed when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressSignal {
    pub objective_score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Neutral stress assumed when a user has no recorded signal.
pub const DEFAULT_STRESS_LEVEL: f64 = 5.0;
