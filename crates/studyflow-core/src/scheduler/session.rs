//! Session type selection and duration rules.

use crate::model::Task;
use crate::plan::SessionType;

/// Pick a session type for a task given current stress and hour of day.
///
/// High stress forces short formats. Deep work is reserved for calm
/// mornings on complex tasks, or long tasks under low stress.
pub fn select_session_type(task: &Task, stress_level: f64, hour_of_day: u32) -> SessionType {
    let complexity = task.complexity_score as f64;
    if stress_level >= 7.0 {
        if complexity <= 4.0 {
            SessionType::ShortBurst
        } else {
            SessionType::Pomodoro
        }
    } else if stress_level <= 3.0 && complexity >= 7.0 && (6..=12).contains(&hour_of_day) {
        SessionType::DeepWork
    } else if stress_level <= 4.0 && task.estimated_hours >= 3.0 {
        SessionType::DeepWork
    } else {
        SessionType::Pomodoro
    }
}

/// Session duration in minutes, scaled down under stress.
///
/// Base durations are 25 (pomodoro), 90 (deep work), and 15 (short
/// burst). Stress at 8 or above caps every session at 20 minutes;
/// stress in [6, 8) scales the base by 0.8 with integer truncation.
pub fn session_duration(session_type: SessionType, stress_level: f64) -> u32 {
    let base: u32 = match session_type {
        SessionType::Pomodoro => 25,
        SessionType::DeepWork => 90,
        SessionType::ShortBurst => 15,
    };
    if stress_level >= 8.0 {
        base.min(20)
    } else if stress_level >= 6.0 {
        (base as f64 * 0.8) as u32
    } else {
        base
    }
}
