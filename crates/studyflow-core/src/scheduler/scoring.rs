//! Deterministic task scoring.
//!
//! Each active task receives a composite score from four components:
//! deadline pressure (0-40), priority weight (0-25), complexity adjusted
//! for stress (0-20), and estimated-time pressure (0-15). Scored tasks
//! sort descending; the sort is stable, so equal scores keep input order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Task, TaskPriority};
use crate::plan::DeadlineUrgency;

/// Days assumed until deadline when a task has none.
const NO_DEADLINE_DAYS: f64 = 30.0;

/// A task annotated with its scheduling score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTask {
    pub task: Task,
    pub scheduling_score: f64,
    pub deadline_urgency: DeadlineUrgency,
    pub days_until_deadline: f64,
}

/// Fractional days from `now` until the deadline; 30 when absent.
pub fn days_until_deadline(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match deadline {
        Some(d) => (d - now).num_seconds() as f64 / 86_400.0,
        None => NO_DEADLINE_DAYS,
    }
}

/// Deadline pressure component, 0-40.
pub fn deadline_score(days: f64) -> f64 {
    if days <= 0.0 {
        40.0
    } else if days <= 1.0 {
        38.0
    } else if days <= 2.0 {
        35.0
    } else if days <= 3.0 {
        28.0
    } else if days <= 7.0 {
        20.0
    } else if days <= 14.0 {
        12.0
    } else {
        (10.0 - (days - 14.0)).max(5.0)
    }
}

/// Priority weight component, 0-25.
pub fn priority_score(priority: TaskPriority) -> f64 {
    match priority {
        TaskPriority::Urgent => 25.0,
        TaskPriority::High => 20.0,
        TaskPriority::Medium => 12.0,
        TaskPriority::Low => 5.0,
    }
}

/// Complexity component adjusted for current stress, 0-20.
///
/// High stress inverts the component so complex tasks sink; moderate
/// stress flattens it; low stress favors complex tasks.
pub fn complexity_score(complexity: u8, stress_level: f64) -> f64 {
    let c = complexity as f64;
    if stress_level >= 7.0 {
        (20.0 - 2.0 * c).max(0.0)
    } else if stress_level >= 4.0 {
        10.0
    } else {
        (2.0 * c).min(20.0)
    }
}

/// Estimated-time pressure component, 0-15. Shorter tasks score higher.
pub fn time_score(estimated_hours: f64) -> f64 {
    (15.0 - 1.5 * estimated_hours).max(0.0)
}

/// Urgency bucket from fractional days until deadline.
pub fn classify_urgency(days: f64) -> DeadlineUrgency {
    if days <= 0.0 {
        DeadlineUrgency::Immediate
    } else if days <= 2.0 {
        DeadlineUrgency::Soon
    } else if days <= 7.0 {
        DeadlineUrgency::Upcoming
    } else {
        DeadlineUrgency::Flexible
    }
}

/// Score a single task against the current time and stress level.
pub fn score_task(task: &Task, stress_level: f64, now: DateTime<Utc>) -> ScoredTask {
    let days = days_until_deadline(task.deadline, now);
    let score = deadline_score(days)
        + priority_score(task.priority)
        + complexity_score(task.complexity_score, stress_level)
        + time_score(task.estimated_hours);
    ScoredTask {
        task: task.clone(),
        scheduling_score: score,
        deadline_urgency: classify_urgency(days),
        days_until_deadline: days,
    }
}

/// Score all tasks and sort descending by score (stable on ties).
pub fn score_tasks(tasks: &[Task], stress_level: f64, now: DateTime<Utc>) -> Vec<ScoredTask> {
    let mut scored: Vec<ScoredTask> = tasks
        .iter()
        .map(|t| score_task(t, stress_level, now))
        .collect();
    scored.sort_by(|a, b| {
        b.scheduling_score
            .partial_cmp(&a.scheduling_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use chrono::Duration;

    fn task(
        id: &str,
        deadline_days: Option<i64>,
        priority: TaskPriority,
        complexity: u8,
        hours: f64,
        now: DateTime<Utc>,
    ) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: None,
            deadline: deadline_days.map(|d| now + Duration::days(d)),
            priority,
            complexity_score: complexity,
            estimated_hours: hours,
            status: TaskStatus::Todo,
            time_spent_minutes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn overdue_urgent_simple_short_task_scores_maximum_band() {
        let now = Utc::now();
        let mut t = task("t1", None, TaskPriority::Urgent, 1, 1.0, now);
        t.deadline = Some(now - Duration::hours(2));
        let scored = score_task(&t, 2.0, now);
        // 40 + 25 + min(20, 2*1)=2 + (15 - 1.5)=13.5
        assert_eq!(scored.scheduling_score, 80.5);
        assert_eq!(scored.deadline_urgency, DeadlineUrgency::Immediate);
    }

    #[test]
    fn reference_score_for_overdue_urgent_complex_task() {
        let now = Utc::now();
        let mut t = task("t1", None, TaskPriority::Urgent, 9, 1.0, now);
        t.deadline = Some(now - Duration::hours(1));
        let scored = score_task(&t, 2.0, now);
        // 40 + 25 + min(20, 18) + 13.5
        assert_eq!(scored.scheduling_score, 96.5);
        assert_eq!(scored.deadline_urgency, DeadlineUrgency::Immediate);
    }

    #[test]
    fn high_stress_prefers_simple_tasks() {
        let now = Utc::now();
        let simple = task("simple", Some(5), TaskPriority::Medium, 2, 2.0, now);
        let complex = task("complex", Some(5), TaskPriority::Medium, 9, 2.0, now);

        let high = score_tasks(&[simple.clone(), complex.clone()], 8.0, now);
        assert_eq!(high[0].task.id, "simple");

        let low = score_tasks(&[simple, complex], 2.0, now);
        assert_eq!(low[0].task.id, "complex");
    }

    #[test]
    fn moderate_stress_flattens_complexity() {
        let now = Utc::now();
        assert_eq!(complexity_score(1, 5.0), 10.0);
        assert_eq!(complexity_score(10, 5.0), 10.0);
        let _ = now;
    }

    #[test]
    fn no_deadline_assumes_thirty_days() {
        let now = Utc::now();
        let t = task("t1", None, TaskPriority::Low, 5, 2.0, now);
        let scored = score_task(&t, 5.0, now);
        assert_eq!(scored.days_until_deadline, 30.0);
        assert_eq!(scored.deadline_urgency, DeadlineUrgency::Flexible);
        // Deadline component floors at 5 for distant deadlines.
        assert_eq!(deadline_score(30.0), 5.0);
    }

    #[test]
    fn deadline_bands() {
        assert_eq!(deadline_score(-1.0), 40.0);
        assert_eq!(deadline_score(0.5), 38.0);
        assert_eq!(deadline_score(1.5), 35.0);
        assert_eq!(deadline_score(2.5), 28.0);
        assert_eq!(deadline_score(5.0), 20.0);
        assert_eq!(deadline_score(10.0), 12.0);
        assert_eq!(deadline_score(16.0), 8.0);
        assert_eq!(deadline_score(100.0), 5.0);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let now = Utc::now();
        let a = task("a", Some(5), TaskPriority::Medium, 5, 2.0, now);
        let b = task("b", Some(5), TaskPriority::Medium, 5, 2.0, now);
        let scored = score_tasks(&[a, b], 5.0, now);
        assert_eq!(scored[0].task.id, "a");
        assert_eq!(scored[1].task.id, "b");
    }
}
