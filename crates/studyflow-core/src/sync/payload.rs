//! Calendar event payload construction and version fingerprints.
//!
//! Version hashes are SHA-256 over a canonical JSON object: serde_json
//! maps keep keys sorted, so equal field sets always produce equal
//! fingerprints regardless of construction order.

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::{Result, ValidationError};
use crate::model::{Task, TaskPriority};
use crate::plan::{SessionType, StudyBlock};

/// Google Calendar color id for a task priority.
pub fn priority_color(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "2",
        TaskPriority::Medium => "5",
        TaskPriority::High => "6",
        TaskPriority::Urgent => "11",
    }
}

/// Google Calendar color id for a session type.
pub fn session_color(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Pomodoro => "11",
        SessionType::DeepWork => "9",
        SessionType::ShortBurst => "10",
    }
}

/// Emoji prefix marking a study block event.
pub fn session_emoji(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Pomodoro => "🍅",
        SessionType::DeepWork => "🧠",
        SessionType::ShortBurst => "⚡",
    }
}

/// Strip a known session emoji prefix from an event summary.
pub fn strip_session_emoji(summary: &str) -> &str {
    for emoji in ["🍅", "🧠", "⚡"] {
        if let Some(rest) = summary.strip_prefix(emoji) {
            return rest.trim_start();
        }
    }
    summary
}

/// Build the calendar event for a task.
///
/// The event window runs from the deadline for `estimated_hours`;
/// reminders fire one day and one hour ahead.
///
/// # Errors
/// Returns a validation error when the task has no deadline.
pub fn task_to_event(task: &Task) -> Result<Value> {
    let deadline = task.deadline.ok_or_else(|| ValidationError::InvalidValue {
        field: "deadline".to_string(),
        message: format!("task '{}' has no deadline to place on the calendar", task.id),
    })?;

    let duration_minutes = (task.estimated_hours * 60.0).round() as i64;
    let end = deadline + Duration::minutes(duration_minutes);
    let description = format!(
        "{}\n\n[Task ID: {}]",
        task.description.as_deref().unwrap_or(""),
        task.id
    );

    Ok(json!({
        "summary": task.title,
        "description": description.trim_start(),
        "start": {"dateTime": deadline.to_rfc3339(), "timeZone": "UTC"},
        "end": {"dateTime": end.to_rfc3339(), "timeZone": "UTC"},
        "colorId": priority_color(task.priority),
        "reminders": {
            "useDefault": false,
            "overrides": [
                {"method": "popup", "minutes": 24 * 60},
                {"method": "popup", "minutes": 60},
            ],
        },
        "extendedProperties": {
            "private": {
                "task_id": task.id,
                "entity_type": "task",
                "complexity_score": task.complexity_score.to_string(),
                "priority": task.priority.as_str(),
            },
        },
    }))
}

/// Build the calendar event for a study block on a given date.
pub fn block_to_event(block: &StudyBlock, date: NaiveDate) -> Result<Value> {
    crate::plan::parse_hhmm(&block.start_time)?;
    crate::plan::parse_hhmm(&block.end_time)?;

    let start = format!("{date}T{}:00", block.start_time);
    let end = format!("{date}T{}:00", block.end_time);

    Ok(json!({
        "summary": format!("{} {}", session_emoji(block.session_type), block.task_title),
        "start": {"dateTime": start, "timeZone": "UTC"},
        "end": {"dateTime": end, "timeZone": "UTC"},
        "colorId": session_color(block.session_type),
        "reminders": {
            "useDefault": false,
            "overrides": [{"method": "popup", "minutes": 5}],
        },
        "transparency": "opaque",
        "extendedProperties": {
            "private": {
                "study_block_id": block.id,
                "task_id": block.task_id,
                "entity_type": "study_block",
                "session_type": block.session_type.as_str(),
            },
        },
    }))
}

fn hash_value(value: &Value) -> String {
    let canonical = serde_json::to_string(value).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Fingerprint of the sync-relevant fields of a task.
pub fn task_version_hash(task: &Task) -> String {
    hash_value(&json!({
        "title": task.title,
        "description": task.description,
        "deadline": task.deadline.map(|d| d.to_rfc3339()),
        "priority": task.priority.as_str(),
        "estimated_hours": task.estimated_hours,
    }))
}

/// Fingerprint of the sync-relevant fields of a study block.
pub fn block_version_hash(block: &StudyBlock, date: NaiveDate) -> String {
    hash_value(&json!({
        "task_title": block.task_title,
        "date": date.to_string(),
        "start_time": block.start_time,
        "end_time": block.end_time,
        "session_type": block.session_type.as_str(),
    }))
}
