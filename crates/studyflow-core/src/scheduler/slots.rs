//! Availability slot calculation.
//!
//! Divides the user's study window into fixed 30-minute slots and drops
//! slots whose start falls inside a blocked time for that weekday.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::Preferences;
use crate::plan::{add_minutes, hhmm_to_minutes};

/// Slot granularity in minutes.
pub const SLOT_MINUTES: u32 = 30;

/// One half-hour availability slot, HH:MM bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Compute the free 30-minute slots for `date` under `prefs`.
///
/// A slot is excluded when a blocked time for the matching day (or
/// "daily") contains its start, via lexical HH:MM comparison. An empty
/// or inverted study window yields no slots rather than an error.
pub fn available_slots(prefs: &Preferences, date: NaiveDate) -> Vec<TimeSlot> {
    let (start_min, end_min) = match (
        hhmm_to_minutes(&prefs.study_hours.start),
        hhmm_to_minutes(&prefs.study_hours.end),
    ) {
        (Ok(s), Ok(e)) if s < e => (s, e),
        _ => return Vec::new(),
    };

    let day = weekday_name(date.weekday());
    let mut slots = Vec::new();
    let mut cursor = start_min;
    while cursor + SLOT_MINUTES <= end_min {
        let start = crate::plan::minutes_to_hhmm(cursor as i64);
        let blocked = prefs.blocked_times.iter().any(|b| {
            let day_matches = b.day.eq_ignore_ascii_case(day) || b.day.eq_ignore_ascii_case("daily");
            day_matches && b.start_time.as_str() <= start.as_str() && start.as_str() < b.end_time.as_str()
        });
        if !blocked {
            let end = add_minutes(&start, SLOT_MINUTES as i64).unwrap_or_else(|_| start.clone());
            slots.push(TimeSlot { start, end });
        }
        cursor += SLOT_MINUTES;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockedTime, StudyHours};

    fn prefs_with(blocked: Vec<BlockedTime>) -> Preferences {
        Preferences {
            study_hours: StudyHours {
                start: "09:00".to_string(),
                end: "21:00".to_string(),
            },
            blocked_times: blocked,
            ..Preferences::default()
        }
    }

    #[test]
    fn default_window_yields_24_slots() {
        let prefs = prefs_with(vec![]);
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(); // a Monday
        let slots = available_slots(&prefs, date);
        assert_eq!(slots.len(), 24);
        assert_eq!(slots[0].start, "09:00");
        assert_eq!(slots[0].end, "09:30");
        assert_eq!(slots[23].start, "20:30");
        assert_eq!(slots[23].end, "21:00");
    }

    #[test]
    fn daily_lunch_block_removes_two_slots() {
        let prefs = prefs_with(vec![BlockedTime {
            day: "daily".to_string(),
            start_time: "12:00".to_string(),
            end_time: "13:00".to_string(),
            reason: "lunch".to_string(),
        }]);
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let slots = available_slots(&prefs, date);
        assert_eq!(slots.len(), 22);
        assert!(!slots.iter().any(|s| s.start == "12:00" || s.start == "12:30"));
        // 13:00 is the blocked end and is itself available.
        assert!(slots.iter().any(|s| s.start == "13:00"));
    }

    #[test]
    fn weekday_block_only_applies_on_that_day() {
        let prefs = prefs_with(vec![BlockedTime {
            day: "monday".to_string(),
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            reason: "standup".to_string(),
        }]);
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(available_slots(&prefs, monday).len(), 22);
        assert_eq!(available_slots(&prefs, tuesday).len(), 24);
    }

    #[test]
    fn inverted_or_malformed_window_yields_no_slots() {
        let mut prefs = prefs_with(vec![]);
        prefs.study_hours.start = "21:00".to_string();
        prefs.study_hours.end = "09:00".to_string();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(available_slots(&prefs, date).is_empty());

        prefs.study_hours.start = "not-a-time".to_string();
        assert!(available_slots(&prefs, date).is_empty());
    }

    #[test]
    fn trailing_partial_slot_is_dropped() {
        let mut prefs = prefs_with(vec![]);
        prefs.study_hours.start = "09:00".to_string();
        prefs.study_hours.end = "10:15".to_string();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let slots = available_slots(&prefs, date);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end, "10:00");
    }
}
