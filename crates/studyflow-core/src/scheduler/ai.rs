//! AI-backed schedule generation: prompt construction, model transport,
//! response parsing, and title-to-task back-matching.
//!
//! The model is behind the [`ScheduleModel`] trait so tests can inject a
//! canned implementation. Parsing is strict about shape but tolerant of
//! prose around the JSON object; any failure is reported as a typed
//! [`ParseError`] so the caller can fall back deterministically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::ModelSettings;
use crate::error::{Result, UpstreamError};
use crate::model::Preferences;
use crate::scheduler::scoring::ScoredTask;
use crate::scheduler::slots::TimeSlot;

/// Maximum scored tasks included in the prompt.
const PROMPT_TASK_LIMIT: usize = 8;
/// Maximum availability slots included in the prompt.
const PROMPT_SLOT_LIMIT: usize = 24;

/// A text-completion backend capable of producing a schedule.
pub trait ScheduleModel: Send + Sync {
    /// Run one completion for `prompt` and return the raw model text.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Ollama-compatible local model endpoint.
pub struct OllamaModel {
    settings: ModelSettings,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaModel {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }
}

impl ScheduleModel for OllamaModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.settings.endpoint.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
        };
        let timeout = self.settings.timeout_secs;

        let handle = tokio::runtime::Handle::current();
        handle.block_on(async {
            let fut = async {
                let response = self.http.post(&url).json(&body).send().await?;
                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let text = response.text().await.unwrap_or_default();
                    return Err(UpstreamError::Model(format!(
                        "model endpoint returned {status}: {text}"
                    ))
                    .into());
                }
                let parsed: GenerateResponse = response.json().await?;
                Ok(parsed.response)
            };
            match tokio::time::timeout(Duration::from_secs(timeout), fut).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout(timeout).into()),
            }
        })
    }
}

/// Reasons a model response could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No `{...}` object found in the response text.
    NoJsonObject,
    /// The extracted text is not valid JSON.
    Malformed(String),
    /// A required top-level key is absent.
    MissingKey(&'static str),
    /// `study_blocks` is present but empty.
    EmptyBlocks,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::NoJsonObject => write!(f, "no JSON object in model response"),
            ParseError::Malformed(msg) => write!(f, "malformed JSON: {msg}"),
            ParseError::MissingKey(key) => write!(f, "missing required key '{key}'"),
            ParseError::EmptyBlocks => write!(f, "model produced no study blocks"),
        }
    }
}

/// One study block as emitted by the model. Identity and completion
/// fields are optional; the assembler fills them in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedBlock {
    #[serde(default)]
    pub id: Option<String>,
    pub task_title: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub session_type: String,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One break block as emitted by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedBreak {
    #[serde(default)]
    pub id: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub break_type: String,
}

/// A validated model schedule, pre-assembly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedSchedule {
    pub study_blocks: Vec<ParsedBlock>,
    #[serde(default)]
    pub break_blocks: Vec<ParsedBreak>,
    pub total_study_hours: f64,
    pub ai_reasoning: String,
}

const REQUIRED_KEYS: [&str; 4] = [
    "study_blocks",
    "break_blocks",
    "total_study_hours",
    "ai_reasoning",
];

/// Extract and validate the schedule object from raw model text.
///
/// Takes the outermost `{...}` span (first `{` to last `}`), so prose
/// or markdown fences around the object are tolerated.
pub fn parse_model_schedule(raw: &str) -> std::result::Result<ParsedSchedule, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(ParseError::NoJsonObject)?;
    if end <= start {
        return Err(ParseError::NoJsonObject);
    }
    let span = &raw[start..=end];

    let value: Value =
        serde_json::from_str(span).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::Malformed("top level is not an object".to_string()))?;
    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(ParseError::MissingKey(key));
        }
    }

    let schedule: ParsedSchedule =
        serde_json::from_value(value).map_err(|e| ParseError::Malformed(e.to_string()))?;
    if schedule.study_blocks.is_empty() {
        return Err(ParseError::EmptyBlocks);
    }
    Ok(schedule)
}

/// Build the generation prompt from scored tasks, availability, and
/// preferences. Tasks arrive pre-sorted by score; only the top few and
/// a bounded slot list are included to keep the prompt small.
pub fn build_prompt(
    scored: &[ScoredTask],
    slots: &[TimeSlot],
    prefs: &Preferences,
    stress_level: f64,
    date: chrono::NaiveDate,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a study scheduling assistant. Build a realistic one-day study plan.\n\n",
    );
    prompt.push_str(&format!("Date: {date}\n"));
    prompt.push_str(&format!("Current stress level (0-10): {stress_level:.1}\n\n"));

    prompt.push_str("Tasks, highest scheduling priority first:\n");
    for st in scored.iter().take(PROMPT_TASK_LIMIT) {
        let deadline = st
            .task
            .deadline
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "none".to_string());
        prompt.push_str(&format!(
            "- \"{}\" (score {:.1}, priority {}, complexity {}/10, est. {:.1}h, deadline {})\n",
            st.task.title,
            st.scheduling_score,
            st.task.priority.as_str(),
            st.task.complexity_score,
            st.task.estimated_hours,
            deadline,
        ));
    }

    prompt.push_str("\nAvailable 30-minute slots:\n");
    for slot in slots.iter().take(PROMPT_SLOT_LIMIT) {
        prompt.push_str(&format!("- {} to {}\n", slot.start, slot.end));
    }

    prompt.push_str(&format!(
        "\nConstraints:\n\
         - At most {:.1} hours of study in total.\n\
         - Preferred session length: {} minutes.\n\
         - Short breaks: {} minutes; long breaks: {} minutes.\n\
         - Complexity ordering: {}.\n",
        prefs.max_daily_study_hours,
        prefs.preferred_session_length,
        prefs.break_duration_short,
        prefs.break_duration_long,
        prefs.complexity_pattern.as_str(),
    ));

    prompt.push_str(
        "\nRespond with a single JSON object and nothing else, shaped as:\n\
         {\n\
           \"study_blocks\": [{\"task_title\": str, \"start_time\": \"HH:MM\", \
         \"end_time\": \"HH:MM\", \"session_type\": \"pomodoro\"|\"deep_work\"|\"short_burst\"}],\n\
           \"break_blocks\": [{\"start_time\": \"HH:MM\", \"end_time\": \"HH:MM\", \
         \"break_type\": \"short\"|\"long\"}],\n\
           \"total_study_hours\": number,\n\
           \"ai_reasoning\": str\n\
         }\n",
    );
    prompt
}

/// Match a model-produced block title back to a scored task id.
///
/// Exact case-insensitive match wins; otherwise the longest task title
/// contained in the block title (case-insensitive) wins, with ties
/// broken by scored order. Returns `None` when nothing matches.
pub fn match_block_to_task(block_title: &str, scored: &[ScoredTask]) -> Option<String> {
    let needle = block_title.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    for st in scored {
        if st.task.title.trim().to_lowercase() == needle {
            return Some(st.task.id.clone());
        }
    }

    let mut best: Option<(usize, &ScoredTask)> = None;
    for st in scored {
        let title = st.task.title.trim().to_lowercase();
        if !title.is_empty() && needle.contains(&title) {
            match best {
                Some((len, _)) if title.len() <= len => {}
                _ => best = Some((title.len(), st)),
            }
        }
    }
    best.map(|(_, st)| st.task.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Task, TaskPriority, TaskStatus};
    use crate::plan::DeadlineUrgency;
    use chrono::Utc;

    fn scored(id: &str, title: &str, score: f64) -> ScoredTask {
        let now = Utc::now();
        ScoredTask {
            task: Task {
                id: id.to_string(),
                title: title.to_string(),
                description: None,
                deadline: None,
                priority: TaskPriority::Medium,
                complexity_score: 5,
                estimated_hours: 2.0,
                status: TaskStatus::Todo,
                time_spent_minutes: 0,
                created_at: now,
                updated_at: now,
            },
            scheduling_score: score,
            deadline_urgency: DeadlineUrgency::Flexible,
            days_until_deadline: 30.0,
        }
    }

    const GOOD_RESPONSE: &str = r#"Here is your plan:
{
  "study_blocks": [
    {"task_title": "Algebra", "start_time": "09:00", "end_time": "09:25", "session_type": "pomodoro"}
  ],
  "break_blocks": [
    {"start_time": "09:25", "end_time": "09:30", "break_type": "short"}
  ],
  "total_study_hours": 0.4,
  "ai_reasoning": "Start with the urgent task."
}
Good luck!"#;

    #[test]
    fn parses_object_embedded_in_prose() {
        let schedule = parse_model_schedule(GOOD_RESPONSE).unwrap();
        assert_eq!(schedule.study_blocks.len(), 1);
        assert_eq!(schedule.study_blocks[0].task_title, "Algebra");
        assert_eq!(schedule.break_blocks.len(), 1);
        assert_eq!(schedule.total_study_hours, 0.4);
    }

    #[test]
    fn missing_key_is_detected() {
        let raw = r#"{"study_blocks": [{"task_title": "x", "start_time": "09:00",
            "end_time": "09:25", "session_type": "pomodoro"}],
            "break_blocks": [], "ai_reasoning": "r"}"#;
        assert_eq!(
            parse_model_schedule(raw),
            Err(ParseError::MissingKey("total_study_hours"))
        );
        let raw = r#"{"study_blocks": [{"task_title": "x", "start_time": "09:00",
            "end_time": "09:25", "session_type": "pomodoro"}],
            "total_study_hours": 0.4, "ai_reasoning": "r"}"#;
        assert_eq!(
            parse_model_schedule(raw),
            Err(ParseError::MissingKey("break_blocks"))
        );
    }

    #[test]
    fn empty_study_blocks_are_rejected() {
        let raw = r#"{"study_blocks": [], "break_blocks": [],
            "total_study_hours": 0, "ai_reasoning": "r"}"#;
        assert_eq!(parse_model_schedule(raw), Err(ParseError::EmptyBlocks));
    }

    #[test]
    fn no_object_and_garbage_are_rejected() {
        assert_eq!(
            parse_model_schedule("I cannot help with that."),
            Err(ParseError::NoJsonObject)
        );
        assert!(matches!(
            parse_model_schedule("{not json}"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn exact_title_match_wins_over_containment() {
        let tasks = vec![
            scored("a", "Algebra review session", 90.0),
            scored("b", "Algebra", 80.0),
        ];
        assert_eq!(match_block_to_task("algebra", &tasks), Some("b".to_string()));
    }

    #[test]
    fn longest_contained_title_wins() {
        let tasks = vec![
            scored("a", "Algebra", 90.0),
            scored("b", "Algebra homework", 80.0),
        ];
        assert_eq!(
            match_block_to_task("Finish Algebra homework tonight", &tasks),
            Some("b".to_string())
        );
    }

    #[test]
    fn unmatched_title_returns_none() {
        let tasks = vec![scored("a", "Algebra", 90.0)];
        assert_eq!(match_block_to_task("Chemistry lab", &tasks), None);
        assert_eq!(match_block_to_task("   ", &tasks), None);
    }

    #[test]
    fn prompt_bounds_tasks_and_slots() {
        let tasks: Vec<ScoredTask> = (0..12)
            .map(|i| scored(&format!("t{i}"), &format!("Task {i}"), 50.0))
            .collect();
        let slots: Vec<TimeSlot> = (0..30)
            .map(|i| TimeSlot {
                start: format!("{:02}:00", i % 24),
                end: format!("{:02}:30", i % 24),
            })
            .collect();
        let prompt = build_prompt(
            &tasks,
            &slots,
            &Preferences::default(),
            5.0,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        );
        assert!(prompt.contains("Task 7"));
        assert!(!prompt.contains("Task 8"));
        assert!(prompt.contains("ai_reasoning"));
    }
}
