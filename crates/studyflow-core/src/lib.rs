//! # Studyflow Core Library
//!
//! Core business logic for Studyflow: an adaptive study scheduler with
//! Google Calendar synchronization. The library is server-agnostic; any
//! HTTP layer or CLI can sit on top of the same types.
//!
//! ## Architecture
//!
//! - **Scheduler**: deterministic task scoring, availability slots, and
//!   session selection, assembled into a daily plan by an AI model with
//!   a deterministic fallback
//! - **Planner**: plan lifecycle and mutation API with per-day locking
//! - **Sync**: OAuth lifecycle, encrypted credential storage, event
//!   push, and conflict detection/resolution against Google Calendar
//! - **Storage**: SQLite persistence behind per-concern traits
//!
//! ## Key Components
//!
//! - [`StudyPlanner`]: plan generation and mutation facade
//! - [`SyncEngine`]: calendar synchronization driver
//! - [`Database`]: SQLite implementation of every store trait
//! - [`Config`]: TOML application configuration

pub mod config;
pub mod error;
pub mod model;
pub mod plan;
pub mod planner;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use config::{Config, ModelSettings, OAuthSettings};
pub use error::{
    AuthorizationError, ConfigError, CoreError, DatabaseError, NotFoundError, Result,
    UpstreamError, ValidationError,
};
pub use model::{
    BlockedTime, ComplexityPattern, Preferences, StressSensitivity, StressSignal, StudyHours,
    Task, TaskPriority, TaskStatus,
};
pub use plan::{
    BreakBlock, BreakType, ChangeType, DeadlineUrgency, Modification, SessionType, StudyBlock,
    StudyPlan,
};
pub use planner::{
    BlockPatch, NewBlock, PlannerStats, RescheduleOutcome, RescheduleReason, StudyPlanner,
};
pub use scheduler::{GeneratedSchedule, OllamaModel, ScheduleAssembler, ScheduleModel, ScoredTask};
pub use storage::{
    Database, MappingStore, PlanStore, PreferenceStore, StressStore, SyncConfigStore, TaskStore,
};
pub use sync::{
    CalendarSyncConfig, ConflictResolution, EntityKind, EventMapping, SyncEngine, SyncPreferences,
    SyncReport, SyncState, SyncStatusView, TokenVault,
};
