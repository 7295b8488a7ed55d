//! Shared types for calendar synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Local entity kinds that map to calendar events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    StudyBlock,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::StudyBlock => "study_block",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "task" => Ok(EntityKind::Task),
            "study_block" => Ok(EntityKind::StudyBlock),
            other => Err(ValidationError::InvalidValue {
                field: "entity_kind".to_string(),
                message: format!("unknown entity kind '{other}'"),
            }
            .into()),
        }
    }
}

/// Synchronization state of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    Conflict,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Synced => "synced",
            SyncState::Conflict => "conflict",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "synced" => Ok(SyncState::Synced),
            "conflict" => Ok(SyncState::Conflict),
            other => Err(ValidationError::InvalidValue {
                field: "sync_state".to_string(),
                message: format!("unknown sync state '{other}'"),
            }
            .into()),
        }
    }
}

/// Links one local entity to one calendar event.
///
/// `version_hash` is the fingerprint of the local payload at last sync;
/// conflict detection compares it against the current local fingerprint
/// and the remote modification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMapping {
    pub id: String,
    pub user_id: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub google_event_id: String,
    pub google_calendar_id: String,
    pub last_synced_at: DateTime<Utc>,
    pub last_modified_local: DateTime<Utc>,
    #[serde(default)]
    pub last_modified_google: Option<DateTime<Utc>>,
    pub sync_state: SyncState,
    pub version_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Decrypted OAuth token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// User-facing sync behavior toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPreferences {
    #[serde(default = "default_true")]
    pub sync_tasks: bool,
    #[serde(default = "default_true")]
    pub sync_study_plans: bool,
    #[serde(default = "default_direction")]
    pub sync_direction: String,
    /// Minutes between automatic sync passes.
    #[serde(default = "default_interval")]
    pub auto_sync_interval: u32,
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self {
            sync_tasks: true,
            sync_study_plans: true,
            sync_direction: default_direction(),
            auto_sync_interval: default_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_direction() -> String {
    "bidirectional".to_string()
}

fn default_interval() -> u32 {
    15
}

/// Per-user calendar connection state. Credentials are stored encrypted
/// and only pass through [`crate::sync::vault::TokenVault`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSyncConfig {
    pub user_id: String,
    pub sync_enabled: bool,
    pub google_calendar_id: String,
    /// Vault-encrypted serialized [`OAuthTokens`].
    pub encrypted_credentials: String,
    #[serde(default)]
    pub preferences: SyncPreferences,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User's choice when resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    UseLocal,
    UseGoogle,
}

impl ConflictResolution {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "use_local" => Ok(ConflictResolution::UseLocal),
            "use_google" => Ok(ConflictResolution::UseGoogle),
            other => Err(ValidationError::InvalidValue {
                field: "resolution".to_string(),
                message: format!("expected 'use_local' or 'use_google', got '{other}'"),
            }
            .into()),
        }
    }
}

/// Result of pushing one entity to the calendar.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub event_id: String,
    /// True when a new event was inserted, false when updated.
    pub created: bool,
}

/// Per-block result inside a plan sync.
#[derive(Debug, Clone, Serialize)]
pub struct BlockSyncResult {
    pub block_id: String,
    pub synced: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Aggregate result of a full sync pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub tasks_synced: u32,
    pub tasks_failed: u32,
    pub blocks_synced: u32,
    pub blocks_failed: u32,
    pub conflicts_detected: u32,
}

/// Read-only sync status snapshot for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusView {
    pub connected: bool,
    pub sync_enabled: bool,
    pub google_calendar_id: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub mapping_count: u64,
    pub conflict_count: u64,
    pub preferences: Option<SyncPreferences>,
}
