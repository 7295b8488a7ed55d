//! Google Calendar synchronization.
//!
//! Tasks and study blocks are pushed as calendar events; a mapping row
//! links each local entity to its event and carries the fingerprint
//! used for conflict detection. Credentials live encrypted in the
//! database and only pass through the vault.

pub mod calendar_client;
pub mod engine;
pub mod oauth;
pub mod payload;
pub mod types;
pub mod vault;


pub use calendar_client::CalendarClient;
pub use engine::SyncEngine;
pub use oauth::{OAuthClient, OAuthState};
pub use payload::{block_to_event, block_version_hash, task_to_event, task_version_hash};
pub use types::{
    BlockSyncResult, CalendarSyncConfig, ConflictResolution, EntityKind, EventMapping,
    OAuthTokens, SyncOutcome, SyncPreferences, SyncReport, SyncState, SyncStatusView,
};
pub use vault::TokenVault;
