//! Calendar synchronization engine.
//!
//! Owns the OAuth lifecycle, pushes tasks and study blocks to the
//! calendar, detects divergence between local edits and remote edits,
//! and applies user-chosen conflict resolutions. Every push is
//! single-flighted per entity, and token refreshes coalesce per user so
//! concurrent syncs never race the provider.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{AuthorizationError, CoreError, NotFoundError, Result};
use crate::model::Task;
use crate::plan::StudyBlock;
use crate::storage::{MappingStore, PlanStore, SyncConfigStore, TaskStore};
use crate::sync::calendar_client::CalendarClient;
use crate::sync::oauth::OAuthClient;
use crate::sync::payload::{
    block_to_event, block_version_hash, task_to_event, task_version_hash,
};
use crate::sync::types::{
    BlockSyncResult, CalendarSyncConfig, ConflictResolution, EntityKind, EventMapping,
    OAuthTokens, SyncOutcome, SyncPreferences, SyncReport, SyncState, SyncStatusView,
};
use crate::sync::vault::TokenVault;

/// Tokens expiring within this window are refreshed proactively.
const EXPIRY_BUFFER_SECS: i64 = 60;
/// Days of upcoming plans covered by a full sync pass.
const SYNC_HORIZON_DAYS: u32 = 7;

type EntityKey = (String, EntityKind, String);

/// Drives all calendar synchronization for every user.
pub struct SyncEngine {
    client: CalendarClient,
    oauth: OAuthClient,
    vault: TokenVault,
    configs: Arc<dyn SyncConfigStore>,
    mappings: Arc<dyn MappingStore>,
    tasks: Arc<dyn TaskStore>,
    plans: Arc<dyn PlanStore>,
    entity_locks: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: CalendarClient,
        oauth: OAuthClient,
        vault: TokenVault,
        configs: Arc<dyn SyncConfigStore>,
        mappings: Arc<dyn MappingStore>,
        tasks: Arc<dyn TaskStore>,
        plans: Arc<dyn PlanStore>,
    ) -> Self {
        Self {
            client,
            oauth,
            vault,
            configs,
            mappings,
            tasks,
            plans,
            entity_locks: Mutex::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    // ---- connection lifecycle ----

    /// Start the OAuth flow; returns the consent URL to redirect to.
    pub fn initiate_oauth(&self, user_id: &str) -> Result<String> {
        self.oauth.authorization_url(user_id)
    }

    /// Finish the OAuth flow from the provider callback.
    ///
    /// Verifies the primary calendar is reachable with the new tokens,
    /// encrypts them, and enables sync for the user. Returns the user
    /// id recovered from the state parameter.
    pub fn complete_oauth(&self, code: &str, state: &str) -> Result<String> {
        let state = self.oauth.decode_state(state)?;
        let tokens = self.oauth.exchange_code(code)?;

        let calendar = self.client.get_calendar(&tokens.access_token, "primary")?;
        let calendar_id = calendar["id"].as_str().unwrap_or("primary").to_string();

        let encrypted = self.vault.encrypt_tokens(&tokens)?;
        let now = Utc::now();
        let existing = self.configs.get_sync_config(&state.user_id)?;
        let config = CalendarSyncConfig {
            user_id: state.user_id.clone(),
            sync_enabled: true,
            google_calendar_id: calendar_id,
            encrypted_credentials: encrypted,
            preferences: existing
                .as_ref()
                .map(|c| c.preferences.clone())
                .unwrap_or_default(),
            last_sync_at: existing.as_ref().and_then(|c| c.last_sync_at),
            created_at: existing.map(|c| c.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.configs.upsert_sync_config(&config)?;
        log::info!("calendar connected for user {}", state.user_id);
        Ok(state.user_id)
    }

    /// Drop the connection and every mapping for a user. Remote events
    /// are left in place.
    pub fn disconnect(&self, user_id: &str) -> Result<()> {
        self.mappings.delete_all_mappings(user_id)?;
        self.configs.delete_sync_config(user_id)?;
        log::info!("calendar disconnected for user {user_id}");
        Ok(())
    }

    /// Current connection and sync state for presentation.
    pub fn status(&self, user_id: &str) -> Result<SyncStatusView> {
        let config = self.configs.get_sync_config(user_id)?;
        Ok(SyncStatusView {
            connected: config.is_some(),
            sync_enabled: config.as_ref().map(|c| c.sync_enabled).unwrap_or(false),
            google_calendar_id: config.as_ref().map(|c| c.google_calendar_id.clone()),
            last_sync_at: config.as_ref().and_then(|c| c.last_sync_at),
            mapping_count: self.mappings.count_mappings(user_id)?,
            conflict_count: self.mappings.count_conflicts(user_id)?,
            preferences: config.map(|c| c.preferences),
        })
    }

    /// Replace the user's sync preferences.
    pub fn update_preferences(&self, user_id: &str, prefs: SyncPreferences) -> Result<()> {
        let mut config = self.require_config(user_id)?;
        config.preferences = prefs;
        config.updated_at = Utc::now();
        self.configs.upsert_sync_config(&config)
    }

    // ---- credentials ----

    fn require_config(&self, user_id: &str) -> Result<CalendarSyncConfig> {
        self.configs
            .get_sync_config(user_id)?
            .ok_or_else(|| AuthorizationError::NotConnected(user_id.to_string()).into())
    }

    fn require_enabled(&self, user_id: &str) -> Result<CalendarSyncConfig> {
        let config = self.require_config(user_id)?;
        if !config.sync_enabled {
            return Err(AuthorizationError::SyncDisabled.into());
        }
        Ok(config)
    }

    fn tokens_expired(tokens: &OAuthTokens) -> bool {
        match tokens.expiry {
            Some(expiry) => expiry <= Utc::now() + Duration::seconds(EXPIRY_BUFFER_SECS),
            None => false,
        }
    }

    fn refresh_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Produce a valid access token plus the target calendar id,
    /// refreshing if needed. Refreshes coalesce: the lock holder
    /// re-reads the config, so waiters find fresh tokens already
    /// stored and skip their own refresh.
    fn access_token(&self, user_id: &str) -> Result<(String, String)> {
        let config = self.require_enabled(user_id)?;
        let tokens = self.vault.decrypt_tokens(&config.encrypted_credentials)?;
        if !Self::tokens_expired(&tokens) {
            return Ok((config.google_calendar_id, tokens.access_token));
        }

        let lock = self.refresh_lock(user_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        // Another caller may have refreshed while we waited.
        let mut config = self.require_enabled(user_id)?;
        let tokens = self.vault.decrypt_tokens(&config.encrypted_credentials)?;
        if !Self::tokens_expired(&tokens) {
            return Ok((config.google_calendar_id, tokens.access_token));
        }

        let refreshed = self.oauth.refresh(&tokens)?;
        config.encrypted_credentials = self.vault.encrypt_tokens(&refreshed)?;
        config.updated_at = Utc::now();
        self.configs.upsert_sync_config(&config)?;
        log::debug!("refreshed access token for user {user_id}");
        Ok((config.google_calendar_id, refreshed.access_token))
    }

    // ---- entity sync ----

    fn entity_lock(&self, user_id: &str, kind: EntityKind, entity_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.entity_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((user_id.to_string(), kind, entity_id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Push one task to the calendar, creating or updating its event.
    pub fn sync_task(&self, user_id: &str, task_id: &str) -> Result<SyncOutcome> {
        let config = self.require_enabled(user_id)?;
        if !config.preferences.sync_tasks {
            return Err(AuthorizationError::SyncDisabled.into());
        }
        let task = self
            .tasks
            .get_task(user_id, task_id)?
            .ok_or_else(|| NotFoundError::Task(task_id.to_string()))?;

        let lock = self.entity_lock(user_id, EntityKind::Task, task_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let event = task_to_event(&task)?;
        let hash = task_version_hash(&task);
        self.push_entity(user_id, EntityKind::Task, task_id, &event, &hash)
    }

    /// Push one study block to the calendar.
    pub fn sync_block(&self, user_id: &str, block_id: &str) -> Result<SyncOutcome> {
        let config = self.require_enabled(user_id)?;
        if !config.preferences.sync_study_plans {
            return Err(AuthorizationError::SyncDisabled.into());
        }
        let plan = self
            .plans
            .find_plan_by_block(user_id, block_id)?
            .ok_or_else(|| NotFoundError::Block(block_id.to_string()))?;
        let block = plan
            .study_blocks
            .iter()
            .find(|b| b.id == block_id)
            .ok_or_else(|| NotFoundError::Block(block_id.to_string()))?;

        let lock = self.entity_lock(user_id, EntityKind::StudyBlock, block_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let event = block_to_event(block, plan.date)?;
        let hash = block_version_hash(block, plan.date);
        self.push_entity(user_id, EntityKind::StudyBlock, block_id, &event, &hash)
    }

    /// Push every study block of a plan; returns per-block results
    /// rather than failing the whole plan on one bad block.
    pub fn sync_plan(&self, user_id: &str, date: NaiveDate) -> Result<Vec<BlockSyncResult>> {
        let config = self.require_enabled(user_id)?;
        if !config.preferences.sync_study_plans {
            return Err(AuthorizationError::SyncDisabled.into());
        }
        let plan = self
            .plans
            .get_plan(user_id, date)?
            .ok_or_else(|| NotFoundError::Plan {
                user_id: user_id.to_string(),
                date: date.to_string(),
            })?;

        let mut results = Vec::with_capacity(plan.study_blocks.len());
        for block in &plan.study_blocks {
            let lock = self.entity_lock(user_id, EntityKind::StudyBlock, &block.id);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            let outcome = block_to_event(block, plan.date).and_then(|event| {
                let hash = block_version_hash(block, plan.date);
                self.push_entity(user_id, EntityKind::StudyBlock, &block.id, &event, &hash)
            });
            match outcome {
                Ok(_) => results.push(BlockSyncResult {
                    block_id: block.id.clone(),
                    synced: true,
                    error: None,
                }),
                Err(e) => {
                    log::warn!("block {} failed to sync: {e}", block.id);
                    results.push(BlockSyncResult {
                        block_id: block.id.clone(),
                        synced: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(results)
    }

    /// One full sync pass: deadline-bearing tasks, then the next week
    /// of plans. Individual failures are counted, never propagated.
    pub fn sync_all(&self, user_id: &str) -> Result<SyncReport> {
        let mut config = self.require_enabled(user_id)?;
        let mut report = SyncReport::default();

        if config.preferences.sync_tasks {
            for task in self.tasks.active_tasks(user_id)? {
                if task.deadline.is_none() {
                    continue;
                }
                match self.sync_task(user_id, &task.id) {
                    Ok(_) => report.tasks_synced += 1,
                    Err(e) => {
                        log::warn!("task {} failed to sync: {e}", task.id);
                        report.tasks_failed += 1;
                    }
                }
            }
        }

        if config.preferences.sync_study_plans {
            let today = Utc::now().date_naive();
            let horizon = today + Duration::days(SYNC_HORIZON_DAYS as i64);
            for plan in self.plans.plans_in_range(user_id, today, horizon)? {
                match self.sync_plan(user_id, plan.date) {
                    Ok(results) => {
                        for r in results {
                            if r.synced {
                                report.blocks_synced += 1;
                            } else {
                                report.blocks_failed += 1;
                            }
                        }
                    }
                    Err(e) => log::warn!("plan {} failed to sync: {e}", plan.date),
                }
            }
        }

        report.conflicts_detected = self.detect_conflicts(user_id)?;

        config.last_sync_at = Some(Utc::now());
        config.updated_at = Utc::now();
        self.configs.upsert_sync_config(&config)?;
        Ok(report)
    }

    fn push_entity(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_id: &str,
        event: &serde_json::Value,
        version_hash: &str,
    ) -> Result<SyncOutcome> {
        let (calendar_id, token) = self.access_token(user_id)?;
        let existing = self.mappings.get_mapping(user_id, kind, entity_id)?;
        let now = Utc::now();

        match existing {
            Some(mut mapping) => {
                // A conflicted mapping must be resolved explicitly; a
                // blind push would overwrite the remote edit.
                if mapping.sync_state == SyncState::Conflict {
                    return Err(CoreError::Conflict(format!(
                        "{} {} has unresolved changes on both sides",
                        mapping.entity_kind.as_str(),
                        mapping.entity_id,
                    )));
                }
                let updated =
                    self.client
                        .update_event(&token, &calendar_id, &mapping.google_event_id, event)?;
                mapping.google_calendar_id = calendar_id;
                mapping.last_synced_at = now;
                mapping.last_modified_local = now;
                mapping.last_modified_google = event_updated_at(&updated);
                mapping.sync_state = SyncState::Synced;
                mapping.version_hash = version_hash.to_string();
                self.mappings.upsert_mapping(&mapping)?;
                Ok(SyncOutcome {
                    event_id: mapping.google_event_id,
                    created: false,
                })
            }
            None => {
                let created = self.client.insert_event(&token, &calendar_id, event)?;
                let event_id = created["id"].as_str().unwrap_or_default().to_string();
                let mapping = EventMapping {
                    id: Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    entity_kind: kind,
                    entity_id: entity_id.to_string(),
                    google_event_id: event_id.clone(),
                    google_calendar_id: calendar_id,
                    last_synced_at: now,
                    last_modified_local: now,
                    last_modified_google: event_updated_at(&created),
                    sync_state: SyncState::Synced,
                    version_hash: version_hash.to_string(),
                    created_at: now,
                };
                self.mappings.upsert_mapping(&mapping)?;
                Ok(SyncOutcome {
                    event_id,
                    created: true,
                })
            }
        }
    }

    /// Remove an event by its calendar id, dropping the mapping that
    /// points at it. Unknown event ids are fine.
    pub fn delete_event(&self, user_id: &str, event_id: &str) -> Result<()> {
        let Some(mapping) = self.mappings.get_mapping_by_event(user_id, event_id)? else {
            return Ok(());
        };
        let (_, token) = self.access_token(user_id)?;
        self.client
            .delete_event(&token, &mapping.google_calendar_id, &mapping.google_event_id)?;
        self.mappings.delete_mapping(&mapping.id)
    }

    /// Remove the calendar event for an entity and drop its mapping.
    /// Missing mappings and already-deleted events are both fine.
    pub fn delete_entity_event(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<()> {
        let Some(mapping) = self.mappings.get_mapping(user_id, kind, entity_id)? else {
            return Ok(());
        };
        let (_, token) = self.access_token(user_id)?;
        self.client
            .delete_event(&token, &mapping.google_calendar_id, &mapping.google_event_id)?;
        self.mappings.delete_mapping(&mapping.id)
    }

    // ---- conflicts ----

    /// Compare each mapping against its local entity and remote event;
    /// a mapping becomes a conflict when both sides changed since the
    /// last sync. Returns the number of conflicts found in this pass.
    pub fn detect_conflicts(&self, user_id: &str) -> Result<u32> {
        let (_, token) = self.access_token(user_id)?;
        let mut found = 0u32;

        for mut mapping in self.mappings.list_mappings(user_id)? {
            if mapping.sync_state == SyncState::Conflict {
                continue;
            }
            let Some(local_hash) = self.current_local_hash(user_id, &mapping)? else {
                continue;
            };
            let local_changed = local_hash != mapping.version_hash;
            if !local_changed {
                continue;
            }

            let remote = match self.client.get_event(
                &token,
                &mapping.google_calendar_id,
                &mapping.google_event_id,
            ) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("event {} unreadable: {e}", mapping.google_event_id);
                    continue;
                }
            };
            let remote_changed = event_updated_at(&remote)
                .map(|updated| updated > mapping.last_synced_at)
                .unwrap_or(false);

            if remote_changed {
                mapping.last_modified_google = event_updated_at(&remote);
                mapping.sync_state = SyncState::Conflict;
                self.mappings.upsert_mapping(&mapping)?;
                found += 1;
            }
        }
        Ok(found)
    }

    /// All mappings currently in conflict for a user.
    pub fn list_conflicts(&self, user_id: &str) -> Result<Vec<EventMapping>> {
        self.mappings.list_conflicts(user_id)
    }

    /// Apply the user's resolution to a conflicted mapping.
    ///
    /// `UseLocal` pushes the local entity over the remote event;
    /// `UseGoogle` copies the remote event's data into the local entity.
    /// Either way the mapping returns to the synced state.
    pub fn resolve_conflict(
        &self,
        user_id: &str,
        mapping_id: &str,
        resolution: ConflictResolution,
    ) -> Result<()> {
        let mapping = self
            .mappings
            .get_mapping_by_id(mapping_id)?
            .filter(|m| m.user_id == user_id)
            .ok_or_else(|| NotFoundError::Mapping(mapping_id.to_string()))?;

        match resolution {
            ConflictResolution::UseLocal => {
                // Clear the conflict first so the push is not refused.
                let mut cleared = mapping.clone();
                cleared.sync_state = SyncState::Synced;
                self.mappings.upsert_mapping(&cleared)?;
                match mapping.entity_kind {
                    EntityKind::Task => self.sync_task(user_id, &mapping.entity_id)?,
                    EntityKind::StudyBlock => self.sync_block(user_id, &mapping.entity_id)?,
                };
                Ok(())
            }
            ConflictResolution::UseGoogle => self.adopt_remote(user_id, mapping),
        }
    }

    fn adopt_remote(&self, user_id: &str, mut mapping: EventMapping) -> Result<()> {
        let (_, token) = self.access_token(user_id)?;
        let remote = self.client.get_event(
            &token,
            &mapping.google_calendar_id,
            &mapping.google_event_id,
        )?;
        let now = Utc::now();

        let new_hash = match mapping.entity_kind {
            EntityKind::Task => {
                let mut task = self
                    .tasks
                    .get_task(user_id, &mapping.entity_id)?
                    .ok_or_else(|| NotFoundError::Task(mapping.entity_id.clone()))?;
                apply_remote_task(&mut task, &remote);
                task.updated_at = now;
                self.tasks.put_task(user_id, &task)?;
                task_version_hash(&task)
            }
            EntityKind::StudyBlock => {
                let mut plan = self
                    .plans
                    .find_plan_by_block(user_id, &mapping.entity_id)?
                    .ok_or_else(|| NotFoundError::Block(mapping.entity_id.clone()))?;
                let date = plan.date;
                let block = plan
                    .block_mut(&mapping.entity_id)
                    .ok_or_else(|| NotFoundError::Block(mapping.entity_id.clone()))?;
                apply_remote_block(block, &remote);
                let hash = block_version_hash(block, date);
                plan.recompute_total_hours();
                plan.sort_blocks();
                self.plans.upsert_plan(&plan)?;
                hash
            }
        };

        mapping.version_hash = new_hash;
        mapping.last_synced_at = now;
        mapping.last_modified_local = now;
        mapping.last_modified_google = event_updated_at(&remote);
        mapping.sync_state = SyncState::Synced;
        self.mappings.upsert_mapping(&mapping)
    }

    fn current_local_hash(
        &self,
        user_id: &str,
        mapping: &EventMapping,
    ) -> Result<Option<String>> {
        match mapping.entity_kind {
            EntityKind::Task => Ok(self
                .tasks
                .get_task(user_id, &mapping.entity_id)?
                .map(|t| task_version_hash(&t))),
            EntityKind::StudyBlock => {
                let Some(plan) = self.plans.find_plan_by_block(user_id, &mapping.entity_id)?
                else {
                    return Ok(None);
                };
                Ok(plan
                    .study_blocks
                    .iter()
                    .find(|b| b.id == mapping.entity_id)
                    .map(|b| block_version_hash(b, plan.date)))
            }
        }
    }
}

fn event_updated_at(event: &serde_json::Value) -> Option<DateTime<Utc>> {
    event["updated"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn event_time_hhmm(event: &serde_json::Value, field: &str) -> Option<String> {
    let raw = event[field]["dateTime"].as_str()?;
    // "2026-03-02T09:00:00..." -> "09:00"
    let time = raw.split('T').nth(1)?;
    Some(time.chars().take(5).collect())
}

fn apply_remote_task(task: &mut Task, event: &serde_json::Value) {
    if let Some(summary) = event["summary"].as_str() {
        task.title = summary.to_string();
    }
    if let Some(start) = event["start"]["dateTime"].as_str() {
        if let Ok(dt) = DateTime::parse_from_rfc3339(start) {
            task.deadline = Some(dt.with_timezone(&Utc));
        }
    }
}

fn apply_remote_block(block: &mut StudyBlock, event: &serde_json::Value) {
    if let Some(summary) = event["summary"].as_str() {
        block.task_title = crate::sync::payload::strip_session_emoji(summary).to_string();
    }
    if let (Some(start), Some(end)) = (
        event_time_hhmm(event, "start"),
        event_time_hhmm(event, "end"),
    ) {
        if let Ok(minutes) = crate::plan::duration_between(&start, &end) {
            block.start_time = start;
            block.end_time = end;
            block.duration_minutes = minutes;
        }
    }
}
