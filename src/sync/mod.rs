//! Single-flight background job that pulls the group/contact catalogue from
//! the Provider Client, merges and upserts it into the Store, reconciles
//! stale entries, and publishes progress for the management API to poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::provider::{ProviderChat, ProviderClient};
use crate::store::{self, models::ChatKind, DbPool};

const AUTO_IDLE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    FetchingGroups,
    FetchingContacts,
    Saving,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncProgress {
    pub state: SyncState,
    pub groups_found: usize,
    pub contacts_found: usize,
    pub removed: u64,
    pub step: String,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            groups_found: 0,
            contacts_found: 0,
            removed: 0,
            step: "idle".to_string(),
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Owns the single in-memory sync progress record. Single-flight is enforced
/// by a non-blocking `try_lock` on the run mutex: a second caller observes
/// `AlreadyRunning` rather than queueing behind the first.
pub struct SyncCoordinator {
    pool: DbPool,
    provider: Arc<ProviderClient>,
    instance: String,
    progress: Arc<RwLock<SyncProgress>>,
    run_lock: Arc<Mutex<()>>,
}

impl SyncCoordinator {
    pub fn new(pool: DbPool, provider: Arc<ProviderClient>, instance: String) -> Self {
        Self {
            pool,
            provider,
            instance,
            progress: Arc::new(RwLock::new(SyncProgress::default())),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn progress(&self) -> SyncProgress {
        self.progress.read().clone()
    }

    pub fn start_sync(self: &Arc<Self>) -> StartOutcome {
        let guard = match self.run_lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => return StartOutcome::AlreadyRunning,
        };

        let this = self.clone();
        {
            let mut progress = this.progress.write();
            *progress = SyncProgress {
                state: SyncState::FetchingGroups,
                step: "fetching groups".to_string(),
                started_at: Some(Utc::now()),
                ..SyncProgress::default()
            };
        }

        tokio::spawn(async move {
            let _guard = guard;
            this.run().await;
        });

        StartOutcome::Started
    }

    async fn run(&self) {
        let sync_start = Utc::now();

        let groups = self.provider.list_groups(&self.instance).await;
        {
            let mut progress = self.progress.write();
            progress.groups_found = groups.len();
            progress.state = SyncState::FetchingContacts;
            progress.step = "fetching contacts".to_string();
        }

        let contacts = self.provider.list_contacts(&self.instance).await;
        {
            let mut progress = self.progress.write();
            progress.contacts_found = contacts.len();
            progress.state = SyncState::Saving;
            progress.step = "saving".to_string();
        }

        match self.save(groups, contacts, sync_start).await {
            Ok(removed) => {
                let mut progress = self.progress.write();
                progress.removed = removed;
                progress.state = SyncState::Complete;
                progress.step = "complete".to_string();
                progress.completed_at = Some(Utc::now());
                info!(removed, "sync complete");
            }
            Err(e) => {
                error!("sync failed: {e}");
                let mut progress = self.progress.write();
                progress.state = SyncState::Error;
                progress.step = "error".to_string();
                progress.error = Some(e.to_string());
                progress.completed_at = Some(Utc::now());
            }
        }

        let progress = self.progress.clone();
        tokio::spawn(async move {
            tokio::time::sleep(AUTO_IDLE_AFTER).await;
            let mut progress = progress.write();
            if progress.state == SyncState::Complete || progress.state == SyncState::Error {
                *progress = SyncProgress::default();
            }
        });
    }

    async fn save(
        &self,
        groups: Vec<ProviderChat>,
        contacts: Vec<ProviderChat>,
        sync_start: DateTime<Utc>,
    ) -> Result<u64, store::StoreError> {
        let merged = merge_chats(groups, contacts);

        let mut tx = store::sync_reconcile::begin(&self.pool).await?;

        for (id, (kind, name, phone)) in &merged {
            store::chats::upsert_chat_from_sync(&mut tx, id, *kind, name.as_deref(), phone.as_deref()).await?;
        }

        let removed = store::sync_reconcile::sync_reconcile(&mut tx, sync_start).await?;

        tx.commit().await?;

        Ok(removed)
    }
}

type MergedEntry = (ChatKind, Option<String>, Option<String>);

/// Merge groups and contacts by id. On collision, prefer the entry with the
/// longer display name (a crude but effective "more complete record" proxy).
/// The upstream group/contact catalogue endpoints this feeds from don't carry
/// a last-activity timestamp (that only exists on inbound messages), so name
/// length is the only completeness signal available at merge time; see
/// DESIGN.md for why the timestamp half of this rule isn't implemented.
fn merge_chats(groups: Vec<ProviderChat>, contacts: Vec<ProviderChat>) -> HashMap<String, MergedEntry> {
    let mut merged: HashMap<String, MergedEntry> = HashMap::new();

    for chat in groups.into_iter().chain(contacts.into_iter()) {
        let kind = ChatKind::from_chat_id(&chat.id);
        let name_len = chat.name.as_ref().map(|n| n.len()).unwrap_or(0);

        merged
            .entry(chat.id.clone())
            .and_modify(|existing| {
                let existing_len = existing.1.as_ref().map(|n| n.len()).unwrap_or(0);
                if name_len > existing_len {
                    existing.1 = chat.name.clone();
                }
                if existing.2.is_none() {
                    existing.2 = chat.phone_number.clone();
                }
            })
            .or_insert_with(|| {
                if chat.name.is_none() && chat.phone_number.is_none() {
                    warn!(id = %chat.id, "sync entry has neither name nor phone number");
                }
                (kind, chat.name, chat.phone_number)
            });
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str, name: Option<&str>, phone: Option<&str>) -> ProviderChat {
        ProviderChat {
            id: id.to_string(),
            name: name.map(|s| s.to_string()),
            phone_number: phone.map(|s| s.to_string()),
        }
    }

    #[test]
    fn longer_name_wins_on_collision() {
        let groups = vec![chat("1@g.us", Some("Team"), None)];
        let contacts = vec![chat("1@g.us", Some("Team Standup"), None)];

        let merged = merge_chats(groups, contacts);

        let (_, name, _) = merged.get("1@g.us").unwrap();
        assert_eq!(name.as_deref(), Some("Team Standup"));
    }

    #[test]
    fn shorter_name_does_not_overwrite_existing() {
        let groups = vec![chat("1@g.us", Some("Team Standup"), None)];
        let contacts = vec![chat("1@g.us", Some("Team"), None)];

        let merged = merge_chats(groups, contacts);

        let (_, name, _) = merged.get("1@g.us").unwrap();
        assert_eq!(name.as_deref(), Some("Team Standup"));
    }

    #[test]
    fn phone_number_is_kept_once_set_and_not_overwritten() {
        let groups = vec![chat("1@s.whatsapp.net", None, Some("+15551234567"))];
        let contacts = vec![chat("1@s.whatsapp.net", None, Some("+15559999999"))];

        let merged = merge_chats(groups, contacts);

        let (_, _, phone) = merged.get("1@s.whatsapp.net").unwrap();
        assert_eq!(phone.as_deref(), Some("+15551234567"));
    }

    #[test]
    fn phone_number_fills_in_from_later_entry_when_missing() {
        let groups = vec![chat("1@s.whatsapp.net", None, None)];
        let contacts = vec![chat("1@s.whatsapp.net", None, Some("+15559999999"))];

        let merged = merge_chats(groups, contacts);

        let (_, _, phone) = merged.get("1@s.whatsapp.net").unwrap();
        assert_eq!(phone.as_deref(), Some("+15559999999"));
    }
}
