//! Group monitor list
//!
//! Local view over the set of conversations the assistant watches. The
//! backend owns the truth: a refresh replaces the whole set, and a toggle
//! only flips the local flag after the backend acknowledged the change, so
//! a failed call never leaves the list claiming a state the backend does
//! not have.

use crate::api::bot::{BotApi, GroupMonitor};
use crate::api::{self, ApiError};
use async_trait::async_trait;

/// Backend surface the list drives.
#[async_trait]
pub trait GroupDirectory: Send {
    async fn list_groups(&self) -> api::Result<Vec<GroupMonitor>>;
    async fn toggle_group(&self, conversation_id: &str) -> api::Result<()>;
}

#[async_trait]
impl GroupDirectory for BotApi {
    async fn list_groups(&self) -> api::Result<Vec<GroupMonitor>> {
        BotApi::list_groups(self).await
    }

    async fn toggle_group(&self, conversation_id: &str) -> api::Result<()> {
        BotApi::toggle_group(self, conversation_id).await
    }
}

/// The monitored-group list, kept in sync with the backend.
pub struct GroupMonitorList<D> {
    directory: D,
    groups: Vec<GroupMonitor>,
}

impl<D: GroupDirectory> GroupMonitorList<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            groups: Vec::new(),
        }
    }

    /// Current snapshot, in backend order.
    pub fn groups(&self) -> &[GroupMonitor] {
        &self.groups
    }

    /// Look up one group by conversation id.
    pub fn get(&self, conversation_id: &str) -> Option<&GroupMonitor> {
        self.groups
            .iter()
            .find(|g| g.conversation_id == conversation_id)
    }

    /// Re-fetch the set from the backend. The previous snapshot is replaced
    /// wholesale, never merged, so removals on the backend side propagate.
    pub async fn refresh(&mut self) -> api::Result<()> {
        self.groups = self.directory.list_groups().await?;
        tracing::debug!(count = self.groups.len(), "refreshed monitored groups");
        Ok(())
    }

    /// Flip monitoring for one group. The local flag changes only after the
    /// backend confirms; on failure the snapshot is untouched.
    pub async fn toggle(&mut self, conversation_id: &str) -> api::Result<bool> {
        let position = self
            .groups
            .iter()
            .position(|g| g.conversation_id == conversation_id)
            .ok_or_else(|| ApiError::Rejected {
                message: format!("unknown group {conversation_id}"),
            })?;

        self.directory.toggle_group(conversation_id).await?;
        let group = &mut self.groups[position];
        group.enabled = !group.enabled;
        tracing::info!(
            conversation_id,
            enabled = group.enabled,
            "toggled group monitoring"
        );
        Ok(group.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubDirectory {
        listing: Vec<GroupMonitor>,
        fail_toggle: AtomicBool,
        toggles: AtomicUsize,
    }

    impl StubDirectory {
        fn new(listing: Vec<GroupMonitor>) -> Arc<Self> {
            Arc::new(Self {
                listing,
                fail_toggle: AtomicBool::new(false),
                toggles: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GroupDirectory for Arc<StubDirectory> {
        async fn list_groups(&self) -> api::Result<Vec<GroupMonitor>> {
            Ok(self.listing.clone())
        }

        async fn toggle_group(&self, _conversation_id: &str) -> api::Result<()> {
            self.toggles.fetch_add(1, Ordering::SeqCst);
            if self.fail_toggle.load(Ordering::SeqCst) {
                Err(ApiError::Rejected {
                    message: "backend unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn group(id: &str, enabled: bool) -> GroupMonitor {
        GroupMonitor {
            conversation_id: id.to_string(),
            name: format!("Group {id}"),
            enabled,
        }
    }

    #[tokio::test]
    async fn refresh_replaces_previous_snapshot() {
        let directory = StubDirectory::new(vec![group("a", true)]);
        let mut list = GroupMonitorList::new(directory);

        list.groups = vec![group("stale-1", false), group("stale-2", true)];
        list.refresh().await.unwrap();

        assert_eq!(list.groups().len(), 1);
        assert_eq!(list.groups()[0].conversation_id, "a");
        assert!(list.get("stale-1").is_none());
    }

    #[tokio::test]
    async fn toggle_flips_only_after_backend_success() {
        let directory = StubDirectory::new(vec![group("a", false)]);
        let mut list = GroupMonitorList::new(directory.clone());
        list.refresh().await.unwrap();

        let enabled = list.toggle("a").await.unwrap();
        assert!(enabled);
        assert!(list.get("a").unwrap().enabled);
        assert_eq!(directory.toggles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_toggle_leaves_snapshot_untouched() {
        let directory = StubDirectory::new(vec![group("a", false)]);
        let mut list = GroupMonitorList::new(directory.clone());
        list.refresh().await.unwrap();

        directory.fail_toggle.store(true, Ordering::SeqCst);
        assert!(list.toggle("a").await.is_err());
        assert!(!list.get("a").unwrap().enabled);
    }

    #[tokio::test]
    async fn toggle_of_unknown_group_never_reaches_backend() {
        let directory = StubDirectory::new(vec![group("a", false)]);
        let mut list = GroupMonitorList::new(directory.clone());
        list.refresh().await.unwrap();

        let err = list.toggle("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { .. }));
        assert_eq!(directory.toggles.load(Ordering::SeqCst), 0);
    }
}
